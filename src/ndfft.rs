//! Multi-dimensional FFT backend for the oversampled grid.
//!
//! - d-dimensional complex FFT over a flat row-major `n^d` buffer
//! - one axis at a time (row-column algorithm), strided axes go through a
//!   line buffer
//! - forward transform only, unscaled

use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::error::FlagsError;

/// Planned forward FFT on a `n^d` cube.
pub struct NdFft {
    dims: usize,
    n: usize,
    fft: Arc<dyn Fft<f64>>,
    line: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl NdFft {
    /// Plan a `dims`-dimensional transform with side length `n`.
    pub fn new(dims: usize, n: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            dims,
            n,
            fft,
            line: vec![Complex64::new(0.0, 0.0); n],
            scratch,
        }
    }

    /// Total number of grid points.
    pub fn size(&self) -> usize {
        self.n.pow(self.dims as u32)
    }

    /// Transform `data` in place along every axis.
    pub fn process(&mut self, data: &mut [Complex64]) -> Result<(), FlagsError> {
        let total = self.size();
        if data.len() != total {
            return Err(FlagsError::LengthMismatch {
                expected: total,
                actual: data.len(),
            });
        }
        let n = self.n;
        // Last axis is contiguous: rustfft walks every length-n chunk itself.
        self.fft.process_with_scratch(data, &mut self.scratch);
        let mut stride = n;
        for _ in 1..self.dims {
            let block = stride * n;
            for base in (0..total).step_by(block) {
                for inner in 0..stride {
                    let start = base + inner;
                    for (i, v) in self.line.iter_mut().enumerate() {
                        *v = data[start + i * stride];
                    }
                    self.fft.process_with_scratch(&mut self.line, &mut self.scratch);
                    for (i, v) in self.line.iter().enumerate() {
                        data[start + i * stride] = *v;
                    }
                }
            }
            stride = block;
        }
        Ok(())
    }
}
