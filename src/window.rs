//! Gaussian window used by the approximate transform.
//!
//! The window is evaluated in grid units: for a node coordinate `x` and a
//! grid index `l`, the weight is `phi(x - l / n)`. Only `2m + 2` grid points
//! per dimension carry weight for any node.

use core::f64::consts::PI;

/// Gaussian window parameters for one oversampled grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    /// Oversampled grid size per dimension.
    pub n: usize,
    /// Cutoff (support half-width) in grid points.
    pub m: usize,
    /// Shape parameter `2 sigma / (2 sigma - 1) * m / pi`.
    pub b: f64,
    norm: f64,
}

impl Gaussian {
    /// Build the window for target size `big_n` on an oversampled grid `n`.
    pub fn new(big_n: usize, n: usize, m: usize) -> Self {
        let sigma = n as f64 / big_n as f64;
        let b = 2.0 * sigma / (2.0 * sigma - 1.0) * m as f64 / PI;
        Self {
            n,
            m,
            b,
            norm: 1.0 / (PI * b).sqrt(),
        }
    }

    /// Window value at a distance of `y` grid points.
    #[inline]
    pub fn phi_grid(&self, y: f64) -> f64 {
        self.norm * (-(y * y) / self.b).exp()
    }

    /// Deconvolution factor `1 / (n * phi_hat(k))`, where
    /// `phi_hat(k) = exp(-b (pi k / n)^2) / n` is the window's Fourier
    /// coefficient. Folding the `1/n` in lets the backend FFT run unscaled.
    #[inline]
    pub fn deconvolution(&self, k: i64) -> f64 {
        let t = PI * k as f64 / self.n as f64;
        (self.b * t * t).exp()
    }

    /// Normalisation `(pi b)^(-1/2)` applied to every window value.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// Number of grid points covered per dimension.
    #[inline]
    pub fn width(&self) -> usize {
        2 * self.m + 2
    }

    /// First grid index (not yet wrapped) of the window around `x`.
    #[inline]
    pub fn start(&self, x: f64) -> i64 {
        (self.n as f64 * x).floor() as i64 - self.m as i64
    }
}
