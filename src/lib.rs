//! # nfft-flags - precomputation benchmarks for the NFFT
//!
//! Measures how the window precomputation strategy of a nonequispaced fast
//! Fourier transform affects its run time and accuracy. Every measurement
//! pass draws random nodes and coefficients, evaluates the transform with
//! each strategy over the same input, compares against the brute-force sum
//! and emits one tab-separated row.
//!
//! ## Strategies
//!
//! | Strategy | Tables |
//! |----------|--------|
//! | `direct` | none |
//! | `pre_phi_hut` | `N` deconvolution factors |
//! | `fg_psi` | `2m + 2` shared exponentials |
//! | `pre_lin_psi` | window sampled at `1024 (m + 1)` points |
//! | `pre_fg_psi` | two factors per node and dimension |
//! | `pre_psi` | `2m + 2` values per node and dimension |
//! | `pre_full_psi` | `(2m + 2)^d` values and indices per node |
//!
//! ## Example
//!
//! ```no_run
//! use nfft_flags::config::SweepConfig;
//! use nfft_flags::report::ReportWriter;
//! use nfft_flags::sweep::Sweep;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let config = SweepConfig::from_raw(0, 4, 6, 1, 1, 4).unwrap();
//! let sweep = Sweep::new(config).unwrap();
//! let mut rng = StdRng::seed_from_u64(sweep.config().seed);
//! let mut report = ReportWriter::new(std::io::stdout());
//! sweep.run(&mut rng, &mut report).unwrap();
//! ```

pub mod accuracy;
pub mod config;
pub mod error;
pub mod input;

/// Multi-dimensional complex FFT used for the oversampled grid
pub mod ndfft;
pub mod plan;
pub mod report;
pub mod sweep;
pub mod timer;

/// Gaussian window and its Fourier coefficients
pub mod window;

pub use error::FlagsError;
pub use plan::{Geometry, Phase, Plan, Strategy, TimingBreakdown, Workspace};
pub use rustfft::num_complex::Complex64;
