//! NFFT plans with selectable precomputation strategies.
//!
//! A [`Plan`] evaluates
//! `f_j = sum_k f_hat_k exp(-2 pi i k . x_j)` for `k` in `[-N/2, N/2)^d`
//! approximately, in three phases:
//!
//! 1. [`Phase::Deconvolve`]: scale the coefficients by `1 / phi_hat` and place
//!    them on the oversampled grid,
//! 2. [`Phase::Fft`]: forward FFT of the grid,
//! 3. [`Phase::Convolve`]: sum the grid against the window around every node.
//!
//! The strategy decides which window values are tabulated ahead of time.
//! Plans borrow their nodes and coefficients from a shared [`InputSet`] and
//! evaluate through a [`Workspace`] (oversampled grid plus FFT backend) that
//! every plan of a pass reuses. Each plan owns its tables and its output.

use core::f64::consts::PI;
use core::fmt;
use std::mem;
use std::time::Instant;

use log::debug;
use rustfft::num_complex::Complex64;

use crate::error::FlagsError;
use crate::input::InputSet;
use crate::ndfft::NdFft;
use crate::window::Gaussian;

/// Table resolution per grid unit for [`Strategy::PreLinPsi`].
pub const LIN_PSI_RESOLUTION: usize = 1 << 10;

/// How a plan prepares window data before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// Everything computed on the fly.
    Direct,
    /// Tabulated deconvolution factors; window evaluated on the fly.
    PrePhiHut,
    /// Fast Gaussian gridding with a shared `exp(-l^2 / b)` table.
    FgPsi,
    /// Window tabulated on a fine grid and linearly interpolated.
    PreLinPsi,
    /// Fast Gaussian gridding with two stored factors per node and dimension.
    PreFgPsi,
    /// `2m + 2` window values stored per node and dimension.
    PrePsi,
    /// Full tensor product of window values and grid indices per node.
    PreFullPsi,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::Direct,
        Strategy::PrePhiHut,
        Strategy::FgPsi,
        Strategy::PreLinPsi,
        Strategy::PreFgPsi,
        Strategy::PrePsi,
        Strategy::PreFullPsi,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::PrePhiHut => "pre_phi_hut",
            Strategy::FgPsi => "fg_psi",
            Strategy::PreLinPsi => "pre_lin_psi",
            Strategy::PreFgPsi => "pre_fg_psi",
            Strategy::PrePsi => "pre_psi",
            Strategy::PreFullPsi => "pre_full_psi",
        }
    }

    /// Bytes of strategy-owned tables for `geometry`, `None` on overflow.
    pub fn table_bytes(self, geometry: &Geometry) -> Option<usize> {
        const REAL: usize = mem::size_of::<f64>();
        const INDEX: usize = mem::size_of::<usize>();
        let w = geometry.window_len();
        let node_dims = geometry.m_total.checked_mul(geometry.dims)?;
        match self {
            Strategy::Direct => Some(0),
            Strategy::PrePhiHut => geometry.big_n.checked_mul(REAL),
            Strategy::FgPsi => w.checked_mul(REAL),
            Strategy::PreLinPsi => lin_psi_len(geometry.cutoff)?.checked_mul(REAL),
            Strategy::PreFgPsi => node_dims
                .checked_mul(2)?
                .checked_add(w)?
                .checked_mul(REAL),
            Strategy::PrePsi => node_dims.checked_mul(w)?.checked_mul(REAL),
            Strategy::PreFullPsi => geometry
                .m_total
                .checked_mul(full_window_len(geometry)?)?
                .checked_mul(REAL + INDEX),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Internal phase of a forward evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Deconvolve,
    Fft,
    Convolve,
}

/// Seconds spent in each phase of the most recent forward evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingBreakdown {
    pub deconvolve: Option<f64>,
    pub fft: Option<f64>,
    pub convolve: Option<f64>,
}

impl TimingBreakdown {
    pub fn get(&self, phase: Phase) -> Option<f64> {
        match phase {
            Phase::Deconvolve => self.deconvolve,
            Phase::Fft => self.fft,
            Phase::Convolve => self.convolve,
        }
    }

    pub fn set(&mut self, phase: Phase, seconds: f64) {
        let slot = match phase {
            Phase::Deconvolve => &mut self.deconvolve,
            Phase::Fft => &mut self.fft,
            Phase::Convolve => &mut self.convolve,
        };
        *slot = Some(seconds);
    }

    /// Add `other` phase by phase; a phase missing on either side stays as is.
    pub fn accumulate(&mut self, other: &TimingBreakdown) {
        for phase in [Phase::Deconvolve, Phase::Fft, Phase::Convolve] {
            if let Some(t) = other.get(phase) {
                let sum = self.get(phase).unwrap_or(0.0) + t;
                self.set(phase, sum);
            }
        }
    }

    /// Divide every recorded phase by `count`.
    pub fn averaged(&self, count: usize) -> TimingBreakdown {
        let div = count.max(1) as f64;
        TimingBreakdown {
            deconvolve: self.deconvolve.map(|t| t / div),
            fft: self.fft.map(|t| t / div),
            convolve: self.convolve.map(|t| t / div),
        }
    }
}

/// Problem sizes of one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Dimension `d`.
    pub dims: usize,
    /// Coefficient grid side `N`.
    pub big_n: usize,
    /// Number of nodes `M`.
    pub m_total: usize,
    /// Oversampled grid side `n`.
    pub n: usize,
    /// Window cutoff `m`.
    pub cutoff: usize,
}

impl Geometry {
    pub fn new(
        dims: usize,
        big_n: usize,
        m_total: usize,
        n: usize,
        cutoff: usize,
    ) -> Result<Self, FlagsError> {
        if dims == 0 || big_n == 0 || m_total == 0 || cutoff == 0 {
            return Err(FlagsError::invalid(format!(
                "sizes must be positive (d = {}, N = {}, M = {}, m = {})",
                dims, big_n, m_total, cutoff
            )));
        }
        if n < big_n {
            return Err(FlagsError::invalid(format!(
                "oversampled grid {} is smaller than N = {}",
                n, big_n
            )));
        }
        let geometry = Self {
            dims,
            big_n,
            m_total,
            n,
            cutoff,
        };
        let exp = u32::try_from(dims).map_err(|_| FlagsError::invalid("dimension too large"))?;
        if n.checked_pow(exp).is_none() || m_total.checked_mul(dims).is_none() {
            return Err(FlagsError::invalid(format!(
                "grid of side {} in {} dimensions overflows usize",
                n, dims
            )));
        }
        Ok(geometry)
    }

    /// `N^d`, the number of Fourier coefficients.
    pub fn n_total_target(&self) -> usize {
        self.big_n.pow(self.dims as u32)
    }

    /// `n^d`, the oversampled grid size.
    pub fn grid_len(&self) -> usize {
        self.n.pow(self.dims as u32)
    }

    /// Window points per dimension.
    pub fn window_len(&self) -> usize {
        2 * self.cutoff + 2
    }
}

fn lin_psi_len(cutoff: usize) -> Option<usize> {
    LIN_PSI_RESOLUTION.checked_mul(cutoff + 1)?.checked_add(1)
}

fn full_window_len(geometry: &Geometry) -> Option<usize> {
    geometry
        .window_len()
        .checked_pow(u32::try_from(geometry.dims).ok()?)
}

fn alloc_table<T: Clone>(
    strategy: Strategy,
    what: &str,
    len: usize,
    fill: T,
) -> Result<Vec<T>, FlagsError> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(len)
        .map_err(|err| FlagsError::VariantConstructionFailure {
            strategy,
            reason: format!("{} of {} elements: {}", what, len, err),
        })?;
    table.resize(len, fill);
    Ok(table)
}

/// Oversampled grid and FFT backend shared by the plans of one pass.
///
/// Plans are evaluated one after another, so a single grid serves them all.
pub struct Workspace {
    grid: Vec<Complex64>,
    fft: NdFft,
}

impl Workspace {
    /// Allocate the `n^d` grid and plan its FFT.
    ///
    /// An allocation the system refuses is a
    /// [`FlagsError::VariantConstructionFailure`] charged to
    /// [`Strategy::Direct`], since no plan can run without the grid.
    pub fn new(geometry: &Geometry) -> Result<Self, FlagsError> {
        let grid = alloc_table(
            Strategy::Direct,
            "oversampled grid",
            geometry.grid_len(),
            Complex64::new(0.0, 0.0),
        )?;
        Ok(Self {
            grid,
            fft: NdFft::new(geometry.dims, geometry.n),
        })
    }

    pub fn grid_len(&self) -> usize {
        self.grid.len()
    }
}

enum Tables {
    Empty,
    PhiHut(Vec<f64>),
    FgExp(Vec<f64>),
    Lin(Vec<f64>),
    FgPre { exp_l: Vec<f64>, factors: Vec<f64> },
    Psi(Vec<f64>),
    FullPsi { psi: Vec<f64>, index: Vec<usize> },
}

/// One transform instance bound to a strategy and to borrowed input.
pub struct Plan<'a> {
    geometry: Geometry,
    strategy: Strategy,
    window: Gaussian,
    inputs: &'a InputSet,
    tables: Tables,
    precomputed: bool,
    samples: Vec<Complex64>,
    timings: TimingBreakdown,
    psi: Vec<f64>,
    starts: Vec<i64>,
}

impl<'a> Plan<'a> {
    /// Bind a plan to `inputs`. Call [`Plan::precompute`] before evaluating.
    ///
    /// Fails with [`FlagsError::VariantConstructionFailure`] if the output
    /// buffer cannot be allocated.
    pub fn new(
        geometry: Geometry,
        strategy: Strategy,
        inputs: &'a InputSet,
    ) -> Result<Self, FlagsError> {
        if inputs.dims() != geometry.dims {
            return Err(FlagsError::invalid(format!(
                "input has {} dimensions, plan expects {}",
                inputs.dims(),
                geometry.dims
            )));
        }
        if inputs.node_count() != geometry.m_total {
            return Err(FlagsError::LengthMismatch {
                expected: geometry.m_total,
                actual: inputs.node_count(),
            });
        }
        if inputs.coefficients().len() != geometry.n_total_target() {
            return Err(FlagsError::LengthMismatch {
                expected: geometry.n_total_target(),
                actual: inputs.coefficients().len(),
            });
        }
        let samples = alloc_table(
            strategy,
            "output buffer",
            geometry.m_total,
            Complex64::new(0.0, 0.0),
        )?;
        Ok(Self {
            geometry,
            strategy,
            window: Gaussian::new(geometry.big_n, geometry.n, geometry.cutoff),
            inputs,
            tables: Tables::Empty,
            precomputed: false,
            samples,
            timings: TimingBreakdown::default(),
            psi: vec![0.0; geometry.dims * geometry.window_len()],
            starts: vec![0; geometry.dims],
        })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The shared input this plan reads.
    pub fn inputs(&self) -> &'a InputSet {
        self.inputs
    }

    /// Output of the most recent evaluation.
    pub fn samples(&self) -> &[Complex64] {
        &self.samples
    }

    pub fn timings(&self) -> &TimingBreakdown {
        &self.timings
    }

    pub fn is_precomputed(&self) -> bool {
        self.precomputed
    }

    /// Build the strategy tables, refusing anything above `budget` bytes.
    pub fn precompute(&mut self, budget: Option<usize>) -> Result<(), FlagsError> {
        if self.precomputed {
            return Ok(());
        }
        let strategy = self.strategy;
        let bytes = strategy.table_bytes(&self.geometry).ok_or_else(|| {
            FlagsError::VariantConstructionFailure {
                strategy,
                reason: "table size overflows usize".into(),
            }
        })?;
        if let Some(limit) = budget {
            if bytes > limit {
                return Err(FlagsError::VariantConstructionFailure {
                    strategy,
                    reason: format!("needs {} bytes, budget is {}", bytes, limit),
                });
            }
        }
        self.tables = match strategy {
            Strategy::Direct => Tables::Empty,
            Strategy::PrePhiHut => Tables::PhiHut(self.phi_hut_table()?),
            Strategy::FgPsi => Tables::FgExp(self.fg_exp_table()?),
            Strategy::PreLinPsi => Tables::Lin(self.lin_psi_table()?),
            Strategy::PreFgPsi => {
                let exp_l = self.fg_exp_table()?;
                let factors = self.fg_factor_table()?;
                Tables::FgPre { exp_l, factors }
            }
            Strategy::PrePsi => Tables::Psi(self.psi_table()?),
            Strategy::PreFullPsi => self.full_psi_tables()?,
        };
        self.precomputed = true;
        debug!("{}: precomputed {} bytes of tables", strategy, bytes);
        Ok(())
    }

    fn phi_hut_table(&self) -> Result<Vec<f64>, FlagsError> {
        let big_n = self.geometry.big_n;
        let mut table = alloc_table(self.strategy, "deconvolution table", big_n, 0.0)?;
        let half = (big_n / 2) as i64;
        for (i, v) in table.iter_mut().enumerate() {
            *v = self.window.deconvolution(i as i64 - half);
        }
        Ok(table)
    }

    fn fg_exp_table(&self) -> Result<Vec<f64>, FlagsError> {
        let mut table = alloc_table(self.strategy, "exponential table", self.window.width(), 0.0)?;
        for (l, v) in table.iter_mut().enumerate() {
            let l = l as f64;
            *v = (-(l * l) / self.window.b).exp();
        }
        Ok(table)
    }

    fn lin_psi_table(&self) -> Result<Vec<f64>, FlagsError> {
        let len = lin_psi_len(self.geometry.cutoff).unwrap_or(0);
        let mut table = alloc_table(self.strategy, "window samples", len, 0.0)?;
        let step = (self.geometry.cutoff + 1) as f64 / LIN_PSI_RESOLUTION as f64;
        for (i, v) in table.iter_mut().enumerate() {
            *v = self.window.phi_grid(i as f64 * step);
        }
        Ok(table)
    }

    fn fg_factor_table(&self) -> Result<Vec<f64>, FlagsError> {
        let nodes = self.inputs.nodes();
        let mut table = alloc_table(self.strategy, "gridding factors", 2 * nodes.len(), 0.0)?;
        for (pair, &x) in table.chunks_exact_mut(2).zip(nodes.iter()) {
            let (psi0, psi1) = self.fg_factors(x);
            pair[0] = psi0;
            pair[1] = psi1;
        }
        Ok(table)
    }

    fn psi_table(&self) -> Result<Vec<f64>, FlagsError> {
        let w = self.window.width();
        let nodes = self.inputs.nodes();
        let mut table = alloc_table(self.strategy, "window table", nodes.len() * w, 0.0)?;
        for (row, &x) in table.chunks_exact_mut(w).zip(nodes.iter()) {
            direct_psi(&self.window, x, row);
        }
        Ok(table)
    }

    fn full_psi_tables(&self) -> Result<Tables, FlagsError> {
        let dims = self.geometry.dims;
        let w = self.window.width();
        let per_node = full_window_len(&self.geometry).unwrap_or(0);
        let len = self.geometry.m_total * per_node;
        let mut psi = alloc_table(self.strategy, "tensor window table", len, 0.0)?;
        let mut index = alloc_table(self.strategy, "grid index table", len, 0usize)?;
        let mut local = vec![0.0; dims * w];
        let mut starts = vec![0i64; dims];
        for j in 0..self.geometry.m_total {
            let node = self.inputs.node(j);
            for (t, &x) in node.iter().enumerate() {
                starts[t] = self.window.start(x);
                direct_psi(&self.window, x, &mut local[t * w..(t + 1) * w]);
            }
            let base = j * per_node;
            for_each_window_point(dims, w, self.geometry.n, &starts, &local, |r, g, weight| {
                psi[base + r] = weight;
                index[base + r] = g;
            });
        }
        Ok(Tables::FullPsi { psi, index })
    }

    /// Scaled `exp(-y0^2 / b)` and `exp(2 y0 / b)` for the window start of `x`.
    fn fg_factors(&self, x: f64) -> (f64, f64) {
        let y0 = self.geometry.n as f64 * x - self.window.start(x) as f64;
        let b = self.window.b;
        (
            self.window.norm() * (-(y0 * y0) / b).exp(),
            (2.0 * y0 / b).exp(),
        )
    }

    /// Approximate forward transform into [`Plan::samples`], using
    /// `workspace` for the oversampled grid.
    pub fn trafo(&mut self, workspace: &mut Workspace) -> Result<(), FlagsError> {
        if !self.precomputed {
            return Err(FlagsError::invalid(format!(
                "{} plan evaluated before precomputation",
                self.strategy
            )));
        }
        if workspace.grid.len() != self.geometry.grid_len() {
            return Err(FlagsError::LengthMismatch {
                expected: self.geometry.grid_len(),
                actual: workspace.grid.len(),
            });
        }
        let Workspace { grid, fft } = workspace;
        let start = Instant::now();
        self.deconvolve(grid);
        self.timings
            .set(Phase::Deconvolve, start.elapsed().as_secs_f64());

        let start = Instant::now();
        fft.process(grid)?;
        self.timings.set(Phase::Fft, start.elapsed().as_secs_f64());

        let start = Instant::now();
        self.convolve(grid);
        self.timings
            .set(Phase::Convolve, start.elapsed().as_secs_f64());
        Ok(())
    }

    fn deconvolve(&self, grid: &mut [Complex64]) {
        let dims = self.geometry.dims;
        let big_n = self.geometry.big_n;
        let n = self.geometry.n;
        let half = (big_n / 2) as i64;
        let table = match &self.tables {
            Tables::PhiHut(table) => Some(table.as_slice()),
            _ => None,
        };
        grid.fill(Complex64::new(0.0, 0.0));
        for (flat, &coef) in self.inputs.coefficients().iter().enumerate() {
            let mut rest = flat;
            let mut target = 0usize;
            let mut stride = 1usize;
            let mut factor = 1.0;
            for _ in 0..dims {
                let i = rest % big_n;
                rest /= big_n;
                let k = i as i64 - half;
                factor *= match table {
                    Some(table) => table[i],
                    None => self.window.deconvolution(k),
                };
                target += k.rem_euclid(n as i64) as usize * stride;
                stride *= n;
            }
            grid[target] = coef * factor;
        }
    }

    fn convolve(&mut self, grid: &[Complex64]) {
        let dims = self.geometry.dims;
        let w = self.window.width();
        let n = self.geometry.n;
        if let Tables::FullPsi { psi, index } = &self.tables {
            let per_node = psi.len() / self.geometry.m_total;
            for (j, out) in self.samples.iter_mut().enumerate() {
                let range = j * per_node..(j + 1) * per_node;
                *out = psi[range.clone()]
                    .iter()
                    .zip(index[range].iter())
                    .map(|(&weight, &g)| grid[g] * weight)
                    .sum();
            }
            return;
        }
        for j in 0..self.geometry.m_total {
            let node = self.inputs.node(j);
            for (t, &x) in node.iter().enumerate() {
                self.starts[t] = self.window.start(x);
                let row = &mut self.psi[t * w..(t + 1) * w];
                match &self.tables {
                    Tables::Empty | Tables::PhiHut(_) => direct_psi(&self.window, x, row),
                    Tables::FgExp(exp_l) => {
                        let y0 = n as f64 * x - self.starts[t] as f64;
                        let b = self.window.b;
                        let psi0 = self.window.norm() * (-(y0 * y0) / b).exp();
                        fg_psi(psi0, (2.0 * y0 / b).exp(), exp_l, row);
                    }
                    Tables::FgPre { exp_l, factors } => {
                        let at = 2 * (j * dims + t);
                        fg_psi(factors[at], factors[at + 1], exp_l, row);
                    }
                    Tables::Lin(table) => {
                        lin_psi(table, self.geometry.cutoff, n as f64 * x, self.starts[t], row)
                    }
                    Tables::Psi(table) => {
                        let at = (j * dims + t) * w;
                        row.copy_from_slice(&table[at..at + w]);
                    }
                    Tables::FullPsi { .. } => unreachable!("handled above"),
                }
            }
            let mut acc = Complex64::new(0.0, 0.0);
            for_each_window_point(dims, w, n, &self.starts, &self.psi, |_, g, weight| {
                acc += grid[g] * weight;
            });
            self.samples[j] = acc;
        }
    }

    /// Brute-force reference evaluation of the same sum into `out`.
    pub fn ndft_into(&self, out: &mut [Complex64]) -> Result<(), FlagsError> {
        if out.len() != self.geometry.m_total {
            return Err(FlagsError::LengthMismatch {
                expected: self.geometry.m_total,
                actual: out.len(),
            });
        }
        let dims = self.geometry.dims;
        let big_n = self.geometry.big_n;
        let half = (big_n / 2) as i64;
        let coefficients = self.inputs.coefficients();
        for (j, out) in out.iter_mut().enumerate() {
            let node = self.inputs.node(j);
            let mut acc = Complex64::new(0.0, 0.0);
            for (flat, &coef) in coefficients.iter().enumerate() {
                let mut rest = flat;
                let mut phase = 0.0;
                for t in 0..dims {
                    let k = (rest % big_n) as i64 - half;
                    rest /= big_n;
                    phase += k as f64 * node[dims - 1 - t];
                }
                let angle = -2.0 * PI * phase;
                acc += coef * Complex64::new(angle.cos(), angle.sin());
            }
            *out = acc;
        }
        Ok(())
    }
}

/// Window values at the `2m + 2` grid points around `x`.
fn direct_psi(window: &Gaussian, x: f64, row: &mut [f64]) {
    let y0 = window.n as f64 * x - window.start(x) as f64;
    for (r, v) in row.iter_mut().enumerate() {
        *v = window.phi_grid(y0 - r as f64);
    }
}

/// `psi[r] = psi0 * psi1^r * exp(-r^2 / b)`, the expansion of
/// `exp(-(y0 - r)^2 / b)`.
fn fg_psi(psi0: f64, psi1: f64, exp_l: &[f64], row: &mut [f64]) {
    let mut cur = psi0;
    for (v, &e) in row.iter_mut().zip(exp_l.iter()) {
        *v = cur * e;
        cur *= psi1;
    }
}

fn lin_psi(table: &[f64], cutoff: usize, nx: f64, start: i64, row: &mut [f64]) {
    let last = table.len() - 1;
    let scale = LIN_PSI_RESOLUTION as f64 / (cutoff + 1) as f64;
    for (r, v) in row.iter_mut().enumerate() {
        let pos = (nx - (start + r as i64) as f64).abs() * scale;
        let idx = pos.floor() as usize;
        *v = if idx >= last {
            table[last]
        } else {
            let frac = pos - idx as f64;
            table[idx] + frac * (table[idx + 1] - table[idx])
        };
    }
}

/// Visit the `w^dims` tensor-product points of a window.
///
/// `psi` holds `w` values per dimension, `starts` the unwrapped first grid
/// index per dimension. Dimension 0 is the slowest axis of the grid. The
/// callback receives the running point number, the wrapped flat grid index
/// and the product weight.
fn for_each_window_point<F>(dims: usize, w: usize, n: usize, starts: &[i64], psi: &[f64], mut f: F)
where
    F: FnMut(usize, usize, f64),
{
    let total = w.pow(dims as u32);
    let n_i = n as i64;
    for r in 0..total {
        let mut rest = r;
        let mut g = 0usize;
        let mut weight = 1.0;
        for t in (0..dims).rev() {
            let digit = rest % w;
            rest /= w;
            weight *= psi[t * w + digit];
            g += (starts[t] + digit as i64).rem_euclid(n_i) as usize * n.pow((dims - 1 - t) as u32);
        }
        f(r, g, weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accuracy::relative_l2_error;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(dims: usize, big_n: usize, cutoff: usize) -> (Geometry, InputSet) {
        let m_total = big_n.pow(dims as u32);
        let geometry = Geometry::new(dims, big_n, m_total, 2 * big_n, cutoff).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let inputs =
            InputSet::generate(&mut rng, dims, m_total, geometry.n_total_target()).unwrap();
        (geometry, inputs)
    }

    #[test]
    fn table_sizes_grow_with_strategy() {
        let geometry = Geometry::new(2, 16, 256, 32, 4).unwrap();
        assert_eq!(Strategy::Direct.table_bytes(&geometry), Some(0));
        assert_eq!(Strategy::PrePhiHut.table_bytes(&geometry), Some(16 * 8));
        let psi = Strategy::PrePsi.table_bytes(&geometry).unwrap();
        let full = Strategy::PreFullPsi.table_bytes(&geometry).unwrap();
        assert_eq!(psi, 256 * 2 * 10 * 8);
        assert_eq!(full, 256 * 100 * 16);
        assert!(full > psi);
    }

    #[test]
    fn geometry_rejects_bad_sizes() {
        assert!(Geometry::new(0, 4, 4, 8, 2).is_err());
        assert!(Geometry::new(1, 8, 4, 4, 2).is_err());
        assert!(Geometry::new(1, 4, 4, 8, 0).is_err());
        assert!(Geometry::new(64, 4, 4, 8, 2).is_err());
    }

    #[test]
    fn plan_rejects_mismatched_inputs() {
        let (_, inputs) = setup(1, 8, 2);
        let other = Geometry::new(1, 8, 4, 16, 2).unwrap();
        assert!(matches!(
            Plan::new(other, Strategy::Direct, &inputs),
            Err(FlagsError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn trafo_requires_precompute() {
        let (geometry, inputs) = setup(1, 8, 2);
        let mut workspace = Workspace::new(&geometry).unwrap();
        let mut plan = Plan::new(geometry, Strategy::PrePsi, &inputs).unwrap();
        assert!(plan.trafo(&mut workspace).is_err());
        plan.precompute(None).unwrap();
        assert!(plan.trafo(&mut workspace).is_ok());
    }

    #[test]
    fn trafo_rejects_foreign_workspace() {
        let (geometry, inputs) = setup(1, 8, 2);
        let other = Geometry::new(1, 8, 8, 32, 2).unwrap();
        let mut workspace = Workspace::new(&other).unwrap();
        let mut plan = Plan::new(geometry, Strategy::Direct, &inputs).unwrap();
        plan.precompute(None).unwrap();
        assert!(matches!(
            plan.trafo(&mut workspace),
            Err(FlagsError::LengthMismatch {
                expected: 16,
                actual: 32
            })
        ));
    }

    #[test]
    fn refused_allocation_is_recoverable() {
        let err = alloc_table(Strategy::PrePsi, "window table", usize::MAX / 4, 0.0f64)
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("pre_psi"));
        assert!(err.to_string().contains("window table"));
    }

    #[test]
    fn oversized_grid_fails_softly() {
        // n^d fits usize but n^d complex values do not fit the address space.
        let geometry = Geometry::new(1, 1, 1, 1 << 62, 1).unwrap();
        match Workspace::new(&geometry) {
            Err(FlagsError::VariantConstructionFailure { strategy, reason }) => {
                assert_eq!(strategy, Strategy::Direct);
                assert!(reason.contains("oversampled grid"));
            }
            other => panic!("unexpected {:?}", other.map(|w| w.grid_len())),
        }
    }

    #[test]
    fn precompute_respects_budget() {
        let (geometry, inputs) = setup(2, 8, 2);
        let mut plan = Plan::new(geometry, Strategy::PreFullPsi, &inputs).unwrap();
        let err = plan.precompute(Some(64)).unwrap_err();
        assert!(err.is_recoverable());
        assert!(!plan.is_precomputed());
    }

    #[test]
    fn every_strategy_matches_ndft() {
        for dims in 1..=2 {
            let (geometry, inputs) = setup(dims, 8, 6);
            let mut reference = vec![Complex64::new(0.0, 0.0); geometry.m_total];
            let direct = Plan::new(geometry, Strategy::Direct, &inputs).unwrap();
            direct.ndft_into(&mut reference).unwrap();
            let mut workspace = Workspace::new(&geometry).unwrap();
            for strategy in Strategy::ALL {
                let mut plan = Plan::new(geometry, strategy, &inputs).unwrap();
                plan.precompute(None).unwrap();
                plan.trafo(&mut workspace).unwrap();
                let err = relative_l2_error(&reference, plan.samples()).unwrap();
                assert!(err < 1e-3, "d = {}, {}: error {}", dims, strategy, err);
            }
        }
    }

    #[test]
    fn fg_expansion_matches_gaussian() {
        let w = Gaussian::new(16, 32, 3);
        let x = 0.137;
        let mut direct = vec![0.0; w.width()];
        direct_psi(&w, x, &mut direct);
        let y0 = 32.0 * x - w.start(x) as f64;
        let exp_l: Vec<f64> = (0..w.width())
            .map(|l| (-((l * l) as f64) / w.b).exp())
            .collect();
        let mut fast = vec![0.0; w.width()];
        fg_psi(
            w.norm() * (-(y0 * y0) / w.b).exp(),
            (2.0 * y0 / w.b).exp(),
            &exp_l,
            &mut fast,
        );
        for (a, b) in direct.iter().zip(fast.iter()) {
            assert!((a - b).abs() < 1e-12, "{} vs {}", a, b);
        }
    }

    #[test]
    fn timings_cover_all_phases_after_trafo() {
        let (geometry, inputs) = setup(1, 16, 2);
        let mut workspace = Workspace::new(&geometry).unwrap();
        let mut plan = Plan::new(geometry, Strategy::FgPsi, &inputs).unwrap();
        assert_eq!(plan.timings().get(Phase::Fft), None);
        plan.precompute(None).unwrap();
        plan.trafo(&mut workspace).unwrap();
        for phase in [Phase::Deconvolve, Phase::Fft, Phase::Convolve] {
            assert!(plan.timings().get(phase).unwrap() >= 0.0);
        }
    }

    #[test]
    fn breakdown_accumulates_and_averages() {
        let mut total = TimingBreakdown::default();
        let mut one = TimingBreakdown::default();
        one.set(Phase::Fft, 2.0);
        one.set(Phase::Convolve, 4.0);
        total.accumulate(&one);
        total.accumulate(&one);
        let avg = total.averaged(2);
        assert_eq!(avg.fft, Some(2.0));
        assert_eq!(avg.convolve, Some(4.0));
        assert_eq!(avg.deconvolve, None);
    }
}
