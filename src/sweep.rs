//! Sweep controller and measurement passes.
//!
//! A sweep walks a range of configurations (size exponents or cutoffs) and
//! runs `trials` measurement passes for each. Every pass draws fresh input,
//! builds one plan per strategy over that input, times the plans and writes
//! one report row.

use std::io::Write;
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use log::{debug, info, warn};
use rand::Rng;
use rustfft::num_complex::Complex64;

use crate::accuracy::relative_l2_error;
use crate::config::{Mode, SweepConfig};
use crate::error::FlagsError;
use crate::input::InputSet;
use crate::plan::{Geometry, Plan, Strategy, TimingBreakdown, Workspace};
use crate::report::{ReportRow, ReportWriter};
use crate::timer::adaptive_time;

/// One point of the sweep range.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Size exponent `l` (size mode) or cutoff `m` (cutoff mode).
    pub value: usize,
    pub geometry: Geometry,
    /// Whether the brute-force reference runs.
    pub reference: bool,
    /// Strategies to build, `Strategy::Direct` first.
    pub strategies: Vec<Strategy>,
}

/// Settings every pass of a sweep shares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSettings {
    pub noise_floor: Duration,
    pub max_table_bytes: Option<usize>,
}

/// The plans of one pass, all reading the same [`InputSet`].
pub struct VariantSet<'a> {
    plans: Vec<Plan<'a>>,
    failures: Vec<(Strategy, FlagsError)>,
}

impl<'a> VariantSet<'a> {
    pub fn plans(&self) -> &[Plan<'a>] {
        &self.plans
    }

    pub fn get(&self, strategy: Strategy) -> Option<&Plan<'a>> {
        self.plans.iter().find(|p| p.strategy() == strategy)
    }

    /// Strategies whose precomputation failed, with the reason.
    pub fn failures(&self) -> &[(Strategy, FlagsError)] {
        &self.failures
    }
}

/// Build and precompute one plan per strategy over `inputs`.
///
/// A strategy that cannot allocate its output or build its tables is
/// recorded in [`VariantSet::failures`] instead of failing the whole set.
pub fn build_variants<'a>(
    geometry: Geometry,
    inputs: &'a InputSet,
    strategies: &[Strategy],
    budget: Option<usize>,
) -> Result<VariantSet<'a>, FlagsError> {
    let mut plans = Vec::with_capacity(strategies.len());
    let mut failures = Vec::new();
    for &strategy in strategies {
        let built = Plan::new(geometry, strategy, inputs)
            .and_then(|mut plan| plan.precompute(budget).map(|()| plan));
        match built {
            Ok(plan) => plans.push(plan),
            Err(err) if err.is_recoverable() => {
                warn!("{}", err);
                failures.push((strategy, err));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(VariantSet { plans, failures })
}

/// Measurements of one completed pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub row: ReportRow,
    /// Relative error of every plan against the reference, if it ran.
    pub errors: Vec<(Strategy, f64)>,
    /// Calls made by the adaptive timer per plan.
    pub repetitions: Vec<(Strategy, usize)>,
    /// Strategies that failed to precompute in this pass.
    pub failures: Vec<Strategy>,
}

/// What became of one pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Completed(PassReport),
    /// The direct plan could not be built; nothing to report.
    Aborted { failures: Vec<Strategy> },
}

/// Run one pass: draw input, build plans, time them, compare them.
pub fn measure_pass<R: Rng + ?Sized>(
    config: &Configuration,
    settings: &PassSettings,
    skip: &HashSet<Strategy>,
    rng: &mut R,
) -> Result<PassOutcome, FlagsError> {
    let geometry = config.geometry;
    let inputs = InputSet::generate(
        rng,
        geometry.dims,
        geometry.m_total,
        geometry.n_total_target(),
    )?;
    let mut workspace = match Workspace::new(&geometry) {
        Ok(workspace) => workspace,
        Err(err) if err.is_recoverable() => {
            warn!("{}", err);
            return Ok(PassOutcome::Aborted {
                failures: vec![Strategy::Direct],
            });
        }
        Err(err) => return Err(err),
    };
    let strategies: Vec<Strategy> = config
        .strategies
        .iter()
        .copied()
        .filter(|s| !skip.contains(s))
        .collect();
    let mut variants = build_variants(geometry, &inputs, &strategies, settings.max_table_bytes)?;
    let failures: Vec<Strategy> = variants.failures().iter().map(|(s, _)| *s).collect();
    let direct = match variants.get(Strategy::Direct) {
        Some(plan) => plan,
        None => return Ok(PassOutcome::Aborted { failures }),
    };

    let reference = match reference_buffer(config.reference, geometry.m_total) {
        Some(mut out) => {
            let measured = adaptive_time(settings.noise_floor, || direct.ndft_into(&mut out))?;
            debug!(
                "ndft: {:.3e} s over {} calls",
                measured.per_call(),
                measured.repetitions
            );
            Some((out, measured.per_call()))
        }
        None => None,
    };

    let mut breakdowns: HashMap<Strategy, TimingBreakdown> = HashMap::new();
    let mut repetitions = Vec::with_capacity(variants.plans.len());
    for plan in variants.plans.iter_mut() {
        let mut sum = TimingBreakdown::default();
        let measured = adaptive_time(settings.noise_floor, || {
            plan.trafo(&mut workspace)?;
            sum.accumulate(plan.timings());
            Ok::<(), FlagsError>(())
        })?;
        debug!(
            "{}: {:.3e} s over {} calls",
            plan.strategy(),
            measured.per_call(),
            measured.repetitions
        );
        breakdowns.insert(plan.strategy(), sum.averaged(measured.repetitions));
        repetitions.push((plan.strategy(), measured.repetitions));
    }

    let mut errors = Vec::new();
    if let Some((reference, _)) = &reference {
        for plan in variants.plans() {
            let err = relative_l2_error(reference, plan.samples())?;
            debug!("{}: relative error {:.3e}", plan.strategy(), err);
            errors.push((plan.strategy(), err));
        }
    }
    let direct_error = errors
        .iter()
        .find(|(s, _)| *s == Strategy::Direct)
        .map(|&(_, e)| e);

    let row = ReportRow::new(
        geometry.dims,
        geometry.big_n,
        reference.as_ref().map(|(_, t)| *t),
        direct_error,
        |s| breakdowns.get(&s),
    );
    Ok(PassOutcome::Completed(PassReport {
        row,
        errors,
        repetitions,
        failures,
    }))
}

/// Output buffer for the reference, `None` if disabled or not allocatable.
fn reference_buffer(enabled: bool, len: usize) -> Option<Vec<Complex64>> {
    if !enabled {
        return None;
    }
    let mut out = Vec::new();
    if let Err(err) = out.try_reserve_exact(len) {
        warn!("skipping ndft: {}", err);
        return None;
    }
    out.resize(len, Complex64::new(0.0, 0.0));
    Some(out)
}

/// Totals of a finished sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub rows: usize,
    pub aborted: usize,
    pub strategy_failures: usize,
}

/// Drives every configuration and trial of a [`SweepConfig`].
#[derive(Debug, Clone)]
pub struct Sweep {
    config: SweepConfig,
}

impl Sweep {
    /// Validate `config`; nothing is measured on failure.
    pub fn new(config: SweepConfig) -> Result<Self, FlagsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn settings(&self) -> PassSettings {
        PassSettings {
            noise_floor: self.config.noise_floor,
            max_table_bytes: self.config.max_table_bytes,
        }
    }

    /// Every configuration of the sweep range, in order.
    pub fn configurations(&self) -> Result<Vec<Configuration>, FlagsError> {
        let cfg = &self.config;
        (cfg.low..=cfg.high)
            .map(|value| match cfg.mode {
                Mode::Size => size_configuration(cfg, value),
                Mode::Cutoff => cutoff_configuration(cfg, value),
            })
            .collect()
    }

    /// Run the sweep, writing one row per completed pass.
    pub fn run<R, W>(&self, rng: &mut R, report: &mut ReportWriter<W>) -> Result<SweepSummary, FlagsError>
    where
        R: Rng + ?Sized,
        W: Write,
    {
        let settings = self.settings();
        let mut summary = SweepSummary::default();
        for config in self.configurations()? {
            let g = config.geometry;
            let swept = match self.config.mode {
                Mode::Size => "l",
                Mode::Cutoff => "m",
            };
            info!(
                "{} = {}: d = {}, N = {}, M = {}, n = {}, m = {}, reference = {}",
                swept, config.value, g.dims, g.big_n, g.m_total, g.n, g.cutoff, config.reference
            );
            let mut skip = HashSet::new();
            for trial in 0..self.config.trials {
                match measure_pass(&config, &settings, &skip, rng)? {
                    PassOutcome::Completed(pass) => {
                        report.write_row(&pass.row)?;
                        summary.rows += 1;
                        summary.strategy_failures += pass.failures.len();
                        for strategy in pass.failures {
                            warn!(
                                "skipping {} for the remaining trials of this configuration",
                                strategy
                            );
                            skip.insert(strategy);
                        }
                    }
                    PassOutcome::Aborted { failures } => {
                        warn!("trial {} aborted: direct plan could not be built", trial);
                        summary.aborted += 1;
                        summary.strategy_failures += failures.len();
                        skip.extend(failures.into_iter().filter(|s| *s != Strategy::Direct));
                    }
                }
            }
        }
        Ok(summary)
    }
}

fn pow2(exp: usize) -> Result<usize, FlagsError> {
    u32::try_from(exp)
        .ok()
        .and_then(|e| 1usize.checked_shl(e))
        .filter(|v| v.trailing_zeros() as usize == exp)
        .ok_or_else(|| FlagsError::invalid(format!("2^{} overflows usize", exp)))
}

fn size_configuration(cfg: &SweepConfig, l: usize) -> Result<Configuration, FlagsError> {
    let node_exp = cfg
        .dims
        .checked_mul(l)
        .ok_or_else(|| FlagsError::invalid("node exponent overflows"))?;
    let geometry = Geometry::new(cfg.dims, pow2(l)?, pow2(node_exp)?, pow2(l + 1)?, cfg.param)?;
    let enabled = l <= cfg.size_cap;
    if !enabled {
        info!(
            "exponent {} exceeds cap {}: reference and {} disabled",
            l,
            cfg.size_cap,
            Strategy::PreFullPsi
        );
    }
    let strategies = Strategy::ALL
        .into_iter()
        .filter(|&s| enabled || s != Strategy::PreFullPsi)
        .collect();
    Ok(Configuration {
        value: l,
        geometry,
        reference: enabled,
        strategies,
    })
}

fn cutoff_configuration(cfg: &SweepConfig, m: usize) -> Result<Configuration, FlagsError> {
    let big_n = cfg.param;
    let exp = u32::try_from(cfg.dims).map_err(|_| FlagsError::invalid("dimension too large"))?;
    let m_total = big_n
        .checked_pow(exp)
        .ok_or_else(|| FlagsError::invalid("node count overflows usize"))?;
    let n = big_n
        .checked_mul(2)
        .ok_or_else(|| FlagsError::invalid("grid size overflows usize"))?;
    let geometry = Geometry::new(cfg.dims, big_n, m_total, n, m)?;
    Ok(Configuration {
        value: m,
        geometry,
        reference: true,
        strategies: Strategy::ALL.to_vec(),
    })
}
