//! Sweep configuration, validation and environment overrides.

use std::env;
use std::time::Duration;

use crate::error::FlagsError;
use crate::timer::NOISE_FLOOR;

/// Exponent above which the size sweep drops the reference NDFT and the
/// full tensor-product table.
pub const DEFAULT_SIZE_CAP: usize = 20;

pub const ENV_SIZE_CAP: &str = "NFFT_FLAGS_SIZE_CAP";
pub const ENV_MAX_TABLE_BYTES: &str = "NFFT_FLAGS_MAX_TABLE_BYTES";
pub const ENV_NOISE_FLOOR: &str = "NFFT_FLAGS_NOISE_FLOOR";

/// Which parameter a sweep varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Mode 0: vary the size exponent `l`, `N = 2^l`, `M = 2^(d l)`.
    Size,
    /// Mode 1: vary the cutoff `m` at fixed `N`.
    Cutoff,
}

impl Mode {
    pub fn from_code(code: i64) -> Result<Self, FlagsError> {
        match code {
            0 => Ok(Mode::Size),
            1 => Ok(Mode::Cutoff),
            other => Err(FlagsError::invalid(format!(
                "mode must be 0 or 1, got {}",
                other
            ))),
        }
    }
}

/// Optional settings that may come from the environment or the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overrides {
    pub size_cap: Option<usize>,
    pub max_table_bytes: Option<usize>,
    pub noise_floor: Option<f64>,
}

impl Overrides {
    /// Read `NFFT_FLAGS_*` variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FlagsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            size_cap: parse_var(&lookup, ENV_SIZE_CAP)?,
            max_table_bytes: parse_var(&lookup, ENV_MAX_TABLE_BYTES)?,
            noise_floor: parse_var(&lookup, ENV_NOISE_FLOOR)?,
        })
    }

    /// Read `NFFT_FLAGS_*` variables from the process environment.
    pub fn from_env() -> Result<Self, FlagsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Values set in `other` win over values set here.
    pub fn merge(self, other: Overrides) -> Overrides {
        Overrides {
            size_cap: other.size_cap.or(self.size_cap),
            max_table_bytes: other.max_table_bytes.or(self.max_table_bytes),
            noise_floor: other.noise_floor.or(self.noise_floor),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, FlagsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            FlagsError::invalid(format!("{} has unparsable value {:?}", key, raw))
        }),
    }
}

/// Parameters of one sweep. Immutable once the sweep starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub mode: Mode,
    /// First exponent (size mode) or cutoff (cutoff mode).
    pub low: usize,
    /// Last exponent or cutoff, inclusive.
    pub high: usize,
    pub trials: usize,
    pub dims: usize,
    /// Cutoff `m` in size mode, `N` in cutoff mode.
    pub param: usize,
    pub size_cap: usize,
    pub max_table_bytes: Option<usize>,
    pub noise_floor: Duration,
    pub seed: u64,
}

impl SweepConfig {
    /// Build from the six positional values of the command line.
    pub fn from_raw(
        mode: i64,
        low: i64,
        high: i64,
        trials: i64,
        dims: i64,
        param: i64,
    ) -> Result<Self, FlagsError> {
        let mode = Mode::from_code(mode)?;
        let low_name = match mode {
            Mode::Size => "first exponent",
            Mode::Cutoff => "first cutoff",
        };
        let config = Self {
            mode,
            low: non_negative(low, low_name)?,
            high: non_negative(high, "last value")?,
            trials: non_negative(trials, "trials")?,
            dims: non_negative(dims, "dimension")?,
            param: non_negative(param, "last argument")?,
            size_cap: DEFAULT_SIZE_CAP,
            max_table_bytes: None,
            noise_floor: NOISE_FLOOR,
            seed: 0,
        };
        Ok(config)
    }

    /// Apply optional settings on top of the defaults.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self, FlagsError> {
        if let Some(cap) = overrides.size_cap {
            self.size_cap = cap;
        }
        if overrides.max_table_bytes.is_some() {
            self.max_table_bytes = overrides.max_table_bytes;
        }
        if let Some(secs) = overrides.noise_floor {
            self.noise_floor = Duration::try_from_secs_f64(secs).map_err(|_| {
                FlagsError::invalid(format!(
                    "noise floor must be a non-negative number of seconds, got {}",
                    secs
                ))
            })?;
        }
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject configurations that cannot produce a single valid pass.
    pub fn validate(&self) -> Result<(), FlagsError> {
        if self.low > self.high {
            return Err(FlagsError::invalid(format!(
                "range is empty ({} > {})",
                self.low, self.high
            )));
        }
        if self.trials == 0 {
            return Err(FlagsError::invalid("trials must be positive"));
        }
        if self.dims == 0 {
            return Err(FlagsError::invalid("dimension must be positive"));
        }
        if self.param == 0 {
            return Err(FlagsError::invalid(match self.mode {
                Mode::Size => "cutoff m must be positive",
                Mode::Cutoff => "problem size N must be positive",
            }));
        }
        match self.mode {
            Mode::Size => {
                // M = 2^(d l) and n = 2^(l + 1) must fit.
                let bits = usize::BITS as usize - 1;
                let node_bits = self.high.checked_mul(self.dims);
                if self.high + 1 >= bits || node_bits.map_or(true, |b| b >= bits) {
                    return Err(FlagsError::invalid(format!(
                        "exponent {} in {} dimensions overflows the problem size",
                        self.high, self.dims
                    )));
                }
            }
            Mode::Cutoff => {
                if self.low == 0 {
                    return Err(FlagsError::invalid("cutoff m must be positive"));
                }
                let exp = u32::try_from(self.dims)
                    .map_err(|_| FlagsError::invalid("dimension too large"))?;
                let grid = self.param.checked_mul(2).and_then(|n| n.checked_pow(exp));
                if grid.is_none() {
                    return Err(FlagsError::invalid(format!(
                        "N = {} in {} dimensions overflows the grid size",
                        self.param, self.dims
                    )));
                }
            }
        }
        Ok(())
    }
}

fn non_negative(value: i64, what: &str) -> Result<usize, FlagsError> {
    usize::try_from(value)
        .map_err(|_| FlagsError::invalid(format!("{} must be non-negative, got {}", what, value)))
}
