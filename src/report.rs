//! Tab-separated report rows, one per measurement pass.
//!
//! Rows are rendered completely before anything is written, so a pass that
//! fails never leaves a partial line on the output stream.

use std::io::{self, Write};

use crate::plan::{Phase, Strategy, TimingBreakdown};

/// Description written to the error stream before any row.
pub const HEADER: &str = "Testing different precomputation schemes for the nfft.\n\
Columns: d, N=M, t_ndft, e_nfft, t_D, t_pre_phi_hut, t_fftw, t_B, t_fg_psi, \
t_pre_lin_psi, t_pre_fg_psi, t_pre_psi, t_pre_full_psi\n\n";

/// Token for a value that was not measured.
pub const MISSING: &str = "nan";

/// One timing column: the phase of a given strategy's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub strategy: Strategy,
    pub phase: Phase,
}

const fn column(name: &'static str, strategy: Strategy, phase: Phase) -> Column {
    Column {
        name,
        strategy,
        phase,
    }
}

/// Timing columns after `d, N, t_ndft, e_nfft`, in output order.
pub const TIMING_COLUMNS: [Column; 9] = [
    column("t_D", Strategy::Direct, Phase::Deconvolve),
    column("t_pre_phi_hut", Strategy::PrePhiHut, Phase::Deconvolve),
    column("t_fftw", Strategy::Direct, Phase::Fft),
    column("t_B", Strategy::Direct, Phase::Convolve),
    column("t_fg_psi", Strategy::FgPsi, Phase::Convolve),
    column("t_pre_lin_psi", Strategy::PreLinPsi, Phase::Convolve),
    column("t_pre_fg_psi", Strategy::PreFgPsi, Phase::Convolve),
    column("t_pre_psi", Strategy::PrePsi, Phase::Convolve),
    column("t_pre_full_psi", Strategy::PreFullPsi, Phase::Convolve),
];

/// Number of fields in every row.
pub const FIELD_COUNT: usize = 4 + TIMING_COLUMNS.len();

/// Format like C's `%.2e`: `1.23e-04`, `-5.00e+00`.
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return MISSING.to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let rust = format!("{:.2e}", value);
    let (mantissa, exp) = match rust.split_once('e') {
        Some(parts) => parts,
        None => return rust,
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exp.abs())
}

fn field(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), format_sci)
}

/// Everything measured in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub dims: usize,
    pub size: usize,
    pub reference_time: Option<f64>,
    pub error: Option<f64>,
    pub timings: [Option<f64>; 9],
}

impl ReportRow {
    /// Fill the timing columns from per-strategy breakdowns; a strategy
    /// without a breakdown leaves its columns missing.
    pub fn new<'b, F>(
        dims: usize,
        size: usize,
        reference_time: Option<f64>,
        error: Option<f64>,
        breakdown: F,
    ) -> Self
    where
        F: Fn(Strategy) -> Option<&'b TimingBreakdown>,
    {
        let timings = TIMING_COLUMNS.map(|c| breakdown(c.strategy).and_then(|b| b.get(c.phase)));
        Self {
            dims,
            size,
            reference_time,
            error,
            timings,
        }
    }

    /// The complete line including the trailing newline.
    pub fn render(&self) -> String {
        let mut fields = Vec::with_capacity(FIELD_COUNT);
        fields.push(self.dims.to_string());
        fields.push(self.size.to_string());
        fields.push(field(self.reference_time));
        fields.push(field(self.error));
        fields.extend(self.timings.iter().map(|&t| field(t)));
        let mut line = fields.join("\t");
        line.push('\n');
        line
    }
}

/// Write the column description.
pub fn write_header<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(HEADER.as_bytes())?;
    out.flush()
}

/// Sink for report rows, in pass order.
pub struct ReportWriter<W: Write> {
    out: W,
    rows: usize,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, rows: 0 }
    }

    /// Emit `row` with a single write.
    pub fn write_row(&mut self, row: &ReportRow) -> io::Result<()> {
        let line = row.render();
        self.out.write_all(line.as_bytes())?;
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
