// Test intent: verifies sweep rows, size-cap columns and strategy failure handling.
use std::time::Duration;

use nfft_flags::config::SweepConfig;
use nfft_flags::report::{ReportWriter, FIELD_COUNT, TIMING_COLUMNS};
use nfft_flags::sweep::Sweep;
use nfft_flags::Strategy;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn run(config: SweepConfig) -> (nfft_flags::sweep::SweepSummary, Vec<Vec<String>>) {
    let config = SweepConfig {
        noise_floor: Duration::from_micros(100),
        ..config
    };
    let sweep = Sweep::new(config).unwrap();
    let mut rng = StdRng::seed_from_u64(sweep.config().seed);
    let mut report = ReportWriter::new(Vec::new());
    let summary = sweep.run(&mut rng, &mut report).unwrap();
    let text = String::from_utf8(report.into_inner()).unwrap();
    assert!(text.is_empty() || text.ends_with('\n'));
    let rows = text
        .lines()
        .map(|l| l.split('\t').map(str::to_string).collect())
        .collect();
    (summary, rows)
}

fn column(name: &str) -> usize {
    4 + TIMING_COLUMNS.iter().position(|c| c.name == name).unwrap()
}

#[test]
fn size_sweep_single_pass() {
    let (summary, rows) = run(SweepConfig::from_raw(0, 4, 4, 1, 1, 2).unwrap());
    assert_eq!(summary.rows, 1);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.len(), FIELD_COUNT);
    assert_eq!(row[0], "1");
    assert_eq!(row[1], "16");
    assert_ne!(row[2], "nan");
    let err: f64 = row[3].parse().unwrap();
    assert!(err < 1e-1, "error {}", err);
    assert!(row[4..].iter().all(|f| f != "nan"));
}

#[test]
fn cutoff_sweep_writes_trials_per_cutoff() {
    let (summary, rows) = run(SweepConfig::from_raw(1, 2, 3, 2, 2, 8).unwrap());
    assert_eq!(summary.rows, 4);
    for row in &rows {
        assert_eq!(row[0], "2");
        assert_eq!(row[1], "8");
        assert_ne!(row[2], "nan");
        assert_ne!(row[3], "nan");
    }
}

#[test]
fn errors_shrink_with_cutoff() {
    let (_, rows) = run(SweepConfig::from_raw(1, 2, 8, 1, 1, 32).unwrap());
    let errors: Vec<f64> = rows.iter().map(|r| r[3].parse().unwrap()).collect();
    assert!(errors.last().unwrap() < errors.first().unwrap());
    assert!(*errors.last().unwrap() < 1e-6);
}

#[test]
fn size_cap_blanks_reference_and_full_table_only() {
    let config = SweepConfig {
        size_cap: 2,
        ..SweepConfig::from_raw(0, 2, 3, 1, 1, 2).unwrap()
    };
    let (_, rows) = run(config);
    assert_eq!(rows.len(), 2);
    let full = column("t_pre_full_psi");
    assert!(rows[0].iter().all(|f| f != "nan"));
    let capped = &rows[1];
    assert_eq!(capped.len(), FIELD_COUNT);
    assert_eq!(capped[1], "8");
    assert_eq!(capped[2], "nan");
    assert_eq!(capped[3], "nan");
    assert_eq!(capped[full], "nan");
    for (i, f) in capped.iter().enumerate() {
        if i != 2 && i != 3 && i != full {
            assert_ne!(f, "nan", "column {}", i);
        }
    }
}

#[test]
fn table_budget_failure_keeps_row() {
    // d = 2, N = 4, m = 2: pre_full_psi needs 16 * 36 * 16 bytes.
    let config = SweepConfig {
        max_table_bytes: Some(4096),
        ..SweepConfig::from_raw(1, 2, 2, 3, 2, 4).unwrap()
    };
    let (summary, rows) = run(config);
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.aborted, 0);
    // lin_psi and full_psi fail in the first trial and are not retried.
    assert_eq!(summary.strategy_failures, 2);
    let full = column("t_pre_full_psi");
    let lin = column("t_pre_lin_psi");
    for row in &rows {
        assert_eq!(row.len(), FIELD_COUNT);
        assert_eq!(row[full], "nan");
        assert_eq!(row[lin], "nan");
        assert_ne!(row[column("t_pre_psi")], "nan");
        assert_ne!(row[3], "nan");
    }
}

#[test]
fn same_seed_same_errors() {
    let config = SweepConfig::from_raw(1, 3, 3, 1, 1, 16).unwrap().with_seed(42);
    let (_, a) = run(config.clone());
    let (_, b) = run(config);
    assert_eq!(a[0][3], b[0][3]);
}

#[test]
fn strategy_names_match_columns() {
    for c in TIMING_COLUMNS.iter().skip(4) {
        assert_eq!(c.name, format!("t_{}", c.strategy.name()));
    }
    assert!(TIMING_COLUMNS.iter().any(|c| c.strategy == Strategy::PreFullPsi));
}
