use std::env;
use std::process::Command;

/// Compiler flags derived from the host, applied to release runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildConfig {
    pub target_features: Vec<String>,
    pub extra_rustflags: Option<String>,
}

impl BuildConfig {
    /// Combined `RUSTFLAGS` value, if any flag applies.
    pub fn rustflags(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.target_features.is_empty() {
            let feats: Vec<String> = self
                .target_features
                .iter()
                .map(|f| format!("+{}", f))
                .collect();
            parts.push(format!("-C target-feature={}", feats.join(",")));
        }
        if let Some(extra) = &self.extra_rustflags {
            parts.push(extra.clone());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    fn apply(&self, cmd: &mut Command) {
        if let Some(rf) = self.rustflags() {
            cmd.env("RUSTFLAGS", rf);
        }
    }
}

/// Detect build configuration from the current machine.
pub fn detect_config() -> BuildConfig {
    let arch = detect_arch();
    let cpu_flags = detect_cpu_flags();
    let extra = env::var("NFFT_FLAGS_RUSTFLAGS").unwrap_or_default();
    compute_config(&arch, &cpu_flags, &extra)
}

fn detect_arch() -> String {
    if let Ok(arch) = env::var("ARCH") {
        if !arch.trim().is_empty() {
            return arch;
        }
    }
    Command::new("uname")
        .arg("-m")
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default()
}

fn detect_cpu_flags() -> String {
    if let Ok(out) = Command::new("lscpu").output() {
        let s = String::from_utf8_lossy(&out.stdout);
        for line in s.lines() {
            if line.to_lowercase().contains("flags") {
                return line.to_string();
            }
        }
    }
    if let Ok(out) = Command::new("sysctl")
        .args(["-n", "machdep.cpu.features"])
        .output()
    {
        return String::from_utf8_lossy(&out.stdout).to_string();
    }
    String::new()
}

/// Compute a [`BuildConfig`] from supplied inputs. Separated for testing.
pub fn compute_config(arch: &str, cpu_flags: &str, extra: &str) -> BuildConfig {
    let mut target_features = Vec::new();
    if arch.contains("x86_64") {
        if cpu_flags.contains("avx2") {
            target_features.push("avx2".to_string());
        }
        if cpu_flags.contains("fma") {
            target_features.push("fma".to_string());
        }
    } else if arch.contains("aarch64") || arch.contains("arm64") {
        target_features.push("neon".to_string());
    }
    let extra = extra.trim();
    BuildConfig {
        target_features,
        extra_rustflags: (!extra.is_empty()).then(|| extra.to_string()),
    }
}

pub fn build_command(cfg: &BuildConfig) -> Command {
    let mut cmd = Command::new("cargo");
    cfg.apply(&mut cmd);
    cmd.args(["build", "--release", "--workspace"]);
    cmd
}

pub fn test_command() -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["test", "--workspace"]);
    cmd
}

pub fn clippy_command() -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["clippy", "--all-targets", "--", "-D", "warnings"]);
    cmd
}

pub fn fmt_command() -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["fmt", "--all"]);
    cmd
}

pub fn bench_command(cfg: &BuildConfig) -> Command {
    let mut cmd = Command::new("cargo");
    cfg.apply(&mut cmd);
    cmd.args(["bench", "--bench", "strategies"]);
    cmd
}

/// Release run of the `flags` binary with `args` passed through.
pub fn sweep_command(cfg: &BuildConfig, args: &[String]) -> Command {
    let mut cmd = Command::new("cargo");
    cfg.apply(&mut cmd);
    cmd.args(["run", "--release", "--bin", "flags", "--"]);
    cmd.args(args);
    cmd
}
