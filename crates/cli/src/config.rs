use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use town_doctor::normalize_name;
use town_layout::MAYOR_DIR;

pub const CONFIG_FILE: &str = "doctor.toml";

pub const ENV_SLOW_MS: &str = "GT_DOCTOR_SLOW_MS";
pub const ENV_BD_BIN: &str = "GT_BD_BIN";
pub const ENV_TMUX_BIN: &str = "GT_TMUX_BIN";
pub const ENV_GIT_BIN: &str = "GT_GIT_BIN";

/// `<town>/mayor/doctor.toml`, with environment overrides applied on top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DoctorConfig {
    pub slow_threshold_ms: Option<u64>,
    pub disabled_checks: Vec<String>,
    pub bd_binary: Option<String>,
    pub tmux_binary: Option<String>,
    pub git_binary: Option<String>,
}

pub fn config_path(town_root: &Path) -> PathBuf {
    town_root.join(MAYOR_DIR).join(CONFIG_FILE)
}

impl DoctorConfig {
    /// Read the town's config file; a missing file yields defaults.
    pub fn load(town_root: &Path) -> Result<Self> {
        let path = config_path(town_root);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: DoctorConfig =
            toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded doctor config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment variables as returned by `lookup`.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_SLOW_MS) {
            let ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_SLOW_MS} must be milliseconds, got {raw:?}"))?;
            self.slow_threshold_ms = Some(ms);
        }
        if let Some(bin) = lookup(ENV_BD_BIN) {
            self.bd_binary = Some(bin);
        }
        if let Some(bin) = lookup(ENV_TMUX_BIN) {
            self.tmux_binary = Some(bin);
        }
        if let Some(bin) = lookup(ENV_GIT_BIN) {
            self.git_binary = Some(bin);
        }
        Ok(self)
    }

    pub fn slow_threshold(&self) -> Option<Duration> {
        self.slow_threshold_ms.map(Duration::from_millis)
    }

    pub fn is_disabled(&self, check_name: &str) -> bool {
        let name = normalize_name(check_name);
        self.disabled_checks
            .iter()
            .any(|disabled| normalize_name(disabled) == name)
    }

    pub fn bd_binary(&self) -> &str {
        self.bd_binary.as_deref().unwrap_or("bd")
    }

    pub fn tmux_binary(&self) -> &str {
        self.tmux_binary.as_deref().unwrap_or("tmux")
    }

    pub fn git_binary(&self) -> &str {
        self.git_binary.as_deref().unwrap_or("git")
    }
}
