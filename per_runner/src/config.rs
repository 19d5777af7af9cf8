//! Bench configuration for the runner
//!
//! An optional TOML file names the devices a run should drive and where log
//! output goes. Every field is optional; an absent file means a loopback
//! dry run.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default CAN bit rate when the config does not set one
pub const DEFAULT_BIT_RATE: u32 = 250_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// CAN adapter selector; only "loopback" ships in-tree
    pub can_device: Option<String>,
    pub bit_rate: Option<u32>,
    pub serial_device: Option<String>,
    pub gpio_device: Option<String>,
    pub log_file: Option<PathBuf>,
    pub verbose: Option<bool>,
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self, crate::RunnerError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn bit_rate(&self) -> u32 {
        self.bit_rate.unwrap_or(DEFAULT_BIT_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_full_config_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
can_device = "loopback"
bit_rate = 500000
serial_device = "ttyUSB0"
log_file = "run.log"
verbose = true
"#
        )
        .unwrap();

        let config = RunnerConfig::load(file.path()).unwrap();
        assert_eq!(config.can_device.as_deref(), Some("loopback"));
        assert_eq!(config.bit_rate(), 500_000);
        assert_eq!(config.verbose, Some(true));
    }

    #[test]
    fn test_empty_config_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = RunnerConfig::load(file.path()).unwrap();
        assert_eq!(config.can_device, None);
        assert_eq!(config.bit_rate(), DEFAULT_BIT_RATE);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "turbo = true").unwrap();
        assert!(RunnerConfig::load(file.path()).is_err());
    }
}
