//! Detector tuning knobs.
//!
//! The library never reads files itself; whatever configuration front-end an
//! application uses fills this in and hands it to
//! [`PulseDetector::new`](crate::pulse::PulseDetector::new).

use serde::{Deserialize, Serialize};

/// Settings for one detector instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Sample rate of both input streams in Hz
    pub sample_rate: u32,
    /// Fixed detection threshold in raw envelope units; 0 = adaptive
    pub level_limit: i16,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 250_000,
            level_limit: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.sample_rate, 250_000);
        assert_eq!(config.level_limit, 0);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: DetectorConfig = toml::from_str("sample_rate = 1000000").unwrap();
        assert_eq!(config.sample_rate, 1_000_000);
        assert_eq!(config.level_limit, 0);
    }

    #[test]
    fn toml_round_trip() {
        let config = DetectorConfig {
            sample_rate: 2_000_000,
            level_limit: 1200,
        };
        let s = toml::to_string(&config).unwrap();
        let back: DetectorConfig = toml::from_str(&s).unwrap();
        assert_eq!(back, config);
    }
}
