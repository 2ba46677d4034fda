//! Configuration loading and management.

use crate::error::{LoadgenError, LoadgenResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Load shape applied to the aggregate target rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// No pacing at all; every worker loops as fast as it can.
    Burst,
    /// Fixed rate for the whole run.
    Sustained,
    /// Alternates between a tenth of the target and the full target.
    Spike,
    /// Starts at a tenth of the target and climbs by a tenth per step.
    Rampup,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Burst,
        Scenario::Sustained,
        Scenario::Spike,
        Scenario::Rampup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Burst => "burst",
            Scenario::Sustained => "sustained",
            Scenario::Spike => "spike",
            Scenario::Rampup => "rampup",
        }
    }

    /// Whether a background timer mutates the rate during the run.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Scenario::Spike | Scenario::Rampup)
    }
}

impl FromStr for Scenario {
    type Err = LoadgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| LoadgenError::UnknownScenario(s.to_string()))
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable run configuration, shared by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Collector endpoint (OTLP/gRPC)
    pub endpoint: String,
    /// Scenario name: burst, sustained, spike or rampup
    pub scenario: String,
    #[serde(with = "human_duration")]
    pub duration: Duration,
    pub workers: usize,
    /// Aggregate target rate across all workers (units/sec)
    pub rate: u64,
    /// Number of child units nested under each root
    pub depth: usize,
    /// Byte length of each attribute value's padding
    pub attr_size: usize,
    pub attr_count: usize,
    pub metrics: bool,
    pub logs: bool,
    /// Unique token per attribute value instead of a random integer
    pub high_cardinality: bool,
    /// Generate against an in-memory pipeline instead of the endpoint
    pub dry_run: bool,

    // Timing knobs. Defaults reproduce the classic loadgen behavior.
    #[serde(with = "human_duration")]
    pub step_interval: Duration,
    #[serde(with = "human_duration")]
    pub progress_interval: Duration,
    #[serde(with = "human_duration")]
    pub max_child_delay: Duration,
    #[serde(with = "human_duration")]
    pub shutdown_timeout: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:4317".to_string(),
            scenario: Scenario::Sustained.as_str().to_string(),
            duration: Duration::from_secs(60),
            workers: 10,
            rate: 1000,
            depth: 5,
            attr_size: 256,
            attr_count: 10,
            metrics: true,
            logs: false,
            high_cardinality: false,
            dry_run: false,
            step_interval: Duration::from_secs(10),
            progress_interval: Duration::from_secs(5),
            max_child_delay: Duration::from_millis(4),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl LoadConfig {
    /// Load configuration from YAML file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> LoadgenResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoadConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse the configured scenario name.
    pub fn scenario(&self) -> LoadgenResult<Scenario> {
        self.scenario.parse()
    }

    /// Endpoint as a URL; bare `host:port` gets an `http://` scheme.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("http://{}", self.endpoint)
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> LoadgenResult<()> {
        self.scenario()?;
        if self.workers == 0 {
            return Err(LoadgenError::InvalidConfig("workers must be > 0".into()));
        }
        if self.duration.is_zero() {
            return Err(LoadgenError::InvalidConfig("duration must be > 0".into()));
        }
        if self.step_interval.is_zero() {
            return Err(LoadgenError::InvalidConfig(
                "step_interval must be > 0".into(),
            ));
        }
        if self.progress_interval.is_zero() {
            return Err(LoadgenError::InvalidConfig(
                "progress_interval must be > 0".into(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(LoadgenError::InvalidConfig("endpoint must be set".into()));
        }
        Ok(())
    }
}

/// Serde adapter for `60s` / `1m30s` / `500ms` style durations.
mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.as_str().parse::<Scenario>().unwrap(), scenario);
        }
    }

    #[test]
    fn test_unknown_scenario_rejected() {
        let err = "foo".parse::<Scenario>().unwrap_err();
        assert!(matches!(err, LoadgenError::UnknownScenario(name) if name == "foo"));
    }

    #[test]
    fn test_only_spike_and_rampup_are_dynamic() {
        assert!(!Scenario::Burst.is_dynamic());
        assert!(!Scenario::Sustained.is_dynamic());
        assert!(Scenario::Spike.is_dynamic());
        assert!(Scenario::Rampup.is_dynamic());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = LoadConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scenario().unwrap(), Scenario::Sustained);
        assert_eq!(config.step_interval, Duration::from_secs(10));
        assert_eq!(config.progress_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = LoadConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadgenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_scenario() {
        let config = LoadConfig {
            scenario: "foo".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadgenError::UnknownScenario(_))
        ));
    }

    #[test]
    fn test_endpoint_url_adds_scheme() {
        let config = LoadConfig::default();
        assert_eq!(config.endpoint_url(), "http://localhost:4317");

        let config = LoadConfig {
            endpoint: "https://collector:4317".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint_url(), "https://collector:4317");
    }

    #[test]
    fn test_from_file_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "scenario: spike\nduration: 1m30s\nworkers: 4\nhigh_cardinality: true\nstep_interval: 500ms"
        )
        .unwrap();

        let config = LoadConfig::from_file(file.path()).unwrap();
        assert_eq!(config.scenario().unwrap(), Scenario::Spike);
        assert_eq!(config.duration, Duration::from_secs(90));
        assert_eq!(config.workers, 4);
        assert!(config.high_cardinality);
        assert_eq!(config.step_interval, Duration::from_millis(500));
        // Untouched fields keep defaults
        assert_eq!(config.rate, 1000);
        assert_eq!(config.depth, 5);
    }

    #[test]
    fn test_from_file_bad_duration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "duration: soon").unwrap();
        assert!(matches!(
            LoadConfig::from_file(file.path()),
            Err(LoadgenError::ConfigFile(_))
        ));
    }
}
