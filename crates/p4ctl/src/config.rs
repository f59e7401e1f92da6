//! Controller configuration
//!
//! Loaded from a YAML file. Every section is optional; missing values fall
//! back to the three-switch exercise topology and the `advanced_tunnel`
//! build outputs under `./build`.

use crate::error::{ConfigError, ConfigResult};
use crate::policy::PolicySet;
use crate::tables::tunnel;
use p4ctl_runtime::SwitchInfo;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One device to manage
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SwitchConfig {
    /// Name used by policies and in reports
    pub name: String,
    /// gRPC address
    pub address: String,
    pub device_id: u64,
}

impl SwitchConfig {
    pub fn new(name: &str, address: &str, device_id: u64) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            device_id,
        }
    }

    pub fn info(&self) -> SwitchInfo {
        SwitchInfo::new(&self.name, &self.address, self.device_id)
    }
}

/// Tunnel counter polling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// Seconds between polling cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_ingress_counter")]
    pub ingress_counter: String,

    #[serde(default = "default_egress_counter")]
    pub egress_counter: String,
}

/// Complete controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControllerConfig {
    /// P4Info descriptor of the program
    #[serde(default = "default_p4info")]
    pub p4info: PathBuf,

    /// BMv2 JSON installed on every switch
    #[serde(default = "default_bmv2_json")]
    pub bmv2_json: PathBuf,

    #[serde(default = "default_switches")]
    pub switches: Vec<SwitchConfig>,

    /// Installed in list order
    #[serde(default)]
    pub policies: PolicySet,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Dump the table entries of every switch after installing policies
    #[serde(default = "default_inspect")]
    pub inspect: bool,

    /// gRPC connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_telemetry_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    2
}

fn default_ingress_counter() -> String {
    tunnel::INGRESS_COUNTER.to_string()
}

fn default_egress_counter() -> String {
    tunnel::EGRESS_COUNTER.to_string()
}

fn default_p4info() -> PathBuf {
    PathBuf::from("./build/advanced_tunnel.p4.p4info.txt")
}

fn default_bmv2_json() -> PathBuf {
    PathBuf::from("./build/advanced_tunnel.json")
}

fn default_switches() -> Vec<SwitchConfig> {
    vec![
        SwitchConfig::new("s1", "127.0.0.1:50051", 0),
        SwitchConfig::new("s2", "127.0.0.1:50052", 1),
        SwitchConfig::new("s3", "127.0.0.1:50053", 2),
    ]
}

fn default_inspect() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            interval_secs: default_interval(),
            ingress_counter: default_ingress_counter(),
            egress_counter: default_egress_counter(),
        }
    }
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            p4info: default_p4info(),
            bmv2_json: default_bmv2_json(),
            switches: default_switches(),
            policies: PolicySet::default(),
            telemetry: TelemetryConfig::default(),
            inspect: default_inspect(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ControllerConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates an in-memory document.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            origin: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Checks that the descriptor and the device program exist.
    pub fn check_inputs(&self) -> ConfigResult<()> {
        for (what, path) in [("p4info", &self.p4info), ("BMv2 JSON", &self.bmv2_json)] {
            if !path.is_file() {
                return Err(ConfigError::MissingInput {
                    what,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn switch_infos(&self) -> Vec<SwitchInfo> {
        self.switches.iter().map(SwitchConfig::info).collect()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.switches.is_empty() {
            return Err(ConfigError::Invalid("at least one switch is required".to_string()));
        }

        let mut names = HashSet::new();
        for switch in &self.switches {
            if !names.insert(switch.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "switch '{}' is declared more than once",
                    switch.name
                )));
            }
        }

        for (switch, policy) in self.policies.switch_references() {
            if !names.contains(switch) {
                return Err(ConfigError::Invalid(format!(
                    "{policy} refers to undeclared switch '{switch}'"
                )));
            }
        }

        if self.telemetry.interval_secs == 0 {
            return Err(ConfigError::Invalid("telemetry interval_secs must be > 0".to_string()));
        }

        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid("connect_timeout_secs must be > 0".to_string()));
        }

        Ok(())
    }
}
