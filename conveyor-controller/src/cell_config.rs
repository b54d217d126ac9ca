use crate::error::ConfigurationError;
use crate::waypoints::{ArmId, Pose, WaypointSet, WaypointTable};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, time::Duration};

const DEFAULT_HANDOFF_INTERVAL_MS: u64 = 2000;
const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

fn default_handoff_interval_ms() -> u64 {
    DEFAULT_HANDOFF_INTERVAL_MS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ArmSettings {
    /// Serial port of this arm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Overrides the built in waypoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoints: Option<WaypointTable>,
    /// Replaces only the home pose, on top of either waypoint source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<Pose>,
}

/// Cell setup, built once at startup and passed down explicitly
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CellConfig {
    /// Conveyor transit time between two arms
    ///
    /// There is no sensor on the conveyor so this has to cover
    /// the slowest transit.
    #[serde(default = "default_handoff_interval_ms")]
    pub handoff_interval_ms: u64,
    /// Wait after gripper actuation
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub arms: BTreeMap<ArmId, ArmSettings>,
}

impl Default for CellConfig {
    fn default() -> Self {
        CellConfig {
            handoff_interval_ms: DEFAULT_HANDOFF_INTERVAL_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            arms: BTreeMap::new(),
        }
    }
}

impl CellConfig {
    /// Port layout of the reference cell
    pub fn included() -> CellConfig {
        let mut arms = BTreeMap::new();
        arms.insert(
            ArmId::loader(),
            ArmSettings {
                address: Some("/dev/ttyUSB0".to_owned()),
                waypoints: None,
                home: None,
            },
        );
        arms.insert(
            ArmId::unloader(),
            ArmSettings {
                address: Some("/dev/ttyUSB1".to_owned()),
                waypoints: None,
                home: None,
            },
        );
        CellConfig {
            arms,
            ..Default::default()
        }
    }

    pub fn handoff_interval(&self) -> Duration {
        Duration::from_millis(self.handoff_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn address_for(&self, arm: &ArmId) -> Option<&str> {
        self.arms
            .get(arm)
            .and_then(|settings| settings.address.as_deref())
    }

    /// Configured waypoints, falling back to the built in table
    pub fn waypoints_for(&self, arm: &ArmId) -> Result<WaypointSet, ConfigurationError> {
        let settings = self.arms.get(arm);
        let waypoints = match settings.and_then(|settings| settings.waypoints.as_ref()) {
            Some(table) => WaypointSet::from_table(arm, table)?,
            None => WaypointSet::for_arm(arm)?,
        };
        match settings.and_then(|settings| settings.home) {
            Some(home) => Ok(waypoints.with_home(home)),
            None => Ok(waypoints),
        }
    }

    pub fn parse_json(text: &str) -> Result<CellConfig, ConfigurationError> {
        let config: CellConfig = serde_json::from_str(text)?;
        Ok(config)
    }

    pub fn parse_yaml(text: &str) -> Result<CellConfig, ConfigurationError> {
        let config: CellConfig = serde_yaml::from_str(text)?;
        Ok(config)
    }

    pub fn serialize_to_yaml(&self) -> Result<String, ConfigurationError> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(yaml)
    }

    /// Loads json or yaml depending on file extension
    pub fn load(path: impl AsRef<Path>) -> Result<CellConfig, ConfigurationError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("json") => CellConfig::parse_json(&text),
            _ => CellConfig::parse_yaml(&text),
        }
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<(), ConfigurationError> {
        fs::write(path, self.serialize_to_yaml()?)?;
        Ok(())
    }
}
