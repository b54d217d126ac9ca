use crate::waypoints::Pose;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed when talking to arm")]
    IoError(#[from] std::io::Error),
    #[error("no device found at {0}")]
    DeviceAbsent(String),
    #[error("device did not respond in time")]
    Timeout,
    #[error("device rejected command: {0}")]
    Rejected(String),
    #[error("transport already closed")]
    Closed,
}

type Result<T> = std::result::Result<T, DriverError>;

/// Fault latched by the device
///
/// Codes are opaque to the controller, they are only logged and reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub code: u16,
    pub description: String,
}

impl Alarm {
    pub fn new(code: u16, description: impl Into<String>) -> Alarm {
        Alarm {
            code,
            description: description.into(),
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} {}", self.code, self.description)
    }
}

/// Motion and gripper driver for a single opened arm
///
/// Every call completes only once the device has finished the command.
/// Dropping a driver releases its transport.
#[async_trait]
pub trait ArmDriver: Send + Sync {
    async fn get_alarms(&mut self) -> Result<Vec<Alarm>>;
    async fn clear_alarms(&mut self) -> Result<()>;
    /// Point to point move, returns when motion is complete
    async fn move_to(&mut self, pose: &Pose) -> Result<()>;
    /// true closes the gripper
    async fn set_gripper(&mut self, closed: bool) -> Result<()>;
    async fn get_pose(&mut self) -> Result<Pose>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to arms
#[async_trait]
pub trait DriverConnector: Send + Sync {
    async fn open(&self, address: &str) -> Result<Box<dyn ArmDriver>>;
}
