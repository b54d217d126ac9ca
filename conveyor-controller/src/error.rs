use crate::arm_driver::{Alarm, DriverError};
use crate::pick_and_place::SequenceState;
use crate::waypoints::{ArmId, Pose, Role};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("unknown arm {0}")]
    UnknownArm(ArmId),
    #[error("arm {arm} has no {role} waypoint")]
    MissingWaypoint { arm: ArmId, role: Role },
    #[error("error while accessing configuration")]
    IoError(#[from] std::io::Error),
    #[error("error while parsing json")]
    JsonError(#[from] serde_json::Error),
    #[error("error while parsing yaml")]
    YamlError(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("no address available for {arm}")]
    NoAddress { arm: ArmId },
    #[error("failed to list serial ports while resolving address for {arm}")]
    Discovery {
        arm: ArmId,
        #[source]
        source: serialport::Error,
    },
    #[error("failed to connect {arm} at {address}")]
    Transport {
        arm: ArmId,
        address: String,
        #[source]
        source: DriverError,
    },
}

#[derive(Error, Debug)]
#[error("{arm} is not connected")]
pub struct NotConnected {
    pub arm: ArmId,
}

#[derive(Error, Debug)]
pub enum HealthError {
    #[error(transparent)]
    NotConnected(#[from] NotConnected),
    #[error("failed to query alarms on {arm}")]
    Driver {
        arm: ArmId,
        #[source]
        source: DriverError,
    },
}

/// Alarms that were still latched after clearing
#[derive(Error, Debug)]
#[error("{arm} still reports {} alarm(s) after clearing", .alarms.len())]
pub struct AlarmFault {
    pub arm: ArmId,
    pub alarms: Vec<Alarm>,
}

#[derive(Error, Debug)]
pub enum MotionError {
    #[error(transparent)]
    NotConnected(#[from] NotConnected),
    #[error("move of {arm} to {pose} failed")]
    Driver {
        arm: ArmId,
        pose: Pose,
        #[source]
        source: DriverError,
    },
    #[error("failed to read pose of {arm}")]
    ReadPose {
        arm: ArmId,
        #[source]
        source: DriverError,
    },
}

#[derive(Error, Debug)]
pub enum GripperError {
    #[error(transparent)]
    NotConnected(#[from] NotConnected),
    #[error("failed to {} gripper on {arm}", gripper_action(.close))]
    Driver {
        arm: ArmId,
        close: bool,
        #[source]
        source: DriverError,
    },
}

fn gripper_action(close: &bool) -> &'static str {
    if *close {
        "close"
    } else {
        "open"
    }
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Motion(#[from] MotionError),
    #[error(transparent)]
    Gripper(#[from] GripperError),
}

/// Failure of a pick and place run, tagged with the state it happened in
#[derive(Error, Debug)]
#[error("pick and place on {arm} failed while {state}")]
pub struct SequenceError {
    pub arm: ArmId,
    pub state: SequenceState,
    #[source]
    pub source: StepError,
}

#[derive(Error, Debug)]
pub enum CellError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Health(#[from] HealthError),
    #[error(transparent)]
    AlarmFault(#[from] AlarmFault),
    #[error("{arm} failed to reach home")]
    Homing {
        arm: ArmId,
        #[source]
        source: MotionError,
    },
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Motion(#[from] MotionError),
    #[error("operation interrupted by user")]
    Interrupted,
}

impl CellError {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, CellError::Interrupted)
    }
}
