use crate::arm_driver::{Alarm, ArmDriver, DriverConnector, DriverError};
use crate::waypoints::Pose;
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio::time::sleep;

type Result<T> = std::result::Result<T, DriverError>;

/// Driver call as observed by the simulated device
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Open(String),
    GetAlarms,
    ClearAlarms,
    MoveTo(Pose),
    SetGripper(bool),
    GetPose,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSpeed {
    /// millimeters per second
    pub translation: f32,
    /// degrees per second
    pub rotation: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub start_pose: Pose,
    /// alarms latched when the simulation starts
    pub alarms: Vec<Alarm>,
    /// alarms survive clear_alarms
    pub persistent_alarms: bool,
    pub fail_open: bool,
    /// 1 based index of the move that gets rejected
    pub fail_move: Option<usize>,
    pub fail_gripper: bool,
    /// None completes motion instantly
    pub motion_speed: Option<MotionSpeed>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            start_pose: Pose::new(200.0, 0.0, 100.0, 0.0),
            alarms: vec![],
            persistent_alarms: false,
            fail_open: false,
            fail_move: None,
            fail_gripper: false,
            motion_speed: None,
        }
    }
}

#[derive(Debug)]
struct SimulatedArm {
    settings: SimulationSettings,
    calls: Vec<DriverCall>,
    alarms: Vec<Alarm>,
    pose: Pose,
    gripper_closed: bool,
    moves: usize,
}

/// Connector for a simulated arm
///
/// Clones share the same simulated device so tests can inspect
/// calls after handing the connector to a controller.
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    arm: Arc<Mutex<SimulatedArm>>,
}

impl SimulatedConnector {
    pub fn new(settings: SimulationSettings) -> Self {
        let arm = SimulatedArm {
            calls: vec![],
            alarms: settings.alarms.clone(),
            pose: settings.start_pose,
            gripper_closed: false,
            moves: 0,
            settings,
        };
        SimulatedConnector {
            arm: Arc::new(Mutex::new(arm)),
        }
    }

    pub async fn calls(&self) -> Vec<DriverCall> {
        self.arm.lock().await.calls.clone()
    }

    pub async fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.arm
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    pub async fn raise_alarm(&self, alarm: Alarm) {
        self.arm.lock().await.alarms.push(alarm);
    }

    pub async fn pose(&self) -> Pose {
        self.arm.lock().await.pose
    }

    pub async fn gripper_closed(&self) -> bool {
        self.arm.lock().await.gripper_closed
    }
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        SimulatedConnector::new(SimulationSettings::default())
    }
}

#[async_trait]
impl DriverConnector for SimulatedConnector {
    async fn open(&self, address: &str) -> Result<Box<dyn ArmDriver>> {
        let mut arm = self.arm.lock().await;
        arm.calls.push(DriverCall::Open(address.to_owned()));
        if arm.settings.fail_open {
            return Err(DriverError::DeviceAbsent(address.to_owned()));
        }
        Ok(Box::new(SimulatedArmDriver {
            arm: Arc::clone(&self.arm),
            closed: false,
        }))
    }
}

pub struct SimulatedArmDriver {
    arm: Arc<Mutex<SimulatedArm>>,
    closed: bool,
}

impl SimulatedArmDriver {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ArmDriver for SimulatedArmDriver {
    async fn get_alarms(&mut self) -> Result<Vec<Alarm>> {
        self.ensure_open()?;
        let mut arm = self.arm.lock().await;
        arm.calls.push(DriverCall::GetAlarms);
        Ok(arm.alarms.clone())
    }

    async fn clear_alarms(&mut self) -> Result<()> {
        self.ensure_open()?;
        let mut arm = self.arm.lock().await;
        arm.calls.push(DriverCall::ClearAlarms);
        if !arm.settings.persistent_alarms {
            arm.alarms.clear();
        }
        Ok(())
    }

    async fn move_to(&mut self, pose: &Pose) -> Result<()> {
        self.ensure_open()?;
        let duration = {
            let mut arm = self.arm.lock().await;
            arm.calls.push(DriverCall::MoveTo(*pose));
            arm.moves += 1;
            if arm.settings.fail_move == Some(arm.moves) {
                return Err(DriverError::Rejected(format!("target {} unreachable", pose)));
            }
            let duration = arm
                .settings
                .motion_speed
                .map(|speed| estimate_time(&arm.pose, pose, speed))
                .unwrap_or_default();
            arm.pose = *pose;
            duration
        };
        sleep(duration).await;
        Ok(())
    }

    async fn set_gripper(&mut self, closed: bool) -> Result<()> {
        self.ensure_open()?;
        let mut arm = self.arm.lock().await;
        arm.calls.push(DriverCall::SetGripper(closed));
        if arm.settings.fail_gripper {
            return Err(DriverError::Rejected("gripper stalled".to_owned()));
        }
        arm.gripper_closed = closed;
        Ok(())
    }

    async fn get_pose(&mut self) -> Result<Pose> {
        self.ensure_open()?;
        let mut arm = self.arm.lock().await;
        arm.calls.push(DriverCall::GetPose);
        Ok(arm.pose)
    }

    async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        self.arm.lock().await.calls.push(DriverCall::Close);
        Ok(())
    }
}

/// Selects time it would take to reach target at given speed
/// Picks the longer time for motion wether it is the rotation or translation
fn estimate_time(start: &Pose, target: &Pose, speed: MotionSpeed) -> Duration {
    let translation_time_sec = start.distance_to(target) / speed.translation;
    let angular_time_sec = (start.rotation - target.rotation).abs() / speed.rotation;

    let bigger_time = translation_time_sec.max(angular_time_sec);
    if bigger_time.is_finite() && bigger_time > 0.0 {
        Duration::from_secs_f32(bigger_time)
    } else {
        Duration::ZERO
    }
}
