use crate::arm_driver::{Alarm, ArmDriver, DriverConnector};
use crate::error::{ConnectionError, GripperError, HealthError, MotionError, NotConnected};
use crate::waypoints::{ArmId, Pose};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Faulted,
}

/// Lifecycle and motion primitives for one arm
///
/// The controller exclusively owns the transport of its arm.
/// It is opened by `connect` and released by `disconnect`,
/// or by drop if the controller goes away while still connected.
pub struct ArmController {
    arm: ArmId,
    connector: Box<dyn DriverConnector>,
    driver: Option<Box<dyn ArmDriver>>,
    address: Option<String>,
    state: ConnectionState,
    last_pose: Option<Pose>,
}

impl ArmController {
    pub fn new(arm: ArmId, connector: Box<dyn DriverConnector>) -> ArmController {
        ArmController {
            arm,
            connector,
            driver: None,
            address: None,
            state: ConnectionState::Disconnected,
            last_pose: None,
        }
    }

    pub fn arm(&self) -> &ArmId {
        &self.arm
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Address of the open transport
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Pose reached by the last completed move
    pub fn last_pose(&self) -> Option<Pose> {
        self.last_pose
    }

    pub async fn connect(&mut self, address: &str) -> Result<(), ConnectionError> {
        if self.driver.is_some() {
            warn!(arm = %self.arm, address, "Already connected, ignoring connect");
            return Ok(());
        }
        match self.connector.open(address).await {
            Ok(driver) => {
                self.driver = Some(driver);
                self.address = Some(address.to_owned());
                self.state = ConnectionState::Connected;
                info!(arm = %self.arm, address, "Connected");
                Ok(())
            }
            Err(source) => {
                error!(arm = %self.arm, address, "Failed to connect: {}", source);
                Err(ConnectionError::Transport {
                    arm: self.arm.clone(),
                    address: address.to_owned(),
                    source,
                })
            }
        }
    }

    fn driver(&mut self) -> Result<&mut Box<dyn ArmDriver>, NotConnected> {
        match self.driver.as_mut() {
            Some(driver) => Ok(driver),
            None => Err(NotConnected {
                arm: self.arm.clone(),
            }),
        }
    }

    /// Query latched alarms
    ///
    /// Alarms are read fresh from the device on every call.
    pub async fn check_health(&mut self) -> Result<Vec<Alarm>, HealthError> {
        let alarms = self.read_alarms().await?;
        if alarms.is_empty() {
            if self.state == ConnectionState::Faulted {
                self.state = ConnectionState::Connected;
            }
        } else {
            self.state = ConnectionState::Faulted;
            for alarm in &alarms {
                warn!(arm = %self.arm, "Alarm {}", alarm);
            }
        }
        Ok(alarms)
    }

    /// Clear latched alarms
    ///
    /// Decides from a fresh alarm query, never from the last health check.
    pub async fn clear_health(&mut self) -> Result<(), HealthError> {
        if self.read_alarms().await?.is_empty() {
            self.state = ConnectionState::Connected;
            return Ok(());
        }
        self.driver()?
            .clear_alarms()
            .await
            .map_err(|source| HealthError::Driver {
                arm: self.arm.clone(),
                source,
            })?;
        self.state = ConnectionState::Connected;
        info!(arm = %self.arm, "Alarms cleared");
        Ok(())
    }

    async fn read_alarms(&mut self) -> Result<Vec<Alarm>, HealthError> {
        let driver = match self.driver() {
            Ok(driver) => driver,
            Err(error) => {
                warn!(arm = %self.arm, "Health query on disconnected arm");
                return Err(error.into());
            }
        };
        driver
            .get_alarms()
            .await
            .map_err(|source| HealthError::Driver {
                arm: self.arm.clone(),
                source,
            })
    }

    pub async fn move_to(&mut self, pose: Pose) -> Result<(), MotionError> {
        let result = self.driver()?.move_to(&pose).await;
        match result {
            Ok(()) => {
                self.last_pose = Some(pose);
                Ok(())
            }
            Err(source) => {
                error!(arm = %self.arm, "Movement to {} failed: {}", pose, source);
                self.last_pose = None;
                Err(MotionError::Driver {
                    arm: self.arm.clone(),
                    pose,
                    source,
                })
            }
        }
    }

    /// Actuate gripper and wait for it to settle
    pub async fn grip(&mut self, close: bool, settle_delay: Duration) -> Result<(), GripperError> {
        if let Err(source) = self.driver()?.set_gripper(close).await {
            error!(arm = %self.arm, close, "Gripper error: {}", source);
            return Err(GripperError::Driver {
                arm: self.arm.clone(),
                close,
                source,
            });
        }
        sleep(settle_delay).await;
        Ok(())
    }

    pub async fn read_pose(&mut self) -> Result<Pose, MotionError> {
        let pose = self
            .driver()?
            .get_pose()
            .await
            .map_err(|source| MotionError::ReadPose {
                arm: self.arm.clone(),
                source,
            })?;
        Ok(pose)
    }

    /// Release the transport
    ///
    /// Safe to call any number of times from any state.
    pub async fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.last_pose = None;
        let address = self.address.take();
        if let Some(mut driver) = self.driver.take() {
            match driver.close().await {
                Ok(()) => info!(arm = %self.arm, address = ?address, "Connection closed"),
                Err(error) => error!(
                    arm = %self.arm,
                    address = ?address,
                    "Error closing connection: {}",
                    error
                ),
            }
        }
    }
}

impl Drop for ArmController {
    fn drop(&mut self) {
        if self.driver.is_some() {
            warn!(arm = %self.arm, "Arm dropped while connected, releasing transport");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_driver::DriverError;
    use crate::simulator::{DriverCall, SimulatedConnector, SimulationSettings};

    fn controller(settings: SimulationSettings) -> (ArmController, SimulatedConnector) {
        let connector = SimulatedConnector::new(settings);
        let controller = ArmController::new(ArmId::loader(), Box::new(connector.clone()));
        (controller, connector)
    }

    #[tokio::test]
    async fn connect_enters_connected() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        assert_eq!(arm.state(), ConnectionState::Disconnected);
        arm.connect("/dev/ttyUSB0").await.unwrap();
        assert_eq!(arm.state(), ConnectionState::Connected);
        assert_eq!(arm.address(), Some("/dev/ttyUSB0"));
        assert_eq!(
            connector.calls().await,
            vec![DriverCall::Open("/dev/ttyUSB0".to_owned())]
        );
    }

    #[tokio::test]
    async fn second_connect_does_not_reopen() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        arm.connect("sim").await.unwrap();
        arm.connect("sim").await.unwrap();
        let opens = connector
            .count(|call| matches!(call, DriverCall::Open(_)))
            .await;
        assert_eq!(opens, 1);
    }

    #[tokio::test]
    async fn failed_connect_stays_disconnected() {
        let (mut arm, _) = controller(SimulationSettings {
            fail_open: true,
            ..Default::default()
        });
        let error = arm.connect("/dev/ttyUSB9").await.unwrap_err();
        assert!(matches!(
            error,
            ConnectionError::Transport {
                source: DriverError::DeviceAbsent(_),
                ..
            }
        ));
        assert_eq!(arm.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_twice_is_fine() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        arm.connect("sim").await.unwrap();
        arm.disconnect().await;
        arm.disconnect().await;
        assert_eq!(arm.state(), ConnectionState::Disconnected);
        let closes = connector.count(|call| *call == DriverCall::Close).await;
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn disconnect_when_never_connected() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        arm.disconnect().await;
        assert_eq!(arm.state(), ConnectionState::Disconnected);
        assert!(connector.calls().await.is_empty());
    }

    #[tokio::test]
    async fn health_check_requires_connection() {
        let (mut arm, _) = controller(SimulationSettings::default());
        assert!(matches!(
            arm.check_health().await,
            Err(HealthError::NotConnected(_))
        ));
        assert!(matches!(
            arm.clear_health().await,
            Err(HealthError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn alarms_fault_and_clear() {
        let (mut arm, connector) = controller(SimulationSettings {
            alarms: vec![Alarm::new(0x11, "joint limit")],
            ..Default::default()
        });
        arm.connect("sim").await.unwrap();
        let alarms = arm.check_health().await.unwrap();
        assert_eq!(alarms, vec![Alarm::new(0x11, "joint limit")]);
        assert_eq!(arm.state(), ConnectionState::Faulted);

        arm.clear_health().await.unwrap();
        assert_eq!(arm.state(), ConnectionState::Connected);
        assert!(arm.check_health().await.unwrap().is_empty());
        assert!(connector.calls().await.contains(&DriverCall::ClearAlarms));
    }

    #[tokio::test]
    async fn health_is_not_cached() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        arm.connect("sim").await.unwrap();
        assert!(arm.check_health().await.unwrap().is_empty());
        connector.raise_alarm(Alarm::new(0x02, "reset")).await;
        assert_eq!(arm.check_health().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_reads_alarms_raised_after_check() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        arm.connect("sim").await.unwrap();
        assert!(arm.check_health().await.unwrap().is_empty());
        connector.raise_alarm(Alarm::new(0x02, "reset")).await;

        arm.clear_health().await.unwrap();
        assert!(connector.calls().await.contains(&DriverCall::ClearAlarms));
        assert!(arm.check_health().await.unwrap().is_empty());
        assert_eq!(arm.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn clear_when_healthy_is_noop() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        arm.connect("sim").await.unwrap();
        arm.clear_health().await.unwrap();
        assert!(!connector.calls().await.contains(&DriverCall::ClearAlarms));
    }

    #[tokio::test]
    async fn motion_error_keeps_connection_state() {
        let (mut arm, _) = controller(SimulationSettings {
            fail_move: Some(1),
            ..Default::default()
        });
        arm.connect("sim").await.unwrap();
        let error = arm.move_to(Pose::new(1.0, 2.0, 3.0, 0.0)).await.unwrap_err();
        assert!(matches!(error, MotionError::Driver { .. }));
        assert_eq!(arm.state(), ConnectionState::Connected);
        assert_eq!(arm.last_pose(), None);
    }

    #[tokio::test]
    async fn move_tracks_last_pose() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        arm.connect("sim").await.unwrap();
        let target = Pose::new(10.0, 20.0, 30.0, 45.0);
        arm.move_to(target).await.unwrap();
        assert_eq!(arm.last_pose(), Some(target));
        assert_eq!(arm.read_pose().await.unwrap(), target);
        assert_eq!(connector.pose().await, target);
    }

    #[tokio::test]
    async fn move_without_connection_fails() {
        let (mut arm, _) = controller(SimulationSettings::default());
        assert!(matches!(
            arm.move_to(Pose::new(0.0, 0.0, 0.0, 0.0)).await,
            Err(MotionError::NotConnected(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn grip_holds_settle_delay() {
        let (mut arm, connector) = controller(SimulationSettings::default());
        arm.connect("sim").await.unwrap();
        let start = tokio::time::Instant::now();
        arm.grip(true, Duration::from_millis(500)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(connector.gripper_closed().await);
    }

    #[tokio::test]
    async fn gripper_failure_is_reported() {
        let (mut arm, _) = controller(SimulationSettings {
            fail_gripper: true,
            ..Default::default()
        });
        arm.connect("sim").await.unwrap();
        let error = arm.grip(false, Duration::ZERO).await.unwrap_err();
        assert!(matches!(error, GripperError::Driver { close: false, .. }));
        assert_eq!(error.to_string(), "failed to open gripper on loader");
    }
}
