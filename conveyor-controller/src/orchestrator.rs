use crate::arm_controller::ArmController;
use crate::arm_driver::DriverConnector;
use crate::cell_config::CellConfig;
use crate::error::{AlarmFault, CellError};
use crate::pick_and_place::PickAndPlace;
use crate::port_discovery::{resolve_address, PortEnumerator};
use crate::waypoints::{ArmId, Pose};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Arm requested for a run, with an optional address override
#[derive(Debug, Clone, PartialEq)]
pub struct ArmSelection {
    pub arm: ArmId,
    pub address: Option<String>,
}

impl ArmSelection {
    pub fn new(arm: ArmId, address: Option<String>) -> Self {
        ArmSelection { arm, address }
    }
}

/// One arm of the cell together with its work
pub struct Station {
    controller: ArmController,
    sequence: PickAndPlace,
    address: String,
}

impl Station {
    pub fn new(controller: ArmController, sequence: PickAndPlace, address: String) -> Station {
        Station {
            controller,
            sequence,
            address,
        }
    }

    pub fn arm(&self) -> &ArmId {
        self.controller.arm()
    }

    pub fn controller(&self) -> &ArmController {
        &self.controller
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Clear alarms once, then move home
    async fn prepare(&mut self) -> Result<(), CellError> {
        let alarms = self.controller.check_health().await?;
        if !alarms.is_empty() {
            warn!(arm = %self.arm(), "Clearing {} alarm(s)", alarms.len());
            self.controller.clear_health().await?;
            let remaining = self.controller.check_health().await?;
            if !remaining.is_empty() {
                return Err(AlarmFault {
                    arm: self.arm().clone(),
                    alarms: remaining,
                }
                .into());
            }
        }
        self.home().await
    }

    async fn home(&mut self) -> Result<(), CellError> {
        let home = self.sequence.waypoints().home();
        info!(arm = %self.arm(), "Moving to home {}", home);
        self.controller
            .move_to(home)
            .await
            .map_err(|source| CellError::Homing {
                arm: self.controller.arm().clone(),
                source,
            })
    }
}

/// Runs arms placed along a conveyor one after another
///
/// Arms are connected in order and always disconnected in reverse order,
/// whatever way the run ends.
pub struct CellOrchestrator {
    stations: Vec<Station>,
    handoff_interval: Duration,
}

impl CellOrchestrator {
    pub fn new(stations: Vec<Station>, handoff_interval: Duration) -> CellOrchestrator {
        CellOrchestrator {
            stations,
            handoff_interval,
        }
    }

    /// Build stations for the selected arms
    ///
    /// Fails on bad configuration before touching any device.
    pub fn from_config<C>(
        config: &CellConfig,
        selection: &[ArmSelection],
        enumerator: &dyn PortEnumerator,
        connector: C,
    ) -> Result<CellOrchestrator, CellError>
    where
        C: Fn(&ArmId) -> Box<dyn DriverConnector>,
    {
        let mut stations = Vec::with_capacity(selection.len());
        for requested in selection {
            let waypoints = config.waypoints_for(&requested.arm)?;
            let address = resolve_address(
                &requested.arm,
                requested.address.as_deref(),
                config,
                enumerator,
            )?;
            let controller = ArmController::new(requested.arm.clone(), connector(&requested.arm));
            let sequence = PickAndPlace::new(waypoints, config.settle_delay());
            stations.push(Station::new(controller, sequence, address));
        }
        Ok(CellOrchestrator::new(stations, config.handoff_interval()))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Full cycle: every arm picks and places, separated by the handoff interval
    pub async fn run(&mut self, interrupt: impl Future<Output = ()>) -> Result<(), CellError> {
        let result = tokio::select! {
            result = self.cycle() => result,
            _ = interrupt => Err(CellError::Interrupted),
        };
        self.finish(result).await
    }

    /// Clear alarms and move every arm home
    pub async fn home(&mut self, interrupt: impl Future<Output = ()>) -> Result<(), CellError> {
        let result = tokio::select! {
            result = self.home_all() => result,
            _ = interrupt => Err(CellError::Interrupted),
        };
        self.finish(result).await
    }

    /// Current pose of every arm
    pub async fn read_poses(
        &mut self,
        interrupt: impl Future<Output = ()>,
    ) -> Result<Vec<(ArmId, Pose)>, CellError> {
        let result = tokio::select! {
            result = self.poses() => result,
            _ = interrupt => Err(CellError::Interrupted),
        };
        self.finish(result).await
    }

    async fn cycle(&mut self) -> Result<(), CellError> {
        self.connect_all().await?;
        for station in &mut self.stations {
            station.prepare().await?;
        }
        let handoff_interval = self.handoff_interval;
        for (index, station) in self.stations.iter_mut().enumerate() {
            if index > 0 {
                info!(
                    "Waiting {:?} for conveyor handoff to {}",
                    handoff_interval,
                    station.arm()
                );
                sleep(handoff_interval).await;
            }
            info!(arm = %station.arm(), "Starting pick and place");
            station
                .sequence
                .run(&mut station.controller, true)
                .await?;
        }
        info!("Cell cycle complete");
        Ok(())
    }

    async fn home_all(&mut self) -> Result<(), CellError> {
        self.connect_all().await?;
        for station in &mut self.stations {
            station.prepare().await?;
        }
        Ok(())
    }

    async fn poses(&mut self) -> Result<Vec<(ArmId, Pose)>, CellError> {
        self.connect_all().await?;
        let mut poses = Vec::with_capacity(self.stations.len());
        for station in &mut self.stations {
            let pose = station.controller.read_pose().await?;
            info!(arm = %station.arm(), "Current pose {}", pose);
            poses.push((station.arm().clone(), pose));
        }
        Ok(poses)
    }

    /// Either every arm connects or the run is aborted
    async fn connect_all(&mut self) -> Result<(), CellError> {
        for station in &mut self.stations {
            station.controller.connect(&station.address).await?;
        }
        Ok(())
    }

    async fn finish<T>(&mut self, result: Result<T, CellError>) -> Result<T, CellError> {
        match &result {
            Ok(_) => {}
            Err(CellError::Interrupted) => warn!("Operation interrupted by user"),
            Err(error) => error!("Cell operation failed: {}", error),
        }
        self.teardown().await;
        result
    }

    async fn teardown(&mut self) {
        for station in self.stations.iter_mut().rev() {
            station.controller.disconnect().await;
        }
    }
}
