use crate::arm_controller::ArmController;
use crate::error::{SequenceError, StepError};
use crate::waypoints::{Role, WaypointSet};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    ApproachingPick,
    Picking,
    RetreatingPick,
    ApproachingPlace,
    Placing,
    RetreatingPlace,
    ReturningHome,
}

impl SequenceState {
    /// Clearance pose to fall back to when this state fails
    fn safe_retreat(&self) -> Option<Role> {
        match self {
            SequenceState::Picking => Some(Role::PickApproach),
            SequenceState::Placing => Some(Role::PlaceApproach),
            _ => None,
        }
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequenceState::Idle => "idle",
            SequenceState::ApproachingPick => "approaching pick",
            SequenceState::Picking => "picking",
            SequenceState::RetreatingPick => "retreating from pick",
            SequenceState::ApproachingPlace => "approaching place",
            SequenceState::Placing => "placing",
            SequenceState::RetreatingPlace => "retreating from place",
            SequenceState::ReturningHome => "returning home",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveTo(Role),
    /// true closes the gripper
    Grip(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub state: SequenceState,
    pub action: Action,
}

impl Step {
    const fn new(state: SequenceState, action: Action) -> Step {
        Step { state, action }
    }
}

const PICK_AND_PLACE: [Step; 8] = [
    Step::new(SequenceState::ApproachingPick, Action::MoveTo(Role::PickApproach)),
    Step::new(SequenceState::Picking, Action::MoveTo(Role::Pick)),
    Step::new(SequenceState::Picking, Action::Grip(true)),
    Step::new(SequenceState::RetreatingPick, Action::MoveTo(Role::PickApproach)),
    Step::new(SequenceState::ApproachingPlace, Action::MoveTo(Role::PlaceApproach)),
    Step::new(SequenceState::Placing, Action::MoveTo(Role::Place)),
    Step::new(SequenceState::Placing, Action::Grip(false)),
    Step::new(SequenceState::RetreatingPlace, Action::MoveTo(Role::PlaceApproach)),
];

const RETURN_HOME: Step = Step::new(SequenceState::ReturningHome, Action::MoveTo(Role::Home));

/// Every contact pose is bracketed by its approach pose
/// so the arm never travels sideways at contact height.
pub fn plan(return_home: bool) -> Vec<Step> {
    let mut steps = PICK_AND_PLACE.to_vec();
    if return_home {
        steps.push(RETURN_HOME);
    }
    steps
}

/// Drives one arm through a pick and place cycle
pub struct PickAndPlace {
    waypoints: WaypointSet,
    settle_delay: Duration,
}

impl PickAndPlace {
    pub fn new(waypoints: WaypointSet, settle_delay: Duration) -> PickAndPlace {
        PickAndPlace {
            waypoints,
            settle_delay,
        }
    }

    pub fn waypoints(&self) -> &WaypointSet {
        &self.waypoints
    }

    pub async fn run(
        &self,
        controller: &mut ArmController,
        return_home: bool,
    ) -> Result<(), SequenceError> {
        let mut state = SequenceState::Idle;
        for step in plan(return_home) {
            if step.state != state {
                debug!(arm = %controller.arm(), "{} -> {}", state, step.state);
                state = step.state;
            }
            if let Err(source) = self.execute(controller, step).await {
                self.recover(controller, state).await;
                return Err(SequenceError {
                    arm: controller.arm().clone(),
                    state,
                    source,
                });
            }
        }
        info!(arm = %controller.arm(), "Pick and place complete");
        Ok(())
    }

    async fn execute(&self, controller: &mut ArmController, step: Step) -> Result<(), StepError> {
        match step.action {
            Action::MoveTo(role) => {
                let target = self.waypoints.get(role);
                // a freshly homed arm already rests at the pick approach
                if step.state == SequenceState::ApproachingPick
                    && controller.last_pose() == Some(target)
                {
                    debug!(arm = %controller.arm(), "Already at {}", role);
                    return Ok(());
                }
                debug!(arm = %controller.arm(), "Moving to {} {}", role, target);
                controller.move_to(target).await?;
            }
            Action::Grip(close) => {
                controller.grip(close, self.settle_delay).await?;
            }
        }
        Ok(())
    }

    /// Best effort lift back to clearance height
    async fn recover(&self, controller: &mut ArmController, failed: SequenceState) {
        if let Some(role) = failed.safe_retreat() {
            warn!(arm = %controller.arm(), "Retreating to {} after failure while {}", role, failed);
            if let Err(error) = controller.move_to(self.waypoints.get(role)).await {
                warn!(arm = %controller.arm(), "Retreat failed: {}", error);
            }
        }
    }
}
