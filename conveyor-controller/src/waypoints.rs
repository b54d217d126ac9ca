use crate::error::ConfigurationError;
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const LOADER: &str = "loader";
pub const UNLOADER: &str = "unloader";

/// Identifies one physical arm in the cell
///
/// Identity is plain data so a cell can grow past two arms
/// without new types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArmId(String);

impl ArmId {
    pub fn new(name: impl Into<String>) -> ArmId {
        ArmId(name.into())
    }

    pub fn loader() -> ArmId {
        ArmId::new(LOADER)
    }

    pub fn unloader() -> ArmId {
        ArmId::new(UNLOADER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// End effector target
///
/// Position is in millimeters in the arm base frame,
/// rotation is the end effector angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: na::Vector3<f32>,
    pub rotation: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, z: f32, r: f32) -> Pose {
        Pose {
            position: na::Vector3::new(x, y, z),
            rotation: r,
        }
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn y(&self) -> f32 {
        self.position.y
    }

    pub fn z(&self) -> f32 {
        self.position.z
    }

    pub fn distance_to(&self, other: &Pose) -> f32 {
        na::distance(
            &na::Point3::from(self.position),
            &na::Point3::from(other.position),
        )
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.2}, {:.2}, {:.2}, {:.2})",
            self.position.x, self.position.y, self.position.z, self.rotation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Pick,
    PickApproach,
    Place,
    PlaceApproach,
    Home,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Pick,
        Role::PickApproach,
        Role::Place,
        Role::PlaceApproach,
        Role::Home,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Pick => "pick",
            Role::PickApproach => "pick_approach",
            Role::Place => "place",
            Role::PlaceApproach => "place_approach",
            Role::Home => "home",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Partially specified waypoints, as found in configuration files
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaypointTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick: Option<Pose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_approach: Option<Pose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place: Option<Pose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_approach: Option<Pose>,
    /// defaults to pick_approach
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<Pose>,
}

/// The five named poses one arm works between
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointSet {
    arm: ArmId,
    pick: Pose,
    pick_approach: Pose,
    place: Pose,
    place_approach: Pose,
    home: Pose,
}

impl WaypointSet {
    /// Waypoints from the built in table
    pub fn for_arm(arm: &ArmId) -> Result<WaypointSet, ConfigurationError> {
        match arm.as_str() {
            LOADER => Ok(WaypointSet::with_default_home(
                arm.clone(),
                Pose::new(106.02387, -187.68869, 44.56678, -75.0),
                Pose::new(106.02387, -187.68869, 111.0, -75.0),
                Pose::new(-29.644587, -303.14001, 0.9083023, -170.0),
                Pose::new(-17.023897, -280.94144, 111.0, -170.0),
            )),
            UNLOADER => Ok(WaypointSet::with_default_home(
                arm.clone(),
                Pose::new(-31.56204, 224.74261, -8.261711, 240.0),
                Pose::new(-25.590174, 199.59946, 47.82006, 240.0),
                Pose::new(99.32232, 192.50629, 43.280693, 240.0),
                Pose::new(99.32232, 192.50629, 111.0, 240.0),
            )),
            _ => Err(ConfigurationError::UnknownArm(arm.clone())),
        }
    }

    pub fn from_table(
        arm: &ArmId,
        table: &WaypointTable,
    ) -> Result<WaypointSet, ConfigurationError> {
        let require = |pose: Option<Pose>, role: Role| {
            pose.ok_or_else(|| ConfigurationError::MissingWaypoint {
                arm: arm.clone(),
                role,
            })
        };
        let pick_approach = require(table.pick_approach, Role::PickApproach)?;
        Ok(WaypointSet {
            arm: arm.clone(),
            pick: require(table.pick, Role::Pick)?,
            pick_approach,
            place: require(table.place, Role::Place)?,
            place_approach: require(table.place_approach, Role::PlaceApproach)?,
            home: table.home.unwrap_or(pick_approach),
        })
    }

    fn with_default_home(
        arm: ArmId,
        pick: Pose,
        pick_approach: Pose,
        place: Pose,
        place_approach: Pose,
    ) -> WaypointSet {
        WaypointSet {
            arm,
            pick,
            pick_approach,
            place,
            place_approach,
            home: pick_approach,
        }
    }

    pub fn with_home(self, home: Pose) -> WaypointSet {
        WaypointSet { home, ..self }
    }

    pub fn arm(&self) -> &ArmId {
        &self.arm
    }

    pub fn get(&self, role: Role) -> Pose {
        match role {
            Role::Pick => self.pick,
            Role::PickApproach => self.pick_approach,
            Role::Place => self.place,
            Role::PlaceApproach => self.place_approach,
            Role::Home => self.home,
        }
    }

    pub fn home(&self) -> Pose {
        self.home
    }

    pub fn to_table(&self) -> WaypointTable {
        WaypointTable {
            pick: Some(self.pick),
            pick_approach: Some(self.pick_approach),
            place: Some(self.place),
            place_approach: Some(self.place_approach),
            home: Some(self.home),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_pose(pose: Pose, x: f32, y: f32, z: f32, r: f32) {
        assert_relative_eq!(pose.x(), x, epsilon = 0.01);
        assert_relative_eq!(pose.y(), y, epsilon = 0.01);
        assert_relative_eq!(pose.z(), z, epsilon = 0.01);
        assert_relative_eq!(pose.rotation, r, epsilon = 0.01);
    }

    #[test]
    fn loader_waypoints_match_fixture() {
        let set = WaypointSet::for_arm(&ArmId::loader()).unwrap();
        assert_pose(set.get(Role::Pick), 106.02, -187.69, 44.57, -75.0);
        assert_pose(set.get(Role::PickApproach), 106.02, -187.69, 111.0, -75.0);
        assert_pose(set.get(Role::Place), -29.64, -303.14, 0.91, -170.0);
        assert_pose(set.get(Role::PlaceApproach), -17.02, -280.94, 111.0, -170.0);
        assert_pose(set.get(Role::Home), 106.02, -187.69, 111.0, -75.0);
    }

    #[test]
    fn unloader_waypoints_match_fixture() {
        let set = WaypointSet::for_arm(&ArmId::unloader()).unwrap();
        assert_pose(set.get(Role::Pick), -31.56, 224.74, -8.26, 240.0);
        assert_pose(set.get(Role::PickApproach), -25.59, 199.60, 47.82, 240.0);
        assert_pose(set.get(Role::Place), 99.32, 192.51, 43.28, 240.0);
        assert_pose(set.get(Role::PlaceApproach), 99.32, 192.51, 111.0, 240.0);
        assert_pose(set.get(Role::Home), -25.59, 199.60, 47.82, 240.0);
    }

    #[test]
    fn waypoints_are_deterministic() {
        for arm in [ArmId::loader(), ArmId::unloader()] {
            assert_eq!(
                WaypointSet::for_arm(&arm).unwrap(),
                WaypointSet::for_arm(&arm).unwrap()
            );
        }
    }

    #[test]
    fn every_role_has_a_distinct_name() {
        let names: std::collections::HashSet<&str> =
            Role::ALL.iter().map(|role| role.name()).collect();
        assert_eq!(names.len(), 5);
        assert!(names.contains("pick_approach"));
    }

    #[test]
    fn home_defaults_to_pick_approach() {
        let set = WaypointSet::for_arm(&ArmId::loader()).unwrap();
        assert_eq!(set.home(), set.get(Role::PickApproach));
    }

    #[test]
    fn unknown_arm_is_configuration_error() {
        let error = WaypointSet::for_arm(&ArmId::new("welder")).unwrap_err();
        assert!(matches!(error, ConfigurationError::UnknownArm(arm) if arm.as_str() == "welder"));
    }

    #[test]
    fn table_missing_role_fails_fast() {
        let mut table = WaypointSet::for_arm(&ArmId::loader()).unwrap().to_table();
        table.place = None;
        let error = WaypointSet::from_table(&ArmId::new("third"), &table).unwrap_err();
        assert!(matches!(
            error,
            ConfigurationError::MissingWaypoint {
                role: Role::Place,
                ..
            }
        ));
    }

    #[test]
    fn table_without_home_uses_pick_approach() {
        let table = WaypointTable {
            pick: Some(Pose::new(1.0, 2.0, 3.0, 0.0)),
            pick_approach: Some(Pose::new(1.0, 2.0, 50.0, 0.0)),
            place: Some(Pose::new(4.0, 5.0, 6.0, 90.0)),
            place_approach: Some(Pose::new(4.0, 5.0, 50.0, 90.0)),
            home: None,
        };
        let set = WaypointSet::from_table(&ArmId::new("third"), &table).unwrap();
        assert_eq!(set.home(), Pose::new(1.0, 2.0, 50.0, 0.0));
        assert_eq!(set.arm().as_str(), "third");
    }

    #[test]
    fn pose_display() {
        let pose = Pose::new(1.0, -2.5, 3.25, 90.0);
        assert_eq!(pose.to_string(), "(1.00, -2.50, 3.25, 90.00)");
    }

    #[test]
    fn pose_distance() {
        let start = Pose::new(0.0, 0.0, 0.0, 0.0);
        let target = Pose::new(3.0, 4.0, 0.0, 10.0);
        assert_relative_eq!(start.distance_to(&target), 5.0);
    }
}
