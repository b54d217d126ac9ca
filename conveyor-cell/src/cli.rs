use clap::{Parser, Subcommand, ValueEnum};
use conveyor_controller::{
    error::CellError,
    orchestrator::ArmSelection,
    waypoints::ArmId,
};
use std::path::PathBuf;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(author, version, about = "Conveyor cell pick and place controller")]
pub struct Args {
    /// Cell configuration file, yaml or json
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Sets the level of verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one pick and place cycle
    Run {
        #[command(flatten)]
        target: Target,

        /// Conveyor transit time in milliseconds
        #[arg(long)]
        handoff_ms: Option<u64>,
    },
    /// Clear alarms and move arms to their home pose
    Home {
        #[command(flatten)]
        target: Target,
    },
    /// Print current arm poses
    Pose {
        #[command(flatten)]
        target: Target,
    },
    /// List serial ports
    Ports,
}

#[derive(clap::Args, Debug)]
pub struct Target {
    /// Which robot to operate
    #[arg(long, value_enum, default_value_t = RobotSelection::Both)]
    pub robot: RobotSelection,

    /// Serial port for loader
    #[arg(long, alias = "loader-port")]
    pub port1: Option<String>,

    /// Serial port for unloader
    #[arg(long, alias = "unloader-port")]
    pub port2: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RobotSelection {
    Loader,
    Unloader,
    Both,
}

impl Target {
    /// Arms in conveyor order
    pub fn selection(&self) -> Vec<ArmSelection> {
        let loader = ArmSelection::new(ArmId::loader(), self.port1.clone());
        let unloader = ArmSelection::new(ArmId::unloader(), self.port2.clone());
        match self.robot {
            RobotSelection::Loader => vec![loader],
            RobotSelection::Unloader => vec![unloader],
            RobotSelection::Both => vec![loader, unloader],
        }
    }
}

pub fn exit_status<T>(result: &Result<T, CellError>) -> u8 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(CellError::Interrupted) => EXIT_INTERRUPTED,
        Err(_) => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_controller::error::ConfigurationError;

    fn target(args: &[&str]) -> Target {
        match Args::try_parse_from(args).unwrap().command {
            Command::Run { target, .. } | Command::Home { target } | Command::Pose { target } => {
                target
            }
            Command::Ports => panic!("no target"),
        }
    }

    #[test]
    fn run_defaults_to_both() {
        let selection = target(&["conveyor_cell", "run"]).selection();
        assert_eq!(
            selection,
            vec![
                ArmSelection::new(ArmId::loader(), None),
                ArmSelection::new(ArmId::unloader(), None),
            ]
        );
    }

    #[test]
    fn unloader_uses_second_port() {
        let selection = target(&[
            "conveyor_cell",
            "run",
            "--robot",
            "unloader",
            "--port1",
            "/dev/ttyUSB4",
            "--port2",
            "/dev/ttyUSB5",
        ])
        .selection();
        assert_eq!(
            selection,
            vec![ArmSelection::new(
                ArmId::unloader(),
                Some("/dev/ttyUSB5".to_owned())
            )]
        );
    }

    #[test]
    fn port_aliases() {
        let selection = target(&["conveyor_cell", "home", "--loader-port", "COM3"]).selection();
        assert_eq!(selection[0].address.as_deref(), Some("COM3"));
    }

    #[test]
    fn rejects_unknown_robot() {
        assert!(Args::try_parse_from(["conveyor_cell", "run", "--robot", "welder"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "conveyor_cell",
            "pose",
            "-vv",
            "--config",
            "cell.yaml",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("cell.yaml")));
    }

    #[test]
    fn handoff_override() {
        let args = Args::try_parse_from(["conveyor_cell", "run", "--handoff-ms", "3500"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Run {
                handoff_ms: Some(3500),
                ..
            }
        ));
    }

    #[test]
    fn exit_status_reflects_outcome() {
        assert_eq!(exit_status(&Ok::<(), CellError>(())), EXIT_SUCCESS);
        assert_eq!(
            exit_status::<()>(&Err(CellError::Interrupted)),
            EXIT_INTERRUPTED
        );
        let error = CellError::Configuration(ConfigurationError::UnknownArm(ArmId::new("x")));
        assert_eq!(exit_status::<()>(&Err(error)), EXIT_FAILURE);
    }
}
