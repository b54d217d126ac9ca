use anyhow::Result;
use clap::Parser;
use conveyor_cell::{
    cli::{exit_status, Args, Command, Target},
    logging,
};
use conveyor_controller::{
    arm_driver::DriverConnector,
    cell_config::CellConfig,
    error::CellError,
    orchestrator::CellOrchestrator,
    port_discovery::{select_port, PortEnumerator, SystemPorts},
    simulator::{MotionSpeed, SimulatedConnector, SimulationSettings},
    waypoints::ArmId,
};
use std::error::Error;
use std::process::ExitCode;

/// Resolves on Ctrl+c, never if the handler can't be installed
async fn interrupted() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to wait for Ctrl+c: {}", error);
        std::future::pending::<()>().await;
    }
    tracing::info!("Detected Ctrl+c");
}

fn simulated_arm(arm: &ArmId) -> Box<dyn DriverConnector> {
    tracing::warn!(
        arm = %arm,
        "No hardware backend built in, driving a simulated arm; no device will move"
    );
    Box::new(SimulatedConnector::new(SimulationSettings {
        motion_speed: Some(MotionSpeed {
            translation: 200.0,
            rotation: 180.0,
        }),
        ..Default::default()
    }))
}

fn build(config: &CellConfig, target: &Target) -> Result<CellOrchestrator> {
    let orchestrator =
        CellOrchestrator::from_config(config, &target.selection(), &SystemPorts, simulated_arm)?;
    for station in orchestrator.stations() {
        tracing::info!(
            arm = %station.arm(),
            address = station.address(),
            backend = "simulated",
            "Arm selected"
        );
    }
    Ok(orchestrator)
}

fn report<T>(result: &std::result::Result<T, CellError>) -> ExitCode {
    if let Err(error) = result {
        if !error.is_interrupt() {
            let mut message = error.to_string();
            let mut source = error.source();
            while let Some(cause) = source {
                message.push_str(&format!(": {}", cause));
                source = cause.source();
            }
            eprintln!("Error: {}", message);
        }
    }
    ExitCode::from(exit_status(result))
}

fn list_ports() -> Result<()> {
    let ports = SystemPorts.available_ports()?;
    if ports.is_empty() {
        println!("No serial ports available");
        return Ok(());
    }
    let preferred = select_port(&ports);
    for port in &ports {
        if Some(port.as_str()) == preferred {
            println!("{} (auto detect)", port);
        } else {
            println!("{}", port);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::setup_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => CellConfig::load(path)?,
        None => CellConfig::included(),
    };

    let exit_code = match args.command {
        Command::Run { target, handoff_ms } => {
            if let Some(handoff_ms) = handoff_ms {
                config.handoff_interval_ms = handoff_ms;
            }
            let mut orchestrator = build(&config, &target)?;
            let result = orchestrator.run(interrupted()).await;
            report(&result)
        }
        Command::Home { target } => {
            let mut orchestrator = build(&config, &target)?;
            let result = orchestrator.home(interrupted()).await;
            report(&result)
        }
        Command::Pose { target } => {
            let mut orchestrator = build(&config, &target)?;
            let result = orchestrator.read_poses(interrupted()).await;
            if let Ok(poses) = &result {
                for (arm, pose) in poses {
                    println!("{}: {}", arm, pose);
                }
            }
            report(&result)
        }
        Command::Ports => {
            list_ports()?;
            ExitCode::SUCCESS
        }
    };

    Ok(exit_code)
}
