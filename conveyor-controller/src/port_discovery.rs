use crate::cell_config::CellConfig;
use crate::error::ConnectionError;
use crate::waypoints::ArmId;
use tracing::{debug, info};

/// Source of candidate serial port addresses
pub trait PortEnumerator {
    fn available_ports(&self) -> Result<Vec<String>, serialport::Error>;
}

/// Ports reported by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn available_ports(&self) -> Result<Vec<String>, serialport::Error> {
        let ports = serialport::available_ports()?
            .into_iter()
            .map(|port| port.port_name)
            .collect();
        Ok(ports)
    }
}

/// USB adapters first, otherwise whatever came first
pub fn select_port(candidates: &[String]) -> Option<&str> {
    candidates
        .iter()
        .find(|port| port.contains("USB"))
        .or_else(|| candidates.first())
        .map(String::as_str)
}

/// Explicit override, then configured address, then auto detection
pub fn resolve_address(
    arm: &ArmId,
    address_override: Option<&str>,
    config: &CellConfig,
    enumerator: &dyn PortEnumerator,
) -> Result<String, ConnectionError> {
    if let Some(address) = address_override {
        debug!(arm = %arm, address, "Using address override");
        return Ok(address.to_owned());
    }
    if let Some(address) = config.address_for(arm) {
        debug!(arm = %arm, address, "Using configured address");
        return Ok(address.to_owned());
    }
    let candidates = enumerator
        .available_ports()
        .map_err(|source| ConnectionError::Discovery {
            arm: arm.clone(),
            source,
        })?;
    info!(arm = %arm, "Available ports: {:?}", candidates);
    select_port(&candidates)
        .map(str::to_owned)
        .ok_or_else(|| ConnectionError::NoAddress { arm: arm.clone() })
}
