//! Live-state readers and convergence probes.

use std::collections::BTreeMap;

use async_trait::async_trait;

use hmc_converge::poll::{BootProbe, BootSignals, StateProbe};
use hmc_transport::{parse, CommandTransport, TransportError};

use crate::cmd;
use crate::target::ViosRef;

/// Read the full attribute record of a managed system.
pub async fn read_system_attributes(
    transport: &dyn CommandTransport,
    system: &str,
) -> Result<BTreeMap<String, String>, TransportError> {
    let output = transport.execute(&cmd::list_system(system)).await?;
    first_record(&output)
}

/// Read the system-level memory attribute record.
pub async fn read_mem_attributes(
    transport: &dyn CommandTransport,
    system: &str,
) -> Result<BTreeMap<String, String>, TransportError> {
    let output = transport.execute(&cmd::list_mem_sys(system)).await?;
    first_record(&output)
}

/// Read a partition's attribute record.
pub async fn read_partition_config(
    transport: &dyn CommandTransport,
    system: &str,
    name: &str,
) -> Result<BTreeMap<String, String>, TransportError> {
    let output = transport.execute(&cmd::partition_config(system, name)).await?;
    first_record(&output)
}

/// Read a partition profile's attribute record.
pub async fn read_profile_config(
    transport: &dyn CommandTransport,
    system: &str,
    name: &str,
    profile: &str,
) -> Result<BTreeMap<String, String>, TransportError> {
    let output = transport
        .execute(&cmd::profile_config(system, name, profile))
        .await?;
    first_record(&output)
}

fn first_record(output: &str) -> Result<BTreeMap<String, String>, TransportError> {
    output
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(parse::parse_record)
        .ok_or_else(|| TransportError::Malformed("empty attribute listing".to_string()))
}

fn first_line(output: &str) -> String {
    output
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Coarse-state probe for a managed system.
pub struct SystemStateProbe<'a> {
    pub transport: &'a dyn CommandTransport,
    pub system: String,
}

#[async_trait]
impl StateProbe for SystemStateProbe<'_> {
    async fn coarse_state(&self) -> Result<String, TransportError> {
        let output = self
            .transport
            .execute(&cmd::list_system_state(&self.system))
            .await?;
        Ok(first_line(&output))
    }
}

/// Probe for boot-style convergence of a service partition.
pub struct PartitionBootProbe<'a> {
    pub transport: &'a dyn CommandTransport,
    pub system: String,
    pub vios: ViosRef,
}

#[async_trait]
impl StateProbe for PartitionBootProbe<'_> {
    async fn coarse_state(&self) -> Result<String, TransportError> {
        let output = self
            .transport
            .execute(&cmd::partition_state(&self.system, &self.vios))
            .await?;
        Ok(first_line(&output))
    }
}

#[async_trait]
impl BootProbe for PartitionBootProbe<'_> {
    async fn boot_signals(&self) -> Result<BootSignals, TransportError> {
        let rmc = self
            .transport
            .execute(&cmd::partition_rmc_state(&self.system, &self.vios))
            .await?;
        let ref_code = self
            .transport
            .execute(&cmd::partition_ref_code(&self.system, &self.vios))
            .await?;
        Ok(BootSignals {
            rmc_active: first_line(&rmc) == "active",
            ref_code: first_line(&ref_code),
        })
    }
}

/// One bootable adapter candidate from a netboot probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetbootDevice {
    pub location_code: String,
    pub mac_address: String,
    pub ping_result: String,
}

/// Parse the adapter table a netboot probe prints.
///
/// Columns are whitespace-aligned: type, location code, MAC address, full
/// path name, ping result. Comment and header lines start with `#`.
pub fn parse_netboot_table(output: &str) -> Vec<NetbootDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 5 {
                return None;
            }
            Some(NetbootDevice {
                location_code: columns[1].to_string(),
                mac_address: columns[2].to_string(),
                ping_result: columns[4].to_string(),
            })
        })
        .collect()
}

/// First adapter that answered the ping probe, if any.
pub fn first_pingable(devices: &[NetbootDevice]) -> Option<&NetbootDevice> {
    devices.iter().find(|d| d.ping_result == "successful")
}
