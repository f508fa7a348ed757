//! Service-partition operations: creation, OS installation, license
//! acceptance, and facts.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info};

use hmc_converge::{
    classify, validate, validate_profile, Action, BootConvergence, ClassifyContext,
    ConstraintProfile, ConvergeError, ConvergeResult, ConvergenceCriterion, Disposition,
    OperationResult, ParameterSet, Poller, RMC_WARNING,
};
use hmc_converge::poll::BOOTED_STATE;
use hmc_transport::{CommandTransport, ManagementRest};

use crate::probe::{
    first_pingable, parse_netboot_table, read_partition_config, read_profile_config,
    PartitionBootProbe,
};
use crate::target::{resolve_system_name, ViosRef};
use crate::{cmd, finish_rest, required};

/// Partition attributes the creation command refuses for service
/// partitions.
pub const NOT_SUPPORTED_SETTINGS: &[&str] = &[
    "lpar_env",
    "os400_restricted_io_mode",
    "console_slot",
    "alt_restart_device_slot",
    "alt_console_slot",
    "op_console_slot",
    "load_source_slot",
    "hsl_pool_id",
    "virtual_opti_pool_id",
    "vnic_adapters",
    "electronic_err_reporting",
    "suspend_capable",
    "simplified_remote_restart_capable",
    "remote_restart_capable",
    "migration_disabled",
    "virtual_serial_num",
    "min_num_huge_pages",
    "desired_num_huge_pages",
    "max_num_huge_pages",
    "name",
    "lpar_name",
    "rs_device_name",
    "powervm_mgmt_capable",
    "primary_paging_vios_name",
    "primary_paging_vios_id",
    "secondary_paging_vios_name",
    "secondary_paging_vios_id",
    "primary_rs_vios_name",
    "primary_rs_vios_id",
    "secondary_rs_vios_name",
    "secondary_rs_vios_id",
];

/// Create a service partition, converging on an existing one.
///
/// The existence pre-check treats a partition-lookup failure code as
/// "not present, proceed"; any other failure aborts before the mutation.
pub async fn create(
    transport: &dyn CommandTransport,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::CreateVios;
    validate(ACTION, params)?;
    validate_settings(params.map_value("settings"))?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;
    let name = required(params, "name")?;

    match read_partition_config(transport, &system, name).await {
        Ok(config) => {
            debug!(system, name, "partition already exists");
            return Ok(OperationResult::noop().with_info(record_to_value(config)));
        }
        Err(e) => match classify(ClassifyContext::ExistencePrecheck, &e) {
            Disposition::Proceed => {}
            _ => return Err(ConvergeError::transport(ACTION, e)),
        },
    }

    info!(system, name, "creating service partition");
    transport
        .execute(&cmd::create_vios(&system, name, params.map_value("settings")))
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;

    let config = match params.map_value("settings") {
        Some(settings) => {
            let profile = settings
                .get("profile_name")
                .map(String::as_str)
                .unwrap_or("default_profile");
            read_profile_config(transport, &system, name, profile).await
        }
        None => read_partition_config(transport, &system, name).await,
    }
    .map_err(|e| ConvergeError::transport(ACTION, e))?;

    Ok(OperationResult::applied().with_info(record_to_value(config)))
}

/// Install a service partition's OS, dispatching on the install medium.
pub async fn install(
    transport: &dyn CommandTransport,
    poller: &Poller,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    let has_nim = params.present("nim_ip");
    let has_image = params.present("image_dir");
    if has_nim && has_image {
        return Err(ConvergeError::Constraint(
            "Cannot provide both nim_ip and image_dir. Provide one of them.".to_string(),
        ));
    }
    if has_nim {
        install_via_nim(transport, poller, params).await
    } else if has_image {
        install_via_disk(transport, poller, params).await
    } else {
        Err(ConvergeError::Constraint(
            "Provide at least one parameter out of nim_ip and image_dir".to_string(),
        ))
    }
}

/// Network install from an install server.
async fn install_via_nim(
    transport: &dyn CommandTransport,
    poller: &Poller,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::InstallViaNim;
    validate(ACTION, params)?;
    let criterion = ConvergenceCriterion::new([BOOTED_STATE], params.int_value("timeout"))?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;
    let name = required(params, "name")?;
    let nim_ip = required(params, "nim_ip")?;
    let gateway = required(params, "nim_gateway")?;
    let vios_ip = required(params, "vios_ip")?;
    let mask = required(params, "nim_subnetmask")?;
    let profile = params.str_value("prof_name").unwrap_or("default_profile");
    let vlan_id = params.str_value("nim_vlan_id").unwrap_or("0");
    let vlan_priority = params.str_value("nim_vlan_priority").unwrap_or("0");

    let location_code = match params.str_value("location_code") {
        Some(code) => code.to_string(),
        None => {
            pick_adapter(
                transport, ACTION, nim_ip, gateway, vios_ip, mask, name, profile, &system,
            )
            .await?
            .0
        }
    };

    info!(system, name, location_code, "starting network install");
    transport
        .execute(&cmd::install_via_nim(
            &system,
            name,
            profile,
            &location_code,
            nim_ip,
            gateway,
            vios_ip,
            mask,
            vlan_id,
            vlan_priority,
        ))
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;

    await_boot(transport, poller, &system, name, criterion, ACTION).await
}

/// Install from an image on the console's disk.
async fn install_via_disk(
    transport: &dyn CommandTransport,
    poller: &Poller,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::InstallViaDisk;
    validate(ACTION, params)?;
    let criterion = ConvergenceCriterion::new([BOOTED_STATE], params.int_value("timeout"))?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;
    let name = required(params, "vios_name")?;
    let iso = required(params, "vios_iso")?;
    let image_dir = required(params, "image_dir")?;
    let vios_ip = required(params, "vios_ip")?;
    let gateway = required(params, "vios_gateway")?;
    let mask = required(params, "vios_subnetmask")?;
    let profile = required(params, "prof_name")?;

    let mac = match params.str_value("network_macaddr") {
        Some(mac) => mac.to_string(),
        None => {
            let server = required(params, "hmc_host")?;
            let picked = pick_adapter(
                transport, ACTION, server, gateway, vios_ip, mask, name, profile, &system,
            )
            .await?;
            picked.1
        }
    };

    info!(system, name, mac, "starting disk install");
    transport
        .execute(&cmd::install_via_disk(
            &system,
            name,
            profile,
            image_dir,
            iso,
            vios_ip,
            gateway,
            mask,
            &mac,
            params.str_value("label"),
        ))
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;

    await_boot(transport, poller, &system, name, criterion, ACTION).await
}

/// Accept the OS license after a fresh installation.
///
/// Requires the partition's management connection to be active; the
/// license command runs inside the partition over that channel.
pub async fn accept_license(
    transport: &dyn CommandTransport,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::AcceptLicense;
    validate(ACTION, params)?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;
    let name = required(params, "name")?;

    let config = read_partition_config(transport, &system, name)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    let rmc_state = config.get("rmc_state").cloned().unwrap_or_default();
    if rmc_state != "active" {
        return Err(ConvergeError::Precondition(format!(
            "cannot accept the license since the RMC state is {rmc_state}"
        )));
    }

    info!(system, name, "accepting license");
    transport
        .execute(&cmd::vios_run(&system, &ViosRef::name(name), "license -accept"))
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    Ok(OperationResult::applied())
}

/// Fetch a service partition's quick document, enriched with memory and
/// processor bounds and optional media/volume inventories.
pub async fn facts(
    transport: &dyn CommandTransport,
    rest: &dyn ManagementRest,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::Facts;
    validate_profile(&facts_profile(), params)?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;
    let name = required(params, "name")?;

    let outcome = facts_inner(rest, params, &system, name).await;
    finish_rest(rest, outcome).await
}

async fn facts_inner(
    rest: &dyn ManagementRest,
    params: &ParameterSet,
    system: &str,
    name: &str,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::Facts;

    let (system_id, system_doc) = rest
        .lookup_system(system)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?
        .ok_or_else(|| ConvergeError::TargetNotFound("Given system is not present".to_string()))?;

    let detailed_state = system_doc
        .get("DetailedState")
        .and_then(Value::as_str)
        .unwrap_or("None");
    if detailed_state != "None" {
        return Err(ConvergeError::Precondition(format!(
            "Given system is in {detailed_state} state"
        )));
    }

    let listing = rest
        .vios_quick_all(&system_id)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    let record = listing
        .as_array()
        .and_then(|partitions| {
            partitions
                .iter()
                .find(|p| p.get("PartitionName").and_then(Value::as_str) == Some(name))
        })
        .cloned()
        .ok_or_else(|| {
            ConvergeError::TargetNotFound(format!(
                "VIOS {name} not found in the managed system {system}"
            ))
        })?;

    let mut record = match record {
        Value::Object(map) => map,
        other => {
            return Err(ConvergeError::transport(
                ACTION,
                hmc_transport::TransportError::Malformed(format!(
                    "partition record is not an object: {other}"
                )),
            ))
        }
    };

    let vios_id = record
        .get("UUID")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if !vios_id.is_empty() {
        let details = rest
            .vios_quick(&vios_id)
            .await
            .map_err(|e| ConvergeError::transport(ACTION, e))?;
        if let Value::Object(details) = details {
            for (key, value) in details {
                record.entry(key).or_insert(value);
            }
        }

        if params.bool_value("virtual_optical_media") == Some(true) {
            let media = rest
                .vios_optical_media(&vios_id)
                .await
                .map_err(|e| ConvergeError::transport(ACTION, e))?;
            record.insert("VirtualOpticalMedia".to_string(), media);
        }

        if params.bool_value("free_pvs") == Some(true) {
            // Volume inventory degrades to an empty list when the query
            // fails; partial facts beat no facts here.
            let volumes = match rest.free_physical_volumes(&vios_id).await {
                Ok(volumes) => volumes,
                Err(e) => {
                    debug!(error = %e, "free volume inventory unavailable");
                    Vec::new()
                }
            };
            record.insert("FreePhysicalVolumes".to_string(), Value::Array(volumes));
        }
    }

    Ok(OperationResult::noop().with_info(Value::Object(record)))
}

/// Constraint profile for the partition facts query.
fn facts_profile() -> ConstraintProfile {
    ConstraintProfile::new(
        &["hmc_host", "hmc_auth", "system_name", "name"],
        &[
            "nim_ip",
            "nim_gateway",
            "vios_ip",
            "nim_subnetmask",
            "prof_name",
            "location_code",
            "nim_vlan_id",
            "nim_vlan_priority",
            "timeout",
            "settings",
        ],
    )
}

fn validate_settings(settings: Option<&BTreeMap<String, String>>) -> ConvergeResult<()> {
    let Some(settings) = settings else {
        return Ok(());
    };
    let invalid: Vec<&str> = settings
        .keys()
        .map(String::as_str)
        .filter(|key| NOT_SUPPORTED_SETTINGS.contains(key))
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ConvergeError::Constraint(format!(
            "Invalid parameters: {}",
            invalid.join(", ")
        )))
    }
}

/// Probe the bootable adapters and pick the first reachable one.
/// Returns (location code, MAC address).
#[allow(clippy::too_many_arguments)]
async fn pick_adapter(
    transport: &dyn CommandTransport,
    action: Action,
    server: &str,
    gateway: &str,
    client: &str,
    mask: &str,
    name: &str,
    profile: &str,
    system: &str,
) -> ConvergeResult<(String, String)> {
    let output = transport
        .execute(&cmd::netboot_probe(
            server, gateway, client, mask, name, profile, system,
        ))
        .await
        .map_err(|e| ConvergeError::transport(action, e))?;

    let devices = parse_netboot_table(&output);
    match first_pingable(&devices) {
        Some(device) => Ok((device.location_code.clone(), device.mac_address.clone())),
        None => Err(ConvergeError::TargetNotFound(
            "none of the adapters in the partition profile is reachable through the network, attach a correct network adapter"
                .to_string(),
        )),
    }
}

/// Two-stage boot convergence shared by both install media.
async fn await_boot(
    transport: &dyn CommandTransport,
    poller: &Poller,
    system: &str,
    name: &str,
    criterion: ConvergenceCriterion,
    action: Action,
) -> ConvergeResult<OperationResult> {
    let probe = PartitionBootProbe {
        transport,
        system: system.to_string(),
        vios: ViosRef::name(name),
    };

    let convergence = poller
        .wait_for_boot(&probe, criterion.deadline, action, name)
        .await?;

    let info = read_partition_config(transport, system, name)
        .await
        .ok()
        .map(record_to_value);

    let mut result = OperationResult::applied();
    if let Some(info) = info {
        result = result.with_info(info);
    }
    if convergence == BootConvergence::ConnectivityPending {
        result = result.with_warning(RMC_WARNING);
    }
    Ok(result)
}

fn record_to_value(record: BTreeMap<String, String>) -> Value {
    Value::Object(
        record
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_outside_the_supported_set_are_rejected() {
        let mut settings = BTreeMap::new();
        settings.insert("lpar_env".to_string(), "aixlinux".to_string());
        settings.insert("max_mem".to_string(), "8192".to_string());

        let err = validate_settings(Some(&settings)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameters: lpar_env");
    }

    #[test]
    fn supported_settings_pass() {
        let mut settings = BTreeMap::new();
        settings.insert("profile_name".to_string(), "prod".to_string());
        settings.insert("max_mem".to_string(), "8192".to_string());
        assert!(validate_settings(Some(&settings)).is_ok());
        assert!(validate_settings(None).is_ok());
    }
}
