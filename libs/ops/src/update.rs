//! VIOS update and upgrade from the console.
//!
//! Both operations mutate unconditionally (there is no attribute diff for
//! an image install); idempotency comes from the version read before and
//! after the mutation.

use serde_json::json;
use tracing::{debug, info};

use hmc_converge::poll::BOOTED_STATE;
use hmc_converge::{
    classify, validate, validate_profile, Action, BootConvergence, ClassifyContext,
    ConstraintProfile, ConvergeError, ConvergeResult, ConvergenceCriterion, Disposition,
    OperationResult, ParameterSet, Poller, RMC_WARNING,
};
use hmc_transport::{parse, CommandTransport};

use crate::probe::PartitionBootProbe;
use crate::target::ViosRef;
use crate::{cmd, required};

/// Read the current VIOS version.
pub async fn facts(
    transport: &dyn CommandTransport,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::Facts;
    validate_profile(&facts_profile(), params)?;
    let system = required(params, "system_name")?;
    let vios = vios_ref(params)?;

    verify_target(transport, ACTION, system, &vios).await?;
    let version = read_version(transport, ACTION, system, &vios).await?;

    Ok(OperationResult::noop().with_info(json!({
        "vios": vios.label(),
        "system": system,
        "version": version,
    })))
}

/// Ensure the VIOS runs the requested update image.
pub async fn update(
    transport: &dyn CommandTransport,
    poller: &Poller,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    ensure(transport, poller, params, Action::UpdateVios).await
}

/// Ensure the VIOS is upgraded with the given upgrade files.
pub async fn upgrade(
    transport: &dyn CommandTransport,
    poller: &Poller,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    ensure(transport, poller, params, Action::UpgradeVios).await
}

async fn ensure(
    transport: &dyn CommandTransport,
    poller: &Poller,
    params: &ParameterSet,
    action: Action,
) -> ConvergeResult<OperationResult> {
    validate(action, params)?;
    let system = required(params, "system_name")?;
    let vios = vios_ref(params)?;

    verify_target(transport, action, system, &vios).await?;
    let before = read_version(transport, action, system, &vios).await?;

    let command = cmd::update_vios(action == Action::UpgradeVios, system, &vios, params);
    info!(system, vios = vios.label(), %action, "issuing image installation");
    match transport.execute(&command).await {
        Ok(_) => {}
        Err(e) => match classify(ClassifyContext::UpdateUpgrade, &e) {
            Disposition::SoftNoop => {
                debug!(error = %e, "insufficient authority, treating as no-op");
                return Ok(OperationResult::noop());
            }
            _ => return Err(ConvergeError::transport(action, e)),
        },
    }

    // The image install may restart the partition; converge through the
    // boot-style two-stage wait before trusting the version read.
    let criterion = ConvergenceCriterion::new([BOOTED_STATE], None)?;
    let probe = PartitionBootProbe {
        transport,
        system: system.to_string(),
        vios: vios.clone(),
    };
    let convergence = poller
        .wait_for_boot(&probe, criterion.deadline, action, vios.label())
        .await?;

    let after = read_version(transport, action, system, &vios).await?;
    if after == before {
        return Ok(OperationResult::noop()
            .with_info(json!({"msg": "The VIOS is already at the required version"})));
    }

    let mut result = OperationResult::applied().with_info(json!({
        "vios": vios.label(),
        "system": system,
        "version": after,
    }));
    if convergence == BootConvergence::ConnectivityPending {
        result = result.with_warning(RMC_WARNING);
    }
    Ok(result)
}

/// The managed system must be known to the console and the VIOS must be
/// running before any mutation is attempted.
async fn verify_target(
    transport: &dyn CommandTransport,
    action: Action,
    system: &str,
    vios: &ViosRef,
) -> ConvergeResult<()> {
    let names = transport
        .execute(&cmd::list_system_names())
        .await
        .map_err(|e| ConvergeError::transport(action, e))?;
    let known_by_name = names.lines().any(|l| l.trim() == system);

    let known = known_by_name || {
        let mtms = transport
            .execute(&cmd::list_system_mtms())
            .await
            .map_err(|e| ConvergeError::transport(action, e))?;
        mtms.lines().filter(|l| !l.trim().is_empty()).any(|line| {
            let fields = parse::split_fields(line.trim());
            matches!(fields.as_slice(),
                [_, type_model, serial] if format!("{type_model}*{serial}") == system)
        })
    };
    if !known {
        return Err(ConvergeError::TargetNotFound(
            "The managed system is not available in HMC".to_string(),
        ));
    }

    let partitions = transport
        .execute(&cmd::list_partitions(system))
        .await
        .map_err(|e| ConvergeError::transport(action, e))?;
    let entry = partitions
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| parse::split_fields(line.trim()))
        .find(|fields| match (vios, fields.as_slice()) {
            (ViosRef::Name(name), [n, _, _]) => n == name,
            (ViosRef::Id(id), [_, _, i]) => i == id,
            _ => false,
        });

    match entry {
        Some(fields) if fields[1] == "Running" => Ok(()),
        Some(_) => Err(ConvergeError::Precondition(
            "The VIOS is not in running state".to_string(),
        )),
        None => Err(ConvergeError::TargetNotFound(
            "The VIOS is not available in HMC".to_string(),
        )),
    }
}

async fn read_version(
    transport: &dyn CommandTransport,
    action: Action,
    system: &str,
    vios: &ViosRef,
) -> ConvergeResult<String> {
    let output = transport
        .execute(&cmd::vios_run(system, vios, "ioslevel"))
        .await
        .map_err(|e| ConvergeError::transport(action, e))?;
    Ok(output.trim().to_string())
}

fn vios_ref(params: &ParameterSet) -> ConvergeResult<ViosRef> {
    if let Some(name) = params.str_value("vios_name") {
        Ok(ViosRef::name(name))
    } else if let Some(id) = params.str_value("vios_id") {
        Ok(ViosRef::id(id))
    } else {
        Err(ConvergeError::Constraint("Missing VIOS details".to_string()))
    }
}

/// Constraint profile for the version facts query.
fn facts_profile() -> ConstraintProfile {
    ConstraintProfile::new(
        &["hmc_host", "hmc_auth", "system_name"],
        &[
            "files",
            "host_name",
            "user_id",
            "password",
            "ssh_key_file",
            "repository",
            "restart",
            "mount_loc",
            "option",
            "directory",
            "save",
            "disks",
            "image_name",
        ],
    )
    .with_exclusive(&["vios_id", "vios_name"], "Missing VIOS details")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vios_ref_prefers_the_supplied_selector() {
        let params = ParameterSet::new().with("vios_name", "vios1");
        assert_eq!(vios_ref(&params).unwrap(), ViosRef::name("vios1"));

        let params = ParameterSet::new().with("vios_id", "2");
        assert_eq!(vios_ref(&params).unwrap(), ViosRef::id("2"));

        assert!(vios_ref(&ParameterSet::new()).is_err());
    }

    #[test]
    fn facts_profile_rejects_repository_parameters() {
        let params = ParameterSet::new()
            .with("hmc_host", "hmc01")
            .with("hmc_auth", "token")
            .with("system_name", "sys1")
            .with("vios_name", "vios1")
            .with("repository", "nfs");
        let err = validate_profile(&facts_profile(), &params).unwrap_err();
        assert_eq!(err.to_string(), "unsupported parameter: repository");
    }
}
