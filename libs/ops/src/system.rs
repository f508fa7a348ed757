//! Managed-system operations: power transitions, configuration
//! reconciliation, PCM metric toggles, and facts.

use tracing::{debug, info};

use hmc_converge::{
    is_noop, project_current, validate, Action, ConvergeError, ConvergeResult,
    ConvergenceCriterion, OperationResult, ParameterSet, Poller,
};
use hmc_transport::{CommandTransport, ManagementRest};

use crate::probe::{read_mem_attributes, read_system_attributes, SystemStateProbe};
use crate::target::resolve_system_name;
use crate::{cmd, finish_rest, required, POWERED_OFF_STATE};

/// Power a managed system on.
///
/// A no-op unless the current state is exactly powered off; otherwise one
/// power-on call followed by convergence to an operating or standby state.
pub async fn power_on(
    transport: &dyn CommandTransport,
    poller: &Poller,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::PowerOn;
    validate(ACTION, params)?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;

    let current = read_system_attributes(transport, &system)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    let state = current.get("state").cloned().unwrap_or_default();
    if state != POWERED_OFF_STATE {
        debug!(system, state, "system is not powered off, nothing to do");
        return Ok(OperationResult::noop());
    }

    info!(system, "powering on");
    transport
        .execute(&cmd::power_on(&system))
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;

    let criterion = ConvergenceCriterion::new(["Operating", "Standby"], None)?;
    let probe = SystemStateProbe {
        transport,
        system: system.clone(),
    };
    poller.wait_for(&probe, &criterion, ACTION, &system).await?;
    Ok(OperationResult::applied())
}

/// Power a managed system off.
///
/// A no-op when the system is already powered off; otherwise one
/// power-off call followed by convergence to the powered-off state.
pub async fn power_off(
    transport: &dyn CommandTransport,
    poller: &Poller,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::PowerOff;
    validate(ACTION, params)?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;

    let current = read_system_attributes(transport, &system)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    let state = current.get("state").cloned().unwrap_or_default();
    if state == POWERED_OFF_STATE {
        debug!(system, "system is already powered off");
        return Ok(OperationResult::noop());
    }

    info!(system, "powering off");
    transport
        .execute(&cmd::power_off(&system))
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;

    let criterion = ConvergenceCriterion::new([POWERED_OFF_STATE], None)?;
    let probe = SystemStateProbe {
        transport,
        system: system.clone(),
    };
    poller.wait_for(&probe, &criterion, ACTION, &system).await?;
    Ok(OperationResult::applied())
}

/// Reconcile general system configuration (name, power policies).
pub async fn modify_syscfg(
    transport: &dyn CommandTransport,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::ModifySysConfig;
    validate(ACTION, params)?;
    let desired = params.desired_attributes();
    if desired.is_empty() {
        return Err(ConvergeError::Constraint(
            "at least one system configuration setting must be provided".to_string(),
        ));
    }
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;

    let current = read_system_attributes(transport, &system)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    if is_noop(&desired, &project_current(current)) {
        debug!(system, "configuration already satisfied");
        return Ok(OperationResult::noop());
    }

    info!(system, ?desired, "applying system configuration");
    transport
        .execute(&cmd::modify_syscfg(&system, &desired))
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;

    let after = read_system_attributes(transport, &system)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    if is_noop(&desired, &project_current(after)) {
        Ok(OperationResult::applied())
    } else {
        Ok(OperationResult::applied()
            .with_warning("configuration change accepted but not yet reflected by the console"))
    }
}

/// Reconcile system-level hardware resources (huge pages, memory
/// mirroring, region size).
pub async fn modify_hwres(
    transport: &dyn CommandTransport,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::ModifyHwRes;
    validate(ACTION, params)?;
    let desired = params.desired_attributes();
    if desired.is_empty() {
        return Err(ConvergeError::Constraint(
            "at least one hardware resource setting must be provided".to_string(),
        ));
    }
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;

    let current = read_mem_attributes(transport, &system)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    if is_noop(&desired, &project_current(current)) {
        debug!(system, "hardware resources already satisfied");
        return Ok(OperationResult::noop());
    }

    info!(system, ?desired, "applying hardware resource settings");
    transport
        .execute(&cmd::modify_mem_sys(&system, &desired))
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;

    let after = read_mem_attributes(transport, &system)
        .await
        .map_err(|e| ConvergeError::transport(ACTION, e))?;
    if is_noop(&desired, &project_current(after)) {
        Ok(OperationResult::applied())
    } else {
        Ok(OperationResult::applied()
            .with_warning("resource change accepted but not yet reflected by the console"))
    }
}

/// Fetch the managed system's summary document.
pub async fn facts(
    transport: &dyn CommandTransport,
    rest: &dyn ManagementRest,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::Facts;
    validate(ACTION, params)?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;

    let outcome = async {
        let (id, _) = rest
            .lookup_system(&system)
            .await
            .map_err(|e| ConvergeError::transport(ACTION, e))?
            .ok_or_else(|| {
                ConvergeError::TargetNotFound("Given system is not present".to_string())
            })?;
        let summary = rest
            .system_summary(&id)
            .await
            .map_err(|e| ConvergeError::transport(ACTION, e))?;
        Ok(OperationResult::noop().with_info(summary))
    }
    .await;

    finish_rest(rest, outcome).await
}

/// Fetch the PCM preference document for the managed system.
pub async fn pcm_facts(
    transport: &dyn CommandTransport,
    rest: &dyn ManagementRest,
    params: &ParameterSet,
) -> ConvergeResult<OperationResult> {
    const ACTION: Action = Action::PcmFacts;
    validate(ACTION, params)?;
    let system = resolve_system_name(transport, ACTION, required(params, "system_name")?).await?;

    let outcome = async {
        let (id, _) = rest
            .lookup_system(&system)
            .await
            .map_err(|e| ConvergeError::transport(ACTION, e))?
            .ok_or_else(|| {
                ConvergeError::TargetNotFound("Given system is not present".to_string())
            })?;
        let preferences = rest
            .pcm_preferences(&id)
            .await
            .map_err(|e| ConvergeError::transport(ACTION, e))?;
        Ok(OperationResult::noop().with_info(preferences))
    }
    .await;

    finish_rest(rest, outcome).await
}

/// Toggle PCM metric groups on or off.
///
/// The console couples some groups: enabling AM drags LTM and EM along,
/// and disabling LTM or EM also disables AM. Both couplings surface as
/// warnings.
pub async fn update_pcm(
    transport: &dyn CommandTransport,
    rest: &dyn ManagementRest,
    params: &ParameterSet,
    disable: bool,
) -> ConvergeResult<OperationResult> {
    let action = if disable {
        Action::DisablePcm
    } else {
        Action::EnablePcm
    };
    validate(action, params)?;
    let system = resolve_system_name(transport, action, required(params, "system_name")?).await?;
    let metrics: Vec<String> = params
        .list_value("metrics")
        .unwrap_or_default()
        .to_vec();

    let outcome = async {
        let (id, _) = rest
            .lookup_system(&system)
            .await
            .map_err(|e| ConvergeError::transport(action, e))?
            .ok_or_else(|| {
                ConvergeError::TargetNotFound("Given system is not present".to_string())
            })?;

        info!(system, ?metrics, disable, "updating PCM preferences");
        let updated = rest
            .update_pcm(&id, &metrics, disable)
            .await
            .map_err(|e| ConvergeError::transport(action, e))?;

        let Some(preferences) = updated else {
            return Ok(OperationResult::noop());
        };

        let mut result = OperationResult::applied().with_info(preferences);
        if let Some(warning) = coupling_warning(&metrics, disable) {
            result = result.with_warning(warning);
        }
        Ok(result)
    }
    .await;

    finish_rest(rest, outcome).await
}

fn coupling_warning(metrics: &[String], disable: bool) -> Option<&'static str> {
    let has = |name: &str| metrics.iter().any(|m| m == name);
    if !disable && has("AM") {
        Some("Enabling AM will automatically enable LTM and EM metrics")
    } else if disable && (has("LTM") || has("EM")) {
        Some("Disabling LTM or EM automatically disables AM metrics")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn am_enable_and_ltm_disable_warn_about_coupling() {
        let metrics = vec!["AM".to_string()];
        assert!(coupling_warning(&metrics, false).unwrap().contains("LTM and EM"));
        assert!(coupling_warning(&metrics, true).is_none());

        let metrics = vec!["LTM".to_string(), "STM".to_string()];
        assert!(coupling_warning(&metrics, true).unwrap().contains("disables AM"));
        assert!(coupling_warning(&metrics, false).is_none());
    }
}
