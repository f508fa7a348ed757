//! Per-action constraint profiles and the parameter validator.
//!
//! Each [`Action`] maps to an immutable [`ConstraintProfile`] composed at
//! lookup time by plain set union. Composite actions (install by medium,
//! update/upgrade by repository) union a base profile with sub-profiles
//! keyed by their discriminator. Validation is purely local: it never
//! performs a remote call.

use crate::action::Action;
use crate::error::{ConvergeError, ConvergeResult};
use crate::params::ParameterSet;

/// Mandatory and unsupported parameter names plus mutually-exclusive
/// groups for one action.
#[derive(Debug, Clone, Default)]
pub struct ConstraintProfile {
    mandatory: Vec<&'static str>,
    unsupported: Vec<&'static str>,
    exclusive: Vec<ExclusiveGroup>,
}

/// A group of parameters of which exactly one must be supplied.
#[derive(Debug, Clone)]
pub struct ExclusiveGroup {
    members: &'static [&'static str],
    none_message: &'static str,
}

impl ConstraintProfile {
    pub fn new(mandatory: &[&'static str], unsupported: &[&'static str]) -> Self {
        debug_assert!(
            mandatory.iter().all(|m| !unsupported.contains(m)),
            "mandatory and unsupported sets must be disjoint"
        );
        Self {
            mandatory: mandatory.to_vec(),
            unsupported: unsupported.to_vec(),
            exclusive: Vec::new(),
        }
    }

    pub fn with_exclusive(
        mut self,
        members: &'static [&'static str],
        none_message: &'static str,
    ) -> Self {
        self.exclusive.push(ExclusiveGroup {
            members,
            none_message,
        });
        self
    }

    /// Accumulate another profile's lists. No deduplication is required;
    /// a name listed twice behaves the same as listed once.
    pub fn union(mut self, other: ConstraintProfile) -> Self {
        self.mandatory.extend(other.mandatory);
        self.unsupported.extend(other.unsupported);
        self.exclusive.extend(other.exclusive);
        debug_assert!(
            self.mandatory.iter().all(|m| !self.unsupported.contains(m)),
            "mandatory and unsupported sets must stay disjoint after union"
        );
        self
    }

    pub fn mandatory(&self) -> &[&'static str] {
        &self.mandatory
    }

    pub fn unsupported(&self) -> &[&'static str] {
        &self.unsupported
    }
}

const CONNECTION: &[&str] = &["hmc_host", "hmc_auth", "system_name"];

const SYSCFG_ATTRS: &[&str] = &["new_name", "power_off_policy", "power_on_lpar_start_policy"];

const HWRES_ATTRS: &[&str] = &[
    "requested_num_sys_huge_pages",
    "mem_mirroring_mode",
    "pend_mem_region_size",
];

/// Build the profile for an action.
///
/// Update/upgrade profiles depend on the repository discriminator, so the
/// parameter set is consulted for composition, never for validation;
/// that happens in [`validate`].
pub fn profile_for(action: Action, params: &ParameterSet) -> ConstraintProfile {
    match action {
        Action::ModifySysConfig => ConstraintProfile::new(
            CONNECTION,
            &[
                "requested_num_sys_huge_pages",
                "mem_mirroring_mode",
                "pend_mem_region_size",
                "metrics",
            ],
        ),
        Action::ModifyHwRes => ConstraintProfile::new(
            CONNECTION,
            &[
                "new_name",
                "power_off_policy",
                "power_on_lpar_start_policy",
                "metrics",
            ],
        ),
        Action::EnablePcm | Action::DisablePcm => ConstraintProfile::new(
            &["hmc_host", "hmc_auth", "system_name", "metrics"],
            &[
                "new_name",
                "power_off_policy",
                "power_on_lpar_start_policy",
                "requested_num_sys_huge_pages",
                "mem_mirroring_mode",
                "pend_mem_region_size",
            ],
        ),
        Action::PowerOn | Action::PowerOff | Action::Facts | Action::PcmFacts => {
            let mut unsupported: Vec<&'static str> = Vec::new();
            unsupported.extend_from_slice(SYSCFG_ATTRS);
            unsupported.extend_from_slice(HWRES_ATTRS);
            ConstraintProfile::new(CONNECTION, &[])
                .union(ConstraintProfile::new(&[], &unsupported))
                .union(ConstraintProfile::new(&[], &["metrics"]))
        }
        Action::CreateVios => ConstraintProfile::new(
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
                "virtual_optical_media",
                "free_pvs",
            ],
        ),
        Action::AcceptLicense => ConstraintProfile::new(
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
                "virtual_optical_media",
                "free_pvs",
            ],
        ),
        Action::InstallViaNim => ConstraintProfile::new(
            &[
                "hmc_host",
                "hmc_auth",
                "system_name",
                "nim_ip",
                "vios_ip",
                "nim_subnetmask",
                "nim_gateway",
                "name",
            ],
            &[
                "settings",
                "virtual_optical_media",
                "free_pvs",
                "vios_iso",
                "image_dir",
                "network_macaddr",
                "prof_name",
                "label",
            ],
        ),
        Action::InstallViaDisk => ConstraintProfile::new(
            &[
                "hmc_host",
                "hmc_auth",
                "vios_iso",
                "image_dir",
                "vios_ip",
                "vios_gateway",
                "vios_subnetmask",
                "system_name",
                "vios_name",
                "prof_name",
            ],
            &["nim_ip", "name", "nim_gateway", "nim_subnetmask"],
        ),
        Action::UpdateVios | Action::UpgradeVios => update_profile(action, params),
    }
}

/// Compose the update/upgrade profile: base ∪ state sub-profile ∪
/// repository sub-profile.
fn update_profile(action: Action, params: &ParameterSet) -> ConstraintProfile {
    let base = ConstraintProfile::new(&["hmc_host", "hmc_auth", "repository", "system_name"], &[])
        .with_exclusive(&["vios_id", "vios_name"], "Missing VIOS details");

    let repository = params.str_value("repository").unwrap_or_default();

    let state_profile = match action {
        Action::UpdateVios => ConstraintProfile::new(&[], &["disks"]),
        Action::UpgradeVios => {
            let mut p = ConstraintProfile::new(&["disks"], &["restart"]);
            if matches!(repository, "sftp" | "nfs") {
                p = p.union(ConstraintProfile::new(&["files"], &[]));
            }
            p
        }
        _ => unreachable!("update_profile is only composed for update/upgrade"),
    };

    let repo_profile = match repository {
        "sftp" => ConstraintProfile::new(&["user_id", "host_name"], &["mount_loc", "option"])
            .with_exclusive(
                &["ssh_key_file", "password"],
                "Either 'ssh_key_file' or 'password' is mandatory",
            ),
        "disk" => ConstraintProfile::new(
            &["image_name"],
            &[
                "files",
                "host_name",
                "user_id",
                "password",
                "ssh_key_file",
                "mount_loc",
                "option",
                "directory",
                "save",
            ],
        ),
        "ibmwebsite" => ConstraintProfile::new(
            &["image_name"],
            &[
                "files",
                "host_name",
                "user_id",
                "password",
                "ssh_key_file",
                "mount_loc",
                "option",
                "directory",
            ],
        ),
        "nfs" => ConstraintProfile::new(
            &["mount_loc", "host_name"],
            &["user_id", "password", "ssh_key_file"],
        ),
        _ => ConstraintProfile::default(),
    };

    base.union(state_profile).union(repo_profile)
}

/// Validate caller parameters against the action's constraint profile.
pub fn validate(action: Action, params: &ParameterSet) -> ConvergeResult<()> {
    // Cross-parameter rules that gate profile composition.
    if action == Action::UpgradeVios && params.str_value("repository") == Some("ibmwebsite") {
        return Err(ConvergeError::Constraint(
            "Upgrade using 'ibmwebsite' is not supported".to_string(),
        ));
    }
    if matches!(action, Action::UpdateVios | Action::UpgradeVios)
        && matches!(params.str_value("repository"), Some("nfs") | Some("sftp"))
    {
        let save = params.get("save").is_some();
        let image = params.present("image_name");
        if save && !image {
            return Err(ConvergeError::Constraint(
                "To save the image to the HMC hard disk, 'image_name' parameter is required"
                    .to_string(),
            ));
        }
        if !save && image {
            return Err(ConvergeError::Constraint(
                "For remote server repository 'image_name' parameter is only required if 'save' option is set to 'true'"
                    .to_string(),
            ));
        }
    }

    validate_profile(&profile_for(action, params), params)
}

/// Validate against an explicit profile.
///
/// Query surfaces outside the closed action set (partition facts, build
/// facts) reuse the same mechanics through this entry point.
pub fn validate_profile(profile: &ConstraintProfile, params: &ParameterSet) -> ConvergeResult<()> {
    for group in &profile.exclusive {
        let supplied = group
            .members
            .iter()
            .filter(|name| params.present(name))
            .count();
        if supplied == 0 {
            return Err(ConvergeError::Constraint(group.none_message.to_string()));
        }
        if supplied > 1 {
            let quoted: Vec<String> = group
                .members
                .iter()
                .map(|name| format!("'{name}'"))
                .collect();
            return Err(ConvergeError::Constraint(format!(
                "Parameters {} are mutually exclusive",
                quoted.join(" and ")
            )));
        }
    }

    let missing: Vec<&str> = profile
        .mandatory
        .iter()
        .filter(|name| !params.present(name))
        .copied()
        .collect();
    if !missing.is_empty() {
        let message = if missing.len() == 1 {
            format!("mandatory parameter '{}' is missing", missing[0])
        } else {
            format!("mandatory parameters '{}' are missing", missing.join(","))
        };
        return Err(ConvergeError::Constraint(message));
    }

    let present: Vec<&str> = profile
        .unsupported
        .iter()
        .filter(|name| params.present(name))
        .copied()
        .collect();
    if !present.is_empty() {
        let message = if present.len() == 1 {
            format!("unsupported parameter: {}", present[0])
        } else {
            format!("unsupported parameters: {}", present.join(", "))
        };
        return Err(ConvergeError::Constraint(message));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> ParameterSet {
        ParameterSet::new()
            .with("hmc_host", "hmc01")
            .with("hmc_auth", auth())
            .with("system_name", "sys1")
    }

    fn auth() -> std::collections::BTreeMap<String, String> {
        let mut auth = std::collections::BTreeMap::new();
        auth.insert("username".to_string(), "hscroot".to_string());
        auth.insert("password".to_string(), "secret".to_string());
        auth
    }

    #[test]
    fn missing_single_mandatory_uses_singular_phrasing() {
        let params = ParameterSet::new()
            .with("hmc_host", "hmc01")
            .with("hmc_auth", auth());

        let err = validate(Action::PowerOn, &params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mandatory parameter 'system_name' is missing"
        );
    }

    #[test]
    fn missing_several_mandatory_uses_plural_phrasing() {
        let params = ParameterSet::new().with("hmc_host", "hmc01");

        let err = validate(Action::PowerOn, &params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mandatory parameters 'hmc_auth,system_name' are missing"
        );
    }

    #[test]
    fn unsupported_parameter_is_rejected() {
        let params = base_params().with("metrics", vec!["LTM".to_string()]);
        let err = validate(Action::ModifySysConfig, &params).unwrap_err();
        assert_eq!(err.to_string(), "unsupported parameter: metrics");
    }

    #[test]
    fn several_unsupported_parameters_are_listed() {
        let params = base_params()
            .with("new_name", "renamed")
            .with("power_off_policy", 1_i64);
        let err = validate(Action::ModifyHwRes, &params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported parameters: new_name, power_off_policy"
        );
    }

    #[test]
    fn modify_syscfg_accepts_its_own_attributes() {
        let params = base_params()
            .with("new_name", "renamed")
            .with("power_off_policy", 1_i64);
        assert!(validate(Action::ModifySysConfig, &params).is_ok());
    }

    #[test]
    fn pcm_actions_require_metrics() {
        let err = validate(Action::EnablePcm, &base_params()).unwrap_err();
        assert_eq!(err.to_string(), "mandatory parameter 'metrics' is missing");

        let params = base_params().with("metrics", vec!["LTM".to_string()]);
        assert!(validate(Action::EnablePcm, &params).is_ok());
    }

    #[test]
    fn nim_install_requires_network_parameters() {
        let params = base_params().with("name", "vios1").with("nim_ip", "10.0.0.5");
        let err = validate(Action::InstallViaNim, &params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mandatory parameters 'vios_ip,nim_subnetmask,nim_gateway' are missing"
        );
    }

    #[test]
    fn update_requires_exactly_one_vios_selector() {
        let params = base_params().with("repository", "disk").with("image_name", "img");
        let err = validate(Action::UpdateVios, &params).unwrap_err();
        assert_eq!(err.to_string(), "Missing VIOS details");

        let params = params.with("vios_id", "2").with("vios_name", "vios1");
        let err = validate(Action::UpdateVios, &params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameters 'vios_id' and 'vios_name' are mutually exclusive"
        );
    }

    #[test]
    fn upgrade_rejects_ibmwebsite_repository() {
        let params = base_params()
            .with("repository", "ibmwebsite")
            .with("vios_name", "vios1")
            .with("image_name", "img")
            .with("disks", vec!["hdisk1".to_string()]);
        let err = validate(Action::UpgradeVios, &params).unwrap_err();
        assert_eq!(err.to_string(), "Upgrade using 'ibmwebsite' is not supported");
    }

    #[test]
    fn sftp_repository_needs_one_secret() {
        let params = base_params()
            .with("repository", "sftp")
            .with("vios_name", "vios1")
            .with("user_id", "ftpuser")
            .with("host_name", "sftp01");
        let err = validate(Action::UpdateVios, &params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Either 'ssh_key_file' or 'password' is mandatory"
        );

        let ok = params.clone().with("password", "secret");
        assert!(validate(Action::UpdateVios, &ok).is_ok());

        let both = params
            .with("password", "secret")
            .with("ssh_key_file", "/keys/id_rsa");
        let err = validate(Action::UpdateVios, &both).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameters 'ssh_key_file' and 'password' are mutually exclusive"
        );
    }

    #[test]
    fn upgrade_over_nfs_requires_files_and_disks() {
        let params = base_params()
            .with("repository", "nfs")
            .with("vios_name", "vios1")
            .with("host_name", "nfs01")
            .with("mount_loc", "/exports/vios");
        let err = validate(Action::UpgradeVios, &params).unwrap_err();
        assert_eq!(
            err.to_string(),
            "mandatory parameters 'disks,files' are missing"
        );
    }

    #[test]
    fn save_requires_image_name_on_remote_repositories() {
        let params = base_params()
            .with("repository", "nfs")
            .with("vios_name", "vios1")
            .with("host_name", "nfs01")
            .with("mount_loc", "/exports/vios")
            .with("save", true);
        let err = validate(Action::UpdateVios, &params).unwrap_err();
        assert!(err.to_string().contains("'image_name' parameter is required"));
    }

    #[test]
    fn image_name_without_save_is_rejected_on_remote_repositories() {
        let params = base_params()
            .with("repository", "sftp")
            .with("vios_name", "vios1")
            .with("user_id", "ftpuser")
            .with("host_name", "sftp01")
            .with("password", "secret")
            .with("image_name", "img");
        let err = validate(Action::UpdateVios, &params).unwrap_err();
        assert!(err.to_string().contains("only required if 'save'"));
    }

    #[test]
    fn disk_repository_profile_accumulates_by_union() {
        let params = base_params()
            .with("repository", "disk")
            .with("vios_id", "2")
            .with("image_name", "img");
        assert!(validate(Action::UpdateVios, &params).is_ok());

        let profile = profile_for(Action::UpdateVios, &params);
        assert!(profile.mandatory().contains(&"repository"));
        assert!(profile.mandatory().contains(&"image_name"));
        assert!(profile.unsupported().contains(&"disks"));
        assert!(profile.unsupported().contains(&"mount_loc"));
    }
}
