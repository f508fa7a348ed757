//! Console command construction.
//!
//! Desired attributes stay in their canonical map form until this point;
//! list parameters are flattened to their comma-joined form here and
//! nowhere else.

use std::collections::BTreeMap;

use hmc_converge::params::join_list;
use hmc_converge::ParameterSet;

use crate::target::ViosRef;

/// Full attribute record of a managed system.
pub fn list_system(system: &str) -> String {
    format!("lssyscfg -r sys -m {system}")
}

pub fn list_system_state(system: &str) -> String {
    format!("lssyscfg -r sys -m {system} -F state")
}

pub fn list_system_names() -> String {
    "lssyscfg -r sys -F name".to_string()
}

pub fn list_system_mtms() -> String {
    "lssyscfg -r sys -F name,type_model,serial_num".to_string()
}

pub fn power_on(system: &str) -> String {
    format!("chsysstate -m {system} -r sys -o on")
}

pub fn power_off(system: &str) -> String {
    format!("chsysstate -m {system} -r sys -o off")
}

pub fn modify_syscfg(system: &str, attrs: &BTreeMap<String, String>) -> String {
    format!("chsyscfg -r sys -m {system} -i \"{}\"", join_attrs(attrs))
}

/// System-level memory settings.
pub fn list_mem_sys(system: &str) -> String {
    format!("lshwres -r mem -m {system} --level sys")
}

pub fn modify_mem_sys(system: &str, attrs: &BTreeMap<String, String>) -> String {
    format!("chhwres -r mem -m {system} -o s -a \"{}\"", join_attrs(attrs))
}

pub fn list_partitions(system: &str) -> String {
    format!("lssyscfg -r lpar -m {system} -F name,state,lpar_id")
}

pub fn partition_config(system: &str, name: &str) -> String {
    format!("lssyscfg -r lpar -m {system} --filter lpar_names={name}")
}

pub fn profile_config(system: &str, name: &str, profile: &str) -> String {
    format!("lssyscfg -r prof -m {system} --filter \"lpar_names={name},profile_names={profile}\"")
}

pub fn partition_state(system: &str, vios: &ViosRef) -> String {
    format!("lssyscfg -r lpar -m {system} --filter {} -F state", vios.filter())
}

pub fn partition_rmc_state(system: &str, vios: &ViosRef) -> String {
    format!(
        "lssyscfg -r lpar -m {system} --filter {} -F rmc_state",
        vios.filter()
    )
}

pub fn partition_ref_code(system: &str, vios: &ViosRef) -> String {
    format!(
        "lsrefcode -r lpar -m {system} --filter {} -F refcode",
        vios.filter()
    )
}

/// Create a service partition; caller settings are appended to the
/// defaults, so an explicit profile name wins over `default_profile`.
pub fn create_vios(system: &str, name: &str, settings: Option<&BTreeMap<String, String>>) -> String {
    let mut attrs = format!("name={name},lpar_env=vioserver,profile_name=default_profile");
    if let Some(settings) = settings {
        for (key, value) in settings {
            attrs.push_str(&format!(",{key}={value}"));
        }
    }
    format!("mksyscfg -r lpar -m {system} -i \"{attrs}\"")
}

/// Probe the I/O adapters a network install could boot from.
pub fn netboot_probe(
    server: &str,
    gateway: &str,
    client: &str,
    mask: &str,
    name: &str,
    profile: &str,
    system: &str,
) -> String {
    format!(
        "lpar_netboot -M -A -n -t ent -D -s auto -d auto -S {server} -G {gateway} -C {client} -K {mask} \"{name}\" \"{profile}\" \"{system}\""
    )
}

#[allow(clippy::too_many_arguments)]
pub fn install_via_nim(
    system: &str,
    name: &str,
    profile: &str,
    location_code: &str,
    nim_ip: &str,
    gateway: &str,
    vios_ip: &str,
    mask: &str,
    vlan_id: &str,
    vlan_priority: &str,
) -> String {
    format!(
        "installios -s {system} -p \"{name}\" -r \"{profile}\" -i {vios_ip} -S {mask} -g {gateway} -d {nim_ip} -l {location_code} -V {vlan_id} -y {vlan_priority}"
    )
}

#[allow(clippy::too_many_arguments)]
pub fn install_via_disk(
    system: &str,
    name: &str,
    profile: &str,
    image_dir: &str,
    iso: &str,
    vios_ip: &str,
    gateway: &str,
    mask: &str,
    mac: &str,
    label: Option<&str>,
) -> String {
    let mut command = format!(
        "installios -s {system} -p \"{name}\" -r \"{profile}\" -i {vios_ip} -S {mask} -g {gateway} -d /extra/viosimages/{image_dir}/{iso} -m {mac}"
    );
    if let Some(label) = label {
        command.push_str(&format!(" -L \"{label}\""));
    }
    command
}

/// Run a command inside a service partition over its management channel.
pub fn vios_run(system: &str, vios: &ViosRef, command: &str) -> String {
    format!("viosvrcmd -m {system} {} -c \"{command}\"", vios.selector())
}

/// Build the update or upgrade command from validated parameters.
pub fn update_vios(upgrade: bool, system: &str, vios: &ViosRef, params: &ParameterSet) -> String {
    let mut command = vec![
        if upgrade { "upgvios".to_string() } else { "updvios".to_string() },
        format!("-m {system}"),
        vios.selector(),
    ];
    if let Some(repository) = params.str_value("repository") {
        command.push(format!("-r {repository}"));
    }
    if let Some(host) = params.str_value("host_name") {
        command.push(format!("-h {host}"));
    }
    if let Some(user) = params.str_value("user_id") {
        command.push(format!("-u {user}"));
    }
    if let Some(password) = params.str_value("password") {
        command.push(format!("--passwd {password}"));
    }
    if let Some(key_file) = params.str_value("ssh_key_file") {
        command.push(format!("-k {key_file}"));
    }
    if let Some(mount) = params.str_value("mount_loc") {
        command.push(format!("-l {mount}"));
    }
    if let Some(option) = params.str_value("option") {
        // The NFS mount option travels wrapped as "ver=N".
        command.push(format!("-o \"ver={option}\""));
    }
    if let Some(directory) = params.str_value("directory") {
        command.push(format!("-d {directory}"));
    }
    if let Some(files) = params.list_value("files") {
        command.push(format!("-f {}", join_list(files)));
    }
    if let Some(image) = params.str_value("image_name") {
        command.push(format!("-i {image}"));
    }
    if let Some(disks) = params.list_value("disks") {
        command.push(format!("--disks \"{}\"", join_list(disks)));
    }
    if params.bool_value("save") == Some(true) {
        command.push("--save".to_string());
    }
    if params.bool_value("restart") == Some(true) {
        command.push("--restart".to_string());
    }
    command.join(" ")
}

fn join_attrs(attrs: &BTreeMap<String, String>) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}
