//! `hmcctl vios` - service-partition operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::{Args, Subcommand};

use hmc_converge::{
    Action, ConvergeError, ConvergeResult, OperationResult, Poller, SystemClock,
};
use hmc_ops::vios;
use hmc_transport::SshTransport;

use super::system::rest_client;
use super::ConnectionArgs;

#[derive(Args)]
pub struct ViosArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Managed system name or MTMS
    #[arg(long = "system")]
    system_name: String,

    #[command(subcommand)]
    action: ViosAction,
}

#[derive(Subcommand)]
enum ViosAction {
    /// Create a service partition
    Create {
        /// Partition name
        #[arg(long)]
        name: String,

        /// Partition attribute, repeatable: --set attr=value
        #[arg(long = "set", value_name = "ATTR=VALUE")]
        settings: Vec<String>,
    },

    /// Install the partition OS from an install server or a disk image
    Install {
        /// Partition name (network install)
        #[arg(long)]
        name: Option<String>,

        /// Install server IP address (network install)
        #[arg(long)]
        nim_ip: Option<String>,

        /// Partition gateway IP (network install)
        #[arg(long)]
        nim_gateway: Option<String>,

        /// Subnet mask (network install)
        #[arg(long)]
        nim_subnetmask: Option<String>,

        /// IP address to configure on the partition
        #[arg(long)]
        vios_ip: Option<String>,

        /// Partition gateway IP (disk install)
        #[arg(long)]
        vios_gateway: Option<String>,

        /// Subnet mask (disk install)
        #[arg(long)]
        vios_subnetmask: Option<String>,

        /// Partition name (disk install)
        #[arg(long)]
        vios_name: Option<String>,

        /// Installation ISO on the console (disk install)
        #[arg(long)]
        vios_iso: Option<String>,

        /// Image directory on the console (disk install)
        #[arg(long)]
        image_dir: Option<String>,

        /// Profile to install with
        #[arg(long)]
        prof_name: Option<String>,

        /// Network adapter location code; auto-picked when omitted
        #[arg(long)]
        location_code: Option<String>,

        /// Client MAC address; auto-picked when omitted (disk install)
        #[arg(long)]
        network_macaddr: Option<String>,

        /// Label for the installed partition (disk install)
        #[arg(long)]
        label: Option<String>,

        /// VLAN id for the install traffic (0-4094)
        #[arg(long)]
        nim_vlan_id: Option<String>,

        /// VLAN priority for the install traffic (0-7)
        #[arg(long)]
        nim_vlan_priority: Option<String>,

        /// Minutes to wait for the partition to boot fully (min 10, default 60)
        #[arg(long)]
        timeout: Option<i64>,
    },

    /// Accept the OS license after a fresh installation
    AcceptLicense {
        /// Partition name
        #[arg(long)]
        name: String,
    },

    /// Fetch the partition's details
    Facts {
        /// Partition name
        #[arg(long)]
        name: String,

        /// Include the virtual optical media inventory
        #[arg(long)]
        virtual_optical_media: bool,

        /// Include unassigned physical volumes
        #[arg(long)]
        free_pvs: bool,
    },
}

impl ViosArgs {
    pub async fn run(self) -> ConvergeResult<OperationResult> {
        let mut params = self
            .connection
            .params()
            .with("system_name", self.system_name.as_str());

        let transport = SshTransport::new(
            &self.connection.hmc_host,
            &self.connection.username,
            self.connection.password.clone(),
        );
        let poller = Poller::new(Arc::new(SystemClock));

        match self.action {
            ViosAction::Create { name, settings } => {
                params.set("name", name);
                if !settings.is_empty() {
                    params.set("settings", parse_settings(&settings)?);
                }
                vios::create(&transport, &params).await
            }
            ViosAction::Install {
                name,
                nim_ip,
                nim_gateway,
                nim_subnetmask,
                vios_ip,
                vios_gateway,
                vios_subnetmask,
                vios_name,
                vios_iso,
                image_dir,
                prof_name,
                location_code,
                network_macaddr,
                label,
                nim_vlan_id,
                nim_vlan_priority,
                timeout,
            } => {
                params.set_opt("name", name);
                params.set_opt("nim_ip", nim_ip);
                params.set_opt("nim_gateway", nim_gateway);
                params.set_opt("nim_subnetmask", nim_subnetmask);
                params.set_opt("vios_ip", vios_ip);
                params.set_opt("vios_gateway", vios_gateway);
                params.set_opt("vios_subnetmask", vios_subnetmask);
                params.set_opt("vios_name", vios_name);
                params.set_opt("vios_iso", vios_iso);
                params.set_opt("image_dir", image_dir);
                params.set_opt("prof_name", prof_name);
                params.set_opt("location_code", location_code);
                params.set_opt("network_macaddr", network_macaddr);
                params.set_opt("label", label);
                params.set_opt("nim_vlan_id", nim_vlan_id);
                params.set_opt("nim_vlan_priority", nim_vlan_priority);
                params.set_opt("timeout", timeout);
                vios::install(&transport, &poller, &params).await
            }
            ViosAction::AcceptLicense { name } => {
                params.set("name", name);
                vios::accept_license(&transport, &params).await
            }
            ViosAction::Facts {
                name,
                virtual_optical_media,
                free_pvs,
            } => {
                params.set("name", name);
                if virtual_optical_media {
                    params.set("virtual_optical_media", true);
                }
                if free_pvs {
                    params.set("free_pvs", true);
                }
                let rest = rest_client(&self.connection, Action::Facts)?;
                vios::facts(&transport, &rest, &params).await
            }
        }
    }
}

fn parse_settings(pairs: &[String]) -> ConvergeResult<BTreeMap<String, String>> {
    let mut settings = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ConvergeError::Constraint(format!(
                "invalid setting '{pair}', expected ATTR=VALUE"
            )));
        };
        settings.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_pairs_parse_into_a_map() {
        let pairs = vec!["max_mem=8192".to_string(), "profile_name=prod".to_string()];
        let settings = parse_settings(&pairs).unwrap();
        assert_eq!(settings["max_mem"], "8192");
        assert_eq!(settings["profile_name"], "prod");

        assert!(parse_settings(&["broken".to_string()]).is_err());
    }
}
