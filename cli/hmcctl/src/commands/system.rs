//! `hmcctl system` - managed-system operations.

use std::sync::Arc;

use clap::{Args, Subcommand};

use hmc_converge::{Action, ConvergeError, ConvergeResult, OperationResult, Poller, SystemClock};
use hmc_ops::system;
use hmc_transport::{HmcRestClient, SshTransport};

use super::ConnectionArgs;

#[derive(Args)]
pub struct SystemArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Managed system name or MTMS (tttt-mmm*sssssss)
    #[arg(long = "system")]
    system_name: String,

    #[command(subcommand)]
    action: SystemAction,
}

#[derive(Subcommand)]
enum SystemAction {
    /// Power the managed system on
    PowerOn,

    /// Power the managed system off
    PowerOff,

    /// Reconcile general system configuration
    ModifySyscfg {
        /// New system name
        #[arg(long)]
        new_name: Option<String>,

        /// Power the system off after all partitions are shut down (1) or not (0)
        #[arg(long)]
        power_off_policy: Option<i64>,

        /// Partition start policy for the next restart
        #[arg(long)]
        power_on_lpar_start_policy: Option<String>,
    },

    /// Reconcile system-level hardware resources
    ModifyHwres {
        /// Number of huge-page memory pages
        #[arg(long)]
        requested_num_sys_huge_pages: Option<i64>,

        /// Memory mirroring mode (none, sys_firmware_only)
        #[arg(long)]
        mem_mirroring_mode: Option<String>,

        /// Memory region size in MB, or auto
        #[arg(long)]
        pend_mem_region_size: Option<String>,
    },

    /// Enable PCM metric groups
    EnablePcm {
        /// Metric groups: LTM, STM, AM, CLTM, EM
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
    },

    /// Disable PCM metric groups
    DisablePcm {
        /// Metric groups: LTM, STM, AM, CLTM, EM
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
    },

    /// Fetch the system summary
    Facts,

    /// Fetch the PCM preference document
    PcmFacts,
}

impl SystemArgs {
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
            SystemAction::PowerOn => system::power_on(&transport, &poller, &params).await,
            SystemAction::PowerOff => system::power_off(&transport, &poller, &params).await,
            SystemAction::ModifySyscfg {
                new_name,
                power_off_policy,
                power_on_lpar_start_policy,
            } => {
                params.set_opt("new_name", new_name);
                params.set_opt("power_off_policy", power_off_policy);
                params.set_opt("power_on_lpar_start_policy", power_on_lpar_start_policy);
                system::modify_syscfg(&transport, &params).await
            }
            SystemAction::ModifyHwres {
                requested_num_sys_huge_pages,
                mem_mirroring_mode,
                pend_mem_region_size,
            } => {
                params.set_opt("requested_num_sys_huge_pages", requested_num_sys_huge_pages);
                params.set_opt("mem_mirroring_mode", mem_mirroring_mode);
                params.set_opt("pend_mem_region_size", pend_mem_region_size);
                system::modify_hwres(&transport, &params).await
            }
            SystemAction::EnablePcm { metrics } => {
                params.set("metrics", metrics);
                let rest = rest_client(&self.connection, Action::EnablePcm)?;
                system::update_pcm(&transport, &rest, &params, false).await
            }
            SystemAction::DisablePcm { metrics } => {
                params.set("metrics", metrics);
                let rest = rest_client(&self.connection, Action::DisablePcm)?;
                system::update_pcm(&transport, &rest, &params, true).await
            }
            SystemAction::Facts => {
                let rest = rest_client(&self.connection, Action::Facts)?;
                system::facts(&transport, &rest, &params).await
            }
            SystemAction::PcmFacts => {
                let rest = rest_client(&self.connection, Action::PcmFacts)?;
                system::pcm_facts(&transport, &rest, &params).await
            }
        }
    }
}

pub(super) fn rest_client(
    connection: &ConnectionArgs,
    action: Action,
) -> ConvergeResult<HmcRestClient> {
    HmcRestClient::new(
        &connection.hmc_host,
        &connection.username,
        connection.password.clone().unwrap_or_default(),
    )
    .map_err(|e| ConvergeError::transport(action, e))
}
