//! `hmcctl update` - VIOS software-level operations.

use std::sync::Arc;

use clap::{Args, Subcommand};

use hmc_converge::{ConvergeResult, OperationResult, ParameterSet, Poller, SystemClock};
use hmc_ops::update;
use hmc_transport::SshTransport;

use super::ConnectionArgs;

#[derive(Args)]
pub struct UpdateArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Managed system name or MTMS
    #[arg(long = "system")]
    system_name: String,

    /// VIOS name; mutually exclusive with --vios-id
    #[arg(long)]
    vios_name: Option<String>,

    /// VIOS partition id; mutually exclusive with --vios-name
    #[arg(long)]
    vios_id: Option<String>,

    #[command(subcommand)]
    action: UpdateAction,
}

#[derive(Subcommand)]
enum UpdateAction {
    /// Report the current VIOS version
    Facts,

    /// Update the VIOS with an installation image
    Run(RepositoryArgs),

    /// Upgrade the VIOS with upgrade files
    Upgrade {
        #[command(flatten)]
        repository: RepositoryArgs,

        /// Free disks to use for the upgrade
        #[arg(long, value_delimiter = ',')]
        disks: Vec<String>,
    },
}

/// Image repository selection and access parameters.
#[derive(Args)]
struct RepositoryArgs {
    /// Repository type: nfs, sftp, disk, ibmwebsite
    #[arg(long)]
    repository: String,

    /// Image name on the console disk or the fix-central website
    #[arg(long)]
    image_name: Option<String>,

    /// Files needed for the update/upgrade (remote repositories)
    #[arg(long, value_delimiter = ',')]
    files: Vec<String>,

    /// Remote server host name or IP
    #[arg(long)]
    host_name: Option<String>,

    /// Remote server user id (sftp)
    #[arg(long)]
    user_id: Option<String>,

    /// Remote server password (sftp)
    #[arg(long = "remote-password")]
    password: Option<String>,

    /// SSH private key file (sftp)
    #[arg(long)]
    ssh_key_file: Option<String>,

    /// Mount location on the NFS server
    #[arg(long)]
    mount_loc: Option<String>,

    /// NFS version to mount with: 3 or 4
    #[arg(long = "option")]
    nfs_option: Option<String>,

    /// Directory on the remote server holding the image
    #[arg(long)]
    directory: Option<String>,

    /// Restart the VIOS after the update if required
    #[arg(long)]
    restart: bool,

    /// Save the image to the console's disk
    #[arg(long)]
    save: bool,
}

impl RepositoryArgs {
    fn apply(self, params: &mut ParameterSet) {
        params.set("repository", self.repository);
        params.set_opt("image_name", self.image_name);
        if !self.files.is_empty() {
            params.set("files", self.files);
        }
        params.set_opt("host_name", self.host_name);
        params.set_opt("user_id", self.user_id);
        params.set_opt("password", self.password);
        params.set_opt("ssh_key_file", self.ssh_key_file);
        params.set_opt("mount_loc", self.mount_loc);
        params.set_opt("option", self.nfs_option);
        params.set_opt("directory", self.directory);
        // Flags only count as supplied when actually set; the save and
        // image_name coupling check keys on presence.
        if self.restart {
            params.set("restart", true);
        }
        if self.save {
            params.set("save", true);
        }
    }
}

impl UpdateArgs {
    pub async fn run(self) -> ConvergeResult<OperationResult> {
        let mut params = self
            .connection
            .params()
            .with("system_name", self.system_name.as_str());
        params.set_opt("vios_name", self.vios_name);
        params.set_opt("vios_id", self.vios_id);

        let transport = SshTransport::new(
            &self.connection.hmc_host,
            &self.connection.username,
            self.connection.password.clone(),
        );
        let poller = Poller::new(Arc::new(SystemClock));

        match self.action {
            UpdateAction::Facts => update::facts(&transport, &params).await,
            UpdateAction::Run(repository) => {
                repository.apply(&mut params);
                update::update(&transport, &poller, &params).await
            }
            UpdateAction::Upgrade { repository, disks } => {
                repository.apply(&mut params);
                if !disks.is_empty() {
                    params.set("disks", disks);
                }
                update::upgrade(&transport, &poller, &params).await
            }
        }
    }
}
