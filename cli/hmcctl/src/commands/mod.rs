//! CLI surface: one subcommand group per module surface.

pub mod system;
pub mod update;
pub mod vios;

use std::collections::BTreeMap;

use clap::{Args, Parser, Subcommand};

use hmc_converge::{ConvergeResult, OperationResult, ParameterSet};

/// Lifecycle operations against a management console.
#[derive(Parser)]
#[command(name = "hmcctl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Managed-system operations
    System(system::SystemArgs),

    /// Service-partition operations
    Vios(vios::ViosArgs),

    /// VIOS software-level operations
    Update(update::UpdateArgs),
}

impl Cli {
    pub async fn run(self) -> ConvergeResult<OperationResult> {
        match self.command {
            Command::System(args) => args.run().await,
            Command::Vios(args) => args.run().await,
            Command::Update(args) => args.run().await,
        }
    }
}

/// Console address and credentials, shared by every subcommand.
#[derive(Args, Clone)]
pub struct ConnectionArgs {
    /// Console host name or IP address
    #[arg(long = "hmc", env = "HMC_HOST")]
    pub hmc_host: String,

    /// Console user name
    #[arg(long, env = "HMC_USERNAME")]
    pub username: String,

    /// Console password; omit for key-based access
    #[arg(long, env = "HMC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl ConnectionArgs {
    /// Seed a parameter set with the connection control fields.
    pub fn params(&self) -> ParameterSet {
        let mut auth = BTreeMap::new();
        auth.insert("username".to_string(), self.username.clone());
        if let Some(password) = &self.password {
            auth.insert("password".to_string(), password.clone());
        }
        ParameterSet::new()
            .with("hmc_host", self.hmc_host.as_str())
            .with("hmc_auth", auth)
    }
}
