//! Target-resource resolution.

use std::sync::OnceLock;

use regex::Regex;

use hmc_converge::{Action, ConvergeError, ConvergeResult};
use hmc_transport::{parse, CommandTransport};

use crate::cmd;

/// A service partition addressed by name or by partition id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViosRef {
    Name(String),
    Id(String),
}

impl ViosRef {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// `--filter` clause selecting this partition.
    pub fn filter(&self) -> String {
        match self {
            Self::Name(name) => format!("lpar_names={name}"),
            Self::Id(id) => format!("lpar_ids={id}"),
        }
    }

    /// Partition selector for commands addressing one partition.
    pub fn selector(&self) -> String {
        match self {
            Self::Name(name) => format!("-p \"{name}\""),
            Self::Id(id) => format!("--id {id}"),
        }
    }

    /// Display label for messages and result payloads.
    pub fn label(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Id(id) => id,
        }
    }
}

/// True when the identifier is a machine type/model/serial pattern
/// (`tttt-mmm*sssssss`) rather than a system name.
pub fn is_mtms(identifier: &str) -> bool {
    static MTMS: OnceLock<Regex> = OnceLock::new();
    MTMS.get_or_init(|| Regex::new(r"^[0-9A-Za-z]{4}-[0-9A-Za-z]{3}\*[0-9A-Za-z]+$").unwrap())
        .is_match(identifier)
}

/// Resolve a caller-supplied system identifier to the system name.
///
/// MTMS identifiers are looked up against the console's system inventory;
/// plain names pass through untouched. Resolution happens once per
/// invocation.
pub async fn resolve_system_name(
    transport: &dyn CommandTransport,
    action: Action,
    identifier: &str,
) -> ConvergeResult<String> {
    if !is_mtms(identifier) {
        return Ok(identifier.to_string());
    }

    let output = transport
        .execute(&cmd::list_system_mtms())
        .await
        .map_err(|e| ConvergeError::transport(action, e))?;

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let fields = parse::split_fields(line.trim());
        if let [name, type_model, serial] = fields.as_slice() {
            if format!("{type_model}*{serial}") == identifier {
                return Ok(name.clone());
            }
        }
    }

    Err(ConvergeError::TargetNotFound(
        "Given system is not present".to_string(),
    ))
}
