//! The closed set of lifecycle actions.

/// Everything this engine can be asked to do.
///
/// Each action carries a fixed constraint profile (see
/// [`crate::profile`]); dispatch over this enum is exhaustive by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    PowerOn,
    PowerOff,
    ModifySysConfig,
    ModifyHwRes,
    EnablePcm,
    DisablePcm,
    CreateVios,
    InstallViaNim,
    InstallViaDisk,
    AcceptLicense,
    UpdateVios,
    UpgradeVios,
    Facts,
    PcmFacts,
}

impl Action {
    /// Caller-facing operation name, used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerOn => "poweron",
            Self::PowerOff => "poweroff",
            Self::ModifySysConfig => "modify_syscfg",
            Self::ModifyHwRes => "modify_hwres",
            Self::EnablePcm => "enable_pcm",
            Self::DisablePcm => "disable_pcm",
            Self::CreateVios => "create_vios",
            Self::InstallViaNim | Self::InstallViaDisk => "install",
            Self::AcceptLicense => "accept_license",
            Self::UpdateVios => "update",
            Self::UpgradeVios => "upgrade",
            Self::Facts => "facts",
            Self::PcmFacts => "pcm_facts",
        }
    }

    /// Query actions never mutate the target.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Facts | Self::PcmFacts)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_are_flagged() {
        assert!(Action::Facts.is_query());
        assert!(Action::PcmFacts.is_query());
        assert!(!Action::PowerOn.is_query());
        assert!(!Action::UpdateVios.is_query());
    }

    #[test]
    fn install_variants_share_a_name() {
        assert_eq!(Action::InstallViaNim.name(), "install");
        assert_eq!(Action::InstallViaDisk.name(), "install");
    }
}
