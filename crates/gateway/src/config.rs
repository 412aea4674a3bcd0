//! Gateway-wide configuration: one place to build every collaborator's
//! `*Config` with the same compile-time-default-plus-environment-override
//! convention the rest of the workspace uses.

use gateway_core::env::env_get_str;
use gateway_runtime::RuntimeConfig;
use isup::IsupConfig;
use lapd::LapdConfig;
use nfas::NfasConfig;
use q931::CallControlConfig;
use rtp::RtpConfig;
use xlat::Variant;

mod defaults {
    pub const LOCAL_RTP_IP: &str = "0.0.0.0";
}

fn parse_variant(value: &str) -> Variant {
    match value.to_ascii_lowercase().as_str() {
        "ansi" => Variant::Ansi,
        "etsi" => Variant::Etsi,
        _ => Variant::Itu,
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub lapd: LapdConfig,
    pub call_control: CallControlConfig,
    pub isup: IsupConfig,
    pub nfas: NfasConfig,
    pub rtp: RtpConfig,
    pub runtime: RuntimeConfig,
    /// The variant every translation context on this gateway starts from;
    /// an operator override via [`xlat::tables::RuleSetStore`] still
    /// applies on top of whichever variant this selects.
    pub variant: Variant,
    /// Advertised connection address for this gateway's SDP offers.
    pub local_rtp_ip: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl GatewayConfig {
    /// `GW_VARIANT` (`itu`|`ansi`|`etsi`), `GW_LOCAL_RTP_IP`, plus every
    /// environment variable each collaborator config documents.
    pub fn from_env() -> Self {
        Self {
            lapd: LapdConfig::from_env(),
            call_control: CallControlConfig::from_env(),
            isup: IsupConfig::from_env(),
            nfas: NfasConfig::from_env(),
            rtp: RtpConfig::from_env(),
            runtime: RuntimeConfig::from_env(),
            variant: parse_variant(&env_get_str("GW_VARIANT", "itu")),
            local_rtp_ip: env_get_str("GW_LOCAL_RTP_IP", defaults::LOCAL_RTP_IP),
        }
    }

    /// Explicit defaults, ignoring the environment. Used by tests that
    /// need deterministic configuration regardless of the process
    /// environment.
    pub fn new() -> Self {
        Self {
            lapd: LapdConfig::new(),
            call_control: CallControlConfig::new(),
            isup: IsupConfig::new(),
            nfas: NfasConfig::new(),
            rtp: RtpConfig::new(),
            runtime: RuntimeConfig::new(),
            variant: Variant::Itu,
            local_rtp_ip: defaults::LOCAL_RTP_IP.to_string(),
        }
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn local_rtp_ip(mut self, ip: impl Into<String>) -> Self {
        self.local_rtp_ip = ip.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_itu() {
        let cfg = GatewayConfig::new();
        assert_eq!(cfg.variant, Variant::Itu);
        assert_eq!(cfg.local_rtp_ip, "0.0.0.0");
    }

    #[test]
    fn builder_overrides_variant_and_ip() {
        let cfg = GatewayConfig::new().variant(Variant::Ansi).local_rtp_ip("10.0.0.5");
        assert_eq!(cfg.variant, Variant::Ansi);
        assert_eq!(cfg.local_rtp_ip, "10.0.0.5");
    }
}
