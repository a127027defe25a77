use crate::command::ExternalCommand;
use cs_dns::{DnsError, RecordSelector};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// 89 days
pub const DEFAULT_MIN_INTERVAL_SECS: i64 = 89 * 24 * 3600;

/// Configuration for one rotation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Zone holding both host records (e.g. "example.com")
    pub base_domain: String,
    /// Record taken offline during renewal
    pub primary: RecordSelector,
    /// Record serving traffic while the primary is offline
    pub standby: RecordSelector,
    /// Where the last rotation timestamp is kept
    pub state_path: PathBuf,
    /// Minimum seconds between two rotations
    pub min_interval_secs: i64,
    /// Ignore the minimum interval
    pub force: bool,
    /// Root of the versioned certificate tree (certbot's `live` directory)
    pub cert_live_dir: PathBuf,
    /// Certificate directory name and CDN-facing domain override
    pub cert_domain: Option<String>,
    pub renew_command: ExternalCommand,
    pub reload_command: ExternalCommand,
    /// Skip every DNS step and only push the certificate to the CDN
    pub certificate_only: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            base_domain: String::new(),
            primary: RecordSelector::new("a"),
            standby: RecordSelector::new("b"),
            state_path: PathBuf::from("./state/state.json"),
            min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
            force: false,
            cert_live_dir: PathBuf::from("/etc/letsencrypt/live"),
            cert_domain: None,
            renew_command: ExternalCommand::new("certbot", ["renew"]),
            reload_command: ExternalCommand::new("/usr/local/nginx/sbin/nginx", ["-s", "reload"]),
            certificate_only: false,
        }
    }
}

impl RotationConfig {
    /// Explicit override, or `<primary>.<base_domain>`
    pub fn cdn_domain(&self) -> String {
        match self.cert_domain.as_deref().filter(|d| !d.is_empty()) {
            Some(domain) => domain.to_string(),
            None => self.fqdn(&self.primary),
        }
    }

    pub fn fqdn(&self, selector: &RecordSelector) -> String {
        format!("{}.{}", selector.host_prefix, self.base_domain)
    }

    /// Checks that must pass before any side effect
    pub fn validate(&self) -> RotationResult<()> {
        let has_cert_domain = self.cert_domain.as_deref().is_some_and(|d| !d.is_empty());
        if self.base_domain.is_empty() && !has_cert_domain {
            return Err(RotationError::Config(
                "either a base domain or a certificate domain is required".into(),
            ));
        }
        if self.certificate_only {
            return Ok(());
        }
        if self.base_domain.is_empty() {
            return Err(RotationError::Config(
                "a base domain is required for a DNS cutover".into(),
            ));
        }
        if self.primary.host_prefix.is_empty() || self.standby.host_prefix.is_empty() {
            return Err(RotationError::Config(
                "both primary and standby host records are required".into(),
            ));
        }
        if self.primary.host_prefix.eq_ignore_ascii_case(&self.standby.host_prefix)
            && self.primary.value == self.standby.value
            && self.primary.record_type == self.standby.record_type
        {
            return Err(RotationError::Config(
                "primary and standby selectors must differ".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum RotationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("DNS record lookup failed: {0}")]
    Lookup(#[source] DnsError),

    #[error("DNS provider error: {0}")]
    Dns(#[from] DnsError),

    #[error("Failed to {action} {fqdn}: {source}")]
    Toggle {
        action: &'static str,
        fqdn: String,
        #[source]
        source: DnsError,
    },

    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl RotationError {
    /// Process exit status for a fatal error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Lookup(_) => 3,
            _ => 1,
        }
    }
}

pub type RotationResult<T> = Result<T, RotationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdn_domain_inference() {
        let mut config = RotationConfig {
            base_domain: "example.com".into(),
            ..RotationConfig::default()
        };
        assert_eq!(config.cdn_domain(), "a.example.com");

        config.cert_domain = Some(String::new());
        assert_eq!(config.cdn_domain(), "a.example.com");

        config.cert_domain = Some("static.example.org".into());
        assert_eq!(config.cdn_domain(), "static.example.org");
    }

    #[test]
    fn test_validate() {
        let config = RotationConfig::default();
        assert!(matches!(config.validate(), Err(RotationError::Config(_))));

        let config = RotationConfig {
            cert_domain: Some("www.example.com".into()),
            certificate_only: true,
            ..RotationConfig::default()
        };
        assert!(config.validate().is_ok());

        // a full cutover needs the zone even when the cert domain is known
        let config = RotationConfig {
            cert_domain: Some("www.example.com".into()),
            ..RotationConfig::default()
        };
        assert!(matches!(config.validate(), Err(RotationError::Config(_))));

        let config = RotationConfig {
            base_domain: "example.com".into(),
            standby: RecordSelector::new("A"),
            ..RotationConfig::default()
        };
        assert!(matches!(config.validate(), Err(RotationError::Config(_))));

        let config = RotationConfig {
            base_domain: "example.com".into(),
            ..RotationConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RotationError::Config("x".into()).exit_code(), 2);
        let lookup = DnsError::RecordNotFound {
            selector: "rr=a".into(),
        };
        assert_eq!(RotationError::Lookup(lookup).exit_code(), 3);
        let api = DnsError::Decode("bad".into());
        assert_eq!(RotationError::Dns(api).exit_code(), 1);
    }
}
