use clap::{ArgAction, Args, Parser, Subcommand};
use cs_cdn::TokenMode;
use cs_dns::{RecordSelector, RecordUpsert};
use cs_rotation::{ExternalCommand, RotationConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "certswap")]
#[command(about = "Blue-green DNS cutover around certificate renewal, with CDN certificate push", long_about = None)]
#[command(version)]
pub struct Cli {
    /// .env file to load before reading credentials
    #[arg(long, global = true, env = "CERTSWAP_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Per-request HTTP timeout in seconds, 0 disables it
    #[arg(long, global = true, default_value_t = 30)]
    pub http_timeout_secs: u64,

    #[command(flatten)]
    pub rotate: RotateArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_secs > 0).then(|| Duration::from_secs(self.http_timeout_secs))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or update a single DNS record
    Record(RecordArgs),
}

/// Flags for a rotation run (the default command)
#[derive(Args, Debug, Clone)]
pub struct RotateArgs {
    /// Base domain, e.g. example.com
    #[arg(long)]
    pub domain: Option<String>,

    /// Host record taken offline during renewal
    #[arg(long, default_value = "a")]
    pub rr_a: String,

    /// Host record serving traffic during renewal
    #[arg(long, default_value = "b")]
    pub rr_b: String,

    /// Record type filter, e.g. A
    #[arg(long = "type")]
    pub record_type: Option<String>,

    /// Value filter for the primary record
    #[arg(long)]
    pub value_a: Option<String>,

    /// Value filter for the standby record
    #[arg(long)]
    pub value_b: Option<String>,

    /// Rotation state file
    #[arg(long, default_value = "./state/state.json")]
    pub state: PathBuf,

    /// Ignore the minimum interval between rotations
    #[arg(long)]
    pub force: bool,

    #[arg(long, default_value_t = 89)]
    pub min_interval_days: u32,

    /// certbot live directory
    #[arg(long, default_value = "/etc/letsencrypt/live")]
    pub certbot_live: PathBuf,

    /// Certificate directory, also the CDN domain (defaults to the newest directory and rr-a.domain)
    #[arg(long)]
    pub cert_domain: Option<String>,

    /// Qiniu access key (falls back to QINIU_ACCESS_KEY)
    #[arg(long)]
    pub qiniu_ak: Option<String>,

    /// Qiniu secret key (falls back to QINIU_SECRET_KEY)
    #[arg(long)]
    pub qiniu_sk: Option<String>,

    /// nginx executable, reloaded after renewal
    #[arg(long, default_value = "/usr/local/nginx/sbin/nginx")]
    pub nginx: String,

    /// certbot executable
    #[arg(long, default_value = "certbot")]
    pub certbot: String,

    /// Only upload the certificate to Qiniu and bind it, no DNS changes
    #[arg(long)]
    pub qiniu_only: bool,

    /// Qiniu authorization scheme: auto|v1|v2
    #[arg(long, default_value = "auto")]
    pub qiniu_token: TokenMode,

    /// Prompt for settings before running
    #[arg(long)]
    pub interactive: bool,
}

impl RotateArgs {
    pub fn rotation_config(&self) -> RotationConfig {
        let record_type = self.record_type.clone();
        RotationConfig {
            base_domain: self.domain.clone().unwrap_or_default(),
            primary: RecordSelector::new(&self.rr_a)
                .with_type(record_type.clone())
                .with_value(self.value_a.clone()),
            standby: RecordSelector::new(&self.rr_b)
                .with_type(record_type)
                .with_value(self.value_b.clone()),
            state_path: self.state.clone(),
            min_interval_secs: i64::from(self.min_interval_days) * 86_400,
            force: self.force,
            cert_live_dir: self.certbot_live.clone(),
            cert_domain: self.cert_domain.clone().filter(|d| !d.is_empty()),
            renew_command: ExternalCommand::new(&self.certbot, ["renew"]),
            reload_command: ExternalCommand::new(&self.nginx, ["-s", "reload"]),
            certificate_only: self.qiniu_only,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Domain, e.g. example.com
    #[arg(long)]
    pub domain: Option<String>,

    /// Host record, e.g. @ or www
    #[arg(long, default_value = "@")]
    pub rr: String,

    /// Record type, e.g. A, CNAME, TXT, MX
    #[arg(long = "type", default_value = "A")]
    pub record_type: String,

    /// Record value, e.g. 1.2.3.4 or a target host
    #[arg(long)]
    pub value: Option<String>,

    #[arg(long, default_value_t = 600)]
    pub ttl: u32,

    /// MX priority, ignored for other types
    #[arg(long, default_value_t = 0)]
    pub priority: u32,

    /// Resolution line
    #[arg(long, default_value = "default")]
    pub line: String,

    /// Create the record when no match exists
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub create_if_missing: bool,
}

impl RecordArgs {
    /// `None` when a required field is missing or empty
    pub fn upsert(&self) -> Option<RecordUpsert> {
        let domain = self.domain.clone().filter(|d| !d.is_empty())?;
        let value = self.value.clone().filter(|v| !v.is_empty())?;
        if self.rr.is_empty() || self.record_type.is_empty() {
            return None;
        }
        Some(RecordUpsert {
            domain,
            rr: self.rr.clone(),
            record_type: self.record_type.clone(),
            value,
            ttl: Some(self.ttl),
            priority: (self.priority > 0).then_some(self.priority),
            line: Some(self.line.clone()).filter(|l| !l.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_defaults() {
        let cli = Cli::parse_from(["certswap", "--domain", "example.com"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.http_timeout(), Some(Duration::from_secs(30)));

        let config = cli.rotate.rotation_config();
        assert_eq!(config.base_domain, "example.com");
        assert_eq!(config.primary, RecordSelector::new("a"));
        assert_eq!(config.standby, RecordSelector::new("b"));
        assert_eq!(config.min_interval_secs, 7_689_600);
        assert_eq!(config.renew_command.to_string(), "certbot renew");
        assert_eq!(
            config.reload_command.to_string(),
            "/usr/local/nginx/sbin/nginx -s reload"
        );
        assert_eq!(config.cdn_domain(), "a.example.com");
        assert!(!config.certificate_only);
    }

    #[test]
    fn test_rotation_flags() {
        let cli = Cli::parse_from([
            "certswap",
            "--domain",
            "example.com",
            "--rr-a",
            "blue",
            "--rr-b",
            "green",
            "--type",
            "A",
            "--value-a",
            "1.1.1.1",
            "--qiniu-token",
            "v2",
            "--qiniu-only",
            "--cert-domain",
            "static.example.com",
            "--http-timeout-secs",
            "0",
        ]);
        assert_eq!(cli.rotate.qiniu_token, TokenMode::V2);
        assert_eq!(cli.http_timeout(), None);

        let config = cli.rotate.rotation_config();
        assert_eq!(config.primary.host_prefix, "blue");
        assert_eq!(config.primary.record_type.as_deref(), Some("A"));
        assert_eq!(config.primary.value.as_deref(), Some("1.1.1.1"));
        assert_eq!(config.standby.value, None);
        assert!(config.certificate_only);
        assert_eq!(config.cdn_domain(), "static.example.com");
    }

    #[test]
    fn test_bad_token_mode_rejected() {
        assert!(Cli::try_parse_from(["certswap", "--qiniu-token", "v3"]).is_err());
    }

    #[test]
    fn test_record_subcommand() {
        let cli = Cli::parse_from([
            "certswap",
            "record",
            "--domain",
            "example.com",
            "--rr",
            "www",
            "--value",
            "1.2.3.4",
            "--create-if-missing",
            "false",
        ]);
        let Some(Command::Record(args)) = cli.command else {
            panic!("expected record subcommand");
        };
        assert!(!args.create_if_missing);

        let upsert = args.upsert().unwrap();
        assert_eq!(upsert.rr, "www");
        assert_eq!(upsert.record_type, "A");
        assert_eq!(upsert.ttl, Some(600));
        assert_eq!(upsert.priority, None);
        assert_eq!(upsert.line.as_deref(), Some("default"));
    }

    #[test]
    fn test_record_missing_value() {
        let cli = Cli::parse_from(["certswap", "record", "--domain", "example.com"]);
        let Some(Command::Record(args)) = cli.command else {
            panic!("expected record subcommand");
        };
        assert!(args.create_if_missing);
        assert!(args.upsert().is_none());
    }
}
