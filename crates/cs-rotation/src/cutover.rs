use crate::command::{CommandRunner, ExternalCommand};
use crate::locator::locate;
use crate::state::{StateStore, is_eligible};
use crate::types::{RotationConfig, RotationError, RotationResult};
use chrono::{DateTime, Local, Utc};
use cs_cdn::{CdnBinding, CertificateUploader};
use cs_dns::{DnsProvider, RecordSelector};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Rotation phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    PrimaryDisabling,
    StandbyEnabling,
    Renewing,
    CertificateStaging,
    StandbyDisabling,
    PrimaryRestoring,
    /// Certificate stage alone, no DNS changes
    CertificateOnly,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::PrimaryDisabling => "primary-disabling",
            Self::StandbyEnabling => "standby-enabling",
            Self::Renewing => "renewing",
            Self::CertificateStaging => "certificate-staging",
            Self::StandbyDisabling => "standby-disabling",
            Self::PrimaryRestoring => "primary-restoring",
            Self::CertificateOnly => "certificate-only",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    Skipped(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One action taken during a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub phase: Phase,
    pub action: &'static str,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The minimum interval has not elapsed, nothing was touched
    NotDue { days_since_last: i64 },
    #[default]
    Completed,
}

/// What a rotation run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RotationReport {
    pub outcome: RunOutcome,
    /// Phases entered, in order
    pub phases: Vec<Phase>,
    pub steps: Vec<StepRecord>,
    pub binding: Option<CdnBinding>,
}

impl RotationReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.outcome.is_failure())
    }

    pub fn outcome_of(&self, action: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.action == action)
            .map(|s| &s.outcome)
    }

    fn record(&mut self, phase: Phase, action: &'static str, outcome: StepOutcome) {
        self.steps.push(StepRecord {
            phase,
            action,
            outcome,
        });
    }
}

/// Record ids resolved during `Idle`
#[derive(Debug, Default)]
struct Cutover {
    primary_id: String,
    standby_id: String,
}

/// Drives one rotation through its phases.
///
/// Only `Idle`, `PrimaryDisabling` and `StandbyEnabling` may abort a run.
/// Every later phase records its outcome and moves on, so once the standby is
/// serving traffic the primary is always re-enabled before the run ends.
pub struct CutoverController {
    config: RotationConfig,
    dns: Option<Arc<dyn DnsProvider>>,
    cdn: Option<Arc<dyn CertificateUploader>>,
    runner: Arc<dyn CommandRunner>,
    clock: Clock,
}

impl CutoverController {
    pub fn new(config: RotationConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            dns: None,
            cdn: None,
            runner,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_dns(mut self, dns: Arc<dyn DnsProvider>) -> Self {
        self.dns = Some(dns);
        self
    }

    /// Without an uploader the certificate stage is skipped
    pub fn with_cdn(mut self, cdn: Option<Arc<dyn CertificateUploader>>) -> Self {
        self.cdn = cdn;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }

    pub async fn run(&self) -> RotationResult<RotationReport> {
        self.config.validate()?;
        if !self.config.certificate_only && self.dns.is_none() {
            return Err(RotationError::Config(
                "a DNS provider is required for a DNS cutover".into(),
            ));
        }

        let mut report = RotationReport::default();
        let mut cutover = Cutover::default();
        let mut phase = Phase::Idle;

        while phase != Phase::Done {
            report.phases.push(phase);
            phase = self.advance(phase, &mut cutover, &mut report).await?;
        }
        report.phases.push(Phase::Done);

        Ok(report)
    }

    async fn advance(
        &self,
        phase: Phase,
        cutover: &mut Cutover,
        report: &mut RotationReport,
    ) -> RotationResult<Phase> {
        match phase {
            Phase::Idle => self.begin(cutover, report).await,
            Phase::PrimaryDisabling => {
                self.toggle_fatal(&self.config.primary, &cutover.primary_id, false)
                    .await?;
                report.record(phase, "disable-primary", StepOutcome::Succeeded);
                Ok(Phase::StandbyEnabling)
            }
            Phase::StandbyEnabling => {
                self.toggle_fatal(&self.config.standby, &cutover.standby_id, true)
                    .await?;
                report.record(phase, "enable-standby", StepOutcome::Succeeded);
                Ok(Phase::Renewing)
            }
            // nothing below may return an error
            Phase::Renewing => {
                self.renew(report).await;
                Ok(Phase::CertificateStaging)
            }
            Phase::CertificateStaging => {
                self.stage_certificate(phase, report).await;
                Ok(Phase::StandbyDisabling)
            }
            Phase::StandbyDisabling => {
                let outcome = self
                    .toggle(&self.config.standby, &cutover.standby_id, false)
                    .await;
                report.record(phase, "disable-standby", outcome);
                Ok(Phase::PrimaryRestoring)
            }
            Phase::PrimaryRestoring => {
                let outcome = self
                    .toggle(&self.config.primary, &cutover.primary_id, true)
                    .await;
                report.record(phase, "enable-primary", outcome);
                Ok(Phase::Done)
            }
            Phase::CertificateOnly => {
                self.stage_certificate(phase, report).await;
                Ok(Phase::Done)
            }
            Phase::Done => Ok(Phase::Done),
        }
    }

    /// Gate check and record lookup
    async fn begin(&self, cutover: &mut Cutover, report: &mut RotationReport) -> RotationResult<Phase> {
        if self.config.certificate_only {
            info!(cdn_domain = %self.config.cdn_domain(), "Certificate-only mode, skipping DNS cutover");
            return Ok(Phase::CertificateOnly);
        }

        let store = StateStore::new(&self.config.state_path);
        let state = store.load();
        let now = (self.clock)().timestamp();
        if !is_eligible(&state, now, self.config.min_interval_secs, self.config.force) {
            let days = state.days_since(now);
            info!(
                days_since_last = days,
                state = %store.path().display(),
                "Last rotation {} days ago, not due yet",
                days
            );
            report.outcome = RunOutcome::NotDue {
                days_since_last: days,
            };
            return Ok(Phase::Done);
        }
        if self.config.force {
            info!("Forced rotation, ignoring minimum interval");
        }

        let Some(dns) = &self.dns else {
            return Err(RotationError::Config("no DNS provider configured".into()));
        };
        let records = dns.list_records(&self.config.base_domain).await?;
        info!(
            provider = dns.name(),
            domain = %self.config.base_domain,
            count = records.len(),
            "Listed host records"
        );

        let primary = self
            .config
            .primary
            .resolve(&records)
            .map_err(RotationError::Lookup)?;
        let standby = self
            .config
            .standby
            .resolve(&records)
            .map_err(RotationError::Lookup)?;
        info!(
            primary = %primary.id,
            primary_value = %primary.value,
            standby = %standby.id,
            standby_value = %standby.value,
            "Resolved cutover records"
        );

        cutover.primary_id = primary.id.clone();
        cutover.standby_id = standby.id.clone();
        Ok(Phase::PrimaryDisabling)
    }

    async fn toggle_fatal(
        &self,
        selector: &RecordSelector,
        record_id: &str,
        enabled: bool,
    ) -> RotationResult<()> {
        let fqdn = self.config.fqdn(selector);
        let dns = self
            .dns
            .as_ref()
            .ok_or_else(|| RotationError::Config("no DNS provider configured".into()))?;

        dns.set_record_enabled(record_id, enabled)
            .await
            .map_err(|source| RotationError::Toggle {
                action: if enabled { "enable" } else { "disable" },
                fqdn: fqdn.clone(),
                source,
            })?;
        info!(record = %fqdn, id = %record_id, enabled, "Record status changed");
        Ok(())
    }

    async fn toggle(&self, selector: &RecordSelector, record_id: &str, enabled: bool) -> StepOutcome {
        match self.toggle_fatal(selector, record_id, enabled).await {
            Ok(()) => StepOutcome::Succeeded,
            Err(e) => {
                error!("{}", e);
                StepOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run_command(&self, command: &ExternalCommand) -> StepOutcome {
        info!(command = %command, "Running");
        match self.runner.run(command).await {
            Ok(out) if out.success => StepOutcome::Succeeded,
            Ok(out) => {
                let status = out
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".into());
                warn!(command = %command, status = %status, "Command failed, continuing");
                StepOutcome::Failed(format!("{} exited with {}", command.program, status))
            }
            Err(e) => {
                warn!(command = %command, "Command could not run, continuing: {}", e);
                StepOutcome::Failed(format!("{}: {}", command.program, e))
            }
        }
    }

    async fn renew(&self, report: &mut RotationReport) {
        let outcome = self.run_command(&self.config.renew_command).await;
        report.record(Phase::Renewing, "renew", outcome);

        let outcome = self.run_command(&self.config.reload_command).await;
        report.record(Phase::Renewing, "reload", outcome);

        let now = (self.clock)().timestamp();
        let outcome = match StateStore::new(&self.config.state_path).record_rotation(now) {
            Ok(_) => StepOutcome::Succeeded,
            Err(e) => {
                warn!(state = %self.config.state_path.display(), "Failed to persist rotation state: {}", e);
                StepOutcome::Failed(e.to_string())
            }
        };
        report.record(Phase::Renewing, "persist-state", outcome);
    }

    /// Locate, upload, bind. A failed step skips the rest.
    async fn stage_certificate(&self, phase: Phase, report: &mut RotationReport) {
        const SKIPPED_AFTER_FAILURE: &str = "previous certificate step failed";
        let cdn_domain = self.config.cdn_domain();
        let preferred = self.config.cert_domain.as_deref().unwrap_or_default();

        let pair = match locate(&self.config.cert_live_dir, preferred) {
            Ok(pair) => pair,
            Err(e) => {
                error!(live_dir = %self.config.cert_live_dir.display(), "Failed to locate certificate: {}", e);
                report.record(phase, "locate", StepOutcome::Failed(e.to_string()));
                report.record(phase, "upload", StepOutcome::Skipped(SKIPPED_AFTER_FAILURE.into()));
                report.record(phase, "bind", StepOutcome::Skipped(SKIPPED_AFTER_FAILURE.into()));
                return;
            }
        };
        info!(
            dir = %pair.domain,
            key = %pair.private_key_path.display(),
            chain = %pair.full_chain_path.display(),
            index = pair.version_index,
            "Located certificate files"
        );

        let material = match read_pair(&pair.private_key_path, &pair.full_chain_path).await {
            Ok(material) => material,
            Err(e) => {
                error!("Failed to read certificate files: {}", e);
                report.record(phase, "locate", StepOutcome::Failed(e.to_string()));
                report.record(phase, "upload", StepOutcome::Skipped(SKIPPED_AFTER_FAILURE.into()));
                report.record(phase, "bind", StepOutcome::Skipped(SKIPPED_AFTER_FAILURE.into()));
                return;
            }
        };
        report.record(phase, "locate", StepOutcome::Succeeded);

        let Some(cdn) = &self.cdn else {
            warn!("Qiniu credentials missing, skipping certificate upload");
            let reason = "no CDN credentials";
            report.record(phase, "upload", StepOutcome::Skipped(reason.into()));
            report.record(phase, "bind", StepOutcome::Skipped(reason.into()));
            return;
        };

        let local_date = (self.clock)().with_timezone(&Local).format("%Y%m%d");
        let name = format!("{}-letsencrypt-{}", pair.domain, local_date);
        let (private_key, full_chain) = material;

        let cert_id = match cdn
            .upload_certificate(&name, &cdn_domain, &private_key, &full_chain)
            .await
        {
            Ok(id) => {
                report.record(phase, "upload", StepOutcome::Succeeded);
                id
            }
            Err(e) => {
                error!(name = %name, "Certificate upload failed: {}", e);
                report.record(phase, "upload", StepOutcome::Failed(e.to_string()));
                report.record(phase, "bind", StepOutcome::Skipped(SKIPPED_AFTER_FAILURE.into()));
                return;
            }
        };

        match cdn.bind_domain_certificate(&cdn_domain, &cert_id).await {
            Ok(binding) => {
                info!(cdn_domain = %binding.cdn_domain, cert_id = %binding.certificate_id, "CDN now serves the renewed certificate");
                report.record(phase, "bind", StepOutcome::Succeeded);
                report.binding = Some(binding);
            }
            Err(e) => {
                error!(cdn_domain = %cdn_domain, cert_id = %cert_id, "Certificate bind failed: {}", e);
                report.record(phase, "bind", StepOutcome::Failed(e.to_string()));
            }
        }
    }
}

async fn read_pair(
    key_path: &std::path::Path,
    chain_path: &std::path::Path,
) -> std::io::Result<(String, String)> {
    let key = tokio::fs::read_to_string(key_path).await?;
    let chain = tokio::fs::read_to_string(chain_path).await?;
    Ok((key, chain))
}
