use crate::Fatal;
use crate::cli::RotateArgs;
use anyhow::Context;
use cs_cdn::{CertificateUploader, QiniuClient};
use cs_common::EnvConfig;
use cs_dns::AliDnsClient;
use cs_rotation::{CutoverController, RotationReport, RunOutcome, StepOutcome, SystemCommandRunner};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Validate, wire up the providers and run one rotation
pub async fn run(args: &RotateArgs, env: &EnvConfig, timeout: Option<Duration>) -> Result<(), Fatal> {
    let config = args.rotation_config();
    config.validate()?;

    let cdn: Option<Arc<dyn CertificateUploader>> =
        match env.qiniu_credentials(args.qiniu_ak.clone(), args.qiniu_sk.clone()) {
            Some(creds) => {
                let client = QiniuClient::new(creds, args.qiniu_token, timeout)
                    .context("Failed to create Qiniu client")
                    .map_err(Fatal::other)?;
                info!(token_mode = %client.mode(), "Qiniu certificate upload enabled");
                Some(Arc::new(client) as Arc<dyn CertificateUploader>)
            }
            None => None,
        };

    let mut controller = CutoverController::new(config, Arc::new(SystemCommandRunner)).with_cdn(cdn);
    if !args.qiniu_only {
        let creds = env.dns_credentials().map_err(Fatal::config)?;
        let dns = AliDnsClient::new(creds, timeout)
            .context("Failed to create DNS client")
            .map_err(Fatal::other)?;
        controller = controller.with_dns(Arc::new(dns));
    }

    let report = controller.run().await?;
    log_report(&report);
    Ok(())
}

fn log_report(report: &RotationReport) {
    if let RunOutcome::NotDue { .. } = report.outcome {
        return;
    }

    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Succeeded => info!(phase = %step.phase, action = step.action, "ok"),
            StepOutcome::Skipped(reason) => {
                info!(phase = %step.phase, action = step.action, "skipped: {}", reason)
            }
            StepOutcome::Failed(reason) => {
                warn!(phase = %step.phase, action = step.action, "failed: {}", reason)
            }
        }
    }

    let failed = report.failures().count();
    if failed == 0 {
        info!("Rotation complete");
    } else {
        warn!(failed, "Rotation complete with failed steps");
    }
}
