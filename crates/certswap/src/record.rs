use crate::Fatal;
use crate::cli::RecordArgs;
use anyhow::{Context, anyhow};
use cs_common::EnvConfig;
use cs_dns::{AliDnsClient, Upserted};
use std::time::Duration;
use tracing::info;

/// Create or update one record
pub async fn run(args: &RecordArgs, env: &EnvConfig, timeout: Option<Duration>) -> Result<(), Fatal> {
    let record = args
        .upsert()
        .ok_or_else(|| Fatal::config(anyhow!("--domain, --rr, --type and --value are required")))?;
    let creds = env.dns_credentials().map_err(Fatal::config)?;
    let client = AliDnsClient::new(creds, timeout)
        .context("Failed to create DNS client")
        .map_err(Fatal::other)?;

    let fqdn = format!("{}.{}", record.rr, record.domain);
    let outcome = client
        .upsert_record(&record, args.create_if_missing)
        .await
        .with_context(|| format!("Failed to upsert {}", fqdn))
        .map_err(Fatal::other)?;

    match outcome {
        Upserted::Updated(id) => {
            info!(record = %fqdn, id = %id, record_type = %record.record_type, value = %record.value, "Record updated");
        }
        Upserted::Created(id) => {
            info!(record = %fqdn, id = %id, record_type = %record.record_type, value = %record.value, "Record created");
        }
        Upserted::Missing => {
            return Err(Fatal::lookup(anyhow!(
                "no {} record matches {} and --create-if-missing is off",
                record.record_type,
                fqdn
            )));
        }
    }
    Ok(())
}
