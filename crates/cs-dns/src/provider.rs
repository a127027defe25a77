//! DNS provider seam used by the cutover controller

use crate::error::DnsResult;
use crate::records::DnsRecord;
use async_trait::async_trait;

/// The two provider calls a blue-green cutover needs.
///
/// Toggling a record into the state it is already in must be a no-op from
/// the caller's point of view.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Every host record in `domain`
    async fn list_records(&self, domain: &str) -> DnsResult<Vec<DnsRecord>>;

    /// Enable or disable a record by id
    async fn set_record_enabled(&self, record_id: &str, enabled: bool) -> DnsResult<()>;
}
