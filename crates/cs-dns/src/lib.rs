//! Alibaba Cloud DNS access for the blue-green cutover.
//!
//! Only the calls the rotation needs are implemented: listing a zone's
//! records, toggling a record's status, and the create-or-update pair used by
//! the single-record utility.

mod alidns;
pub mod error;
pub mod provider;
pub mod records;
pub mod signer;

pub use alidns::{AliDnsClient, DEFAULT_ENDPOINT, RecordUpsert, Upserted};
pub use error::{DnsError, DnsResult};
pub use provider::DnsProvider;
pub use records::{DnsRecord, RecordSelector};
