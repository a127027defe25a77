use crate::error::{DnsError, DnsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A host record as reported by the DNS provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    /// Host prefix (RR), e.g. `a` in `a.example.com`
    pub host_prefix: String,
    pub record_type: String,
    pub value: String,
    pub enabled: bool,
}

/// Criteria for picking one record out of a zone listing.
///
/// The host prefix always has to match. Type and value only constrain the
/// match when they are non-empty. All comparisons ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSelector {
    pub host_prefix: String,
    pub record_type: Option<String>,
    pub value: Option<String>,
}

impl RecordSelector {
    pub fn new(host_prefix: impl Into<String>) -> Self {
        Self {
            host_prefix: host_prefix.into(),
            record_type: None,
            value: None,
        }
    }

    pub fn with_type(mut self, record_type: Option<String>) -> Self {
        self.record_type = record_type.filter(|t| !t.is_empty());
        self
    }

    pub fn with_value(mut self, value: Option<String>) -> Self {
        self.value = value.filter(|v| !v.is_empty());
        self
    }

    pub fn matches(&self, record: &DnsRecord) -> bool {
        if !record.host_prefix.eq_ignore_ascii_case(&self.host_prefix) {
            return false;
        }
        if let Some(t) = &self.record_type {
            if !record.record_type.eq_ignore_ascii_case(t) {
                return false;
            }
        }
        if let Some(v) = &self.value {
            if !record.value.eq_ignore_ascii_case(v) {
                return false;
            }
        }
        true
    }

    /// Every record in `records` that satisfies this selector
    pub fn filter<'a>(&self, records: &'a [DnsRecord]) -> Vec<&'a DnsRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// The single record satisfying this selector.
    ///
    /// Zero or several matches are both errors: toggling an unverified record
    /// could take the wrong host offline.
    pub fn resolve<'a>(&self, records: &'a [DnsRecord]) -> DnsResult<&'a DnsRecord> {
        let matched = self.filter(records);
        match matched.as_slice() {
            [record] => Ok(*record),
            [] => Err(DnsError::RecordNotFound {
                selector: self.to_string(),
            }),
            many => Err(DnsError::AmbiguousRecord {
                selector: self.to_string(),
                count: many.len(),
            }),
        }
    }
}

impl fmt::Display for RecordSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rr={}", self.host_prefix)?;
        if let Some(t) = &self.record_type {
            write!(f, " type={}", t)?;
        }
        if let Some(v) = &self.value {
            write!(f, " value={}", v)?;
        }
        Ok(())
    }
}
