use thiserror::Error;

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS API error (HTTP {status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to decode DNS API response: {0}")]
    Decode(String),

    #[error("No record matches {selector}")]
    RecordNotFound { selector: String },

    #[error("{count} records match {selector}, expected exactly one")]
    AmbiguousRecord { selector: String, count: usize },
}

impl DnsError {
    /// True when the record lookup itself was inconclusive
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. } | Self::AmbiguousRecord { .. })
    }
}

pub type DnsResult<T> = Result<T, DnsError>;
