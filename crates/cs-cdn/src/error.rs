use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdnError {
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Every candidate token was rejected: {last_response}")]
    Rejected { last_response: String },

    #[error("Qiniu certificate upload failed: {last_response}")]
    Upload { last_response: String },

    #[error("Qiniu domain certificate bind failed: {last_response}")]
    Bind { last_response: String },

    #[error("No certID in upload response: {body}")]
    MissingCertificateId { body: String },
}

pub type CdnResult<T> = Result<T, CdnError>;
