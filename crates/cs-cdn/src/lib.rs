//! Qiniu CDN certificate upload and HTTPS binding.
//!
//! Every call is signed twice, once with the legacy `QBox` scheme and once
//! with the v2 `Qiniu` scheme, and the candidates are tried in that order
//! until the API accepts one.

mod cert_id;
mod client;
pub mod error;
pub mod provider;
pub mod token;

pub use cert_id::parse_certificate_id;
pub use client::{DEFAULT_API_BASE, QiniuClient};
pub use error::{CdnError, CdnResult};
pub use provider::{CdnBinding, CertificateUploader};
pub use token::{TokenMode, TokenScheme, UploadToken, build_candidates};
