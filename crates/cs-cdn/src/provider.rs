use crate::error::CdnResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A certificate bound to a CDN-facing domain. The CDN keeps the durable copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnBinding {
    pub cdn_domain: String,
    pub certificate_id: String,
}

/// CDN seam used by the certificate stage of a rotation
#[async_trait]
pub trait CertificateUploader: Send + Sync {
    /// Upload key material and return the provider's certificate id
    async fn upload_certificate(
        &self,
        name: &str,
        common_name: &str,
        private_key_pem: &str,
        full_chain_pem: &str,
    ) -> CdnResult<String>;

    /// Point `cdn_domain`'s HTTPS configuration at `certificate_id`
    async fn bind_domain_certificate(
        &self,
        cdn_domain: &str,
        certificate_id: &str,
    ) -> CdnResult<CdnBinding>;
}
