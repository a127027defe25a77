use crate::cert_id::parse_certificate_id;
use crate::error::{CdnError, CdnResult};
use crate::provider::{CdnBinding, CertificateUploader};
use crate::token::{TokenMode, UploadToken, build_candidates};
use async_trait::async_trait;
use cs_common::QiniuCredentials;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.qiniu.com";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Serialize)]
struct UploadCertRequest<'a> {
    name: &'a str,
    common_name: &'a str,
    pri: &'a str,
    ca: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpsConfRequest<'a> {
    cert_id: &'a str,
    force_https: bool,
    http2_enable: bool,
}

/// Bodies that come back with a success status but still signal failure
fn is_failure_body(body: &str) -> bool {
    body.contains("BadToken") || body.starts_with("error")
}

pub struct QiniuClient {
    http: reqwest::Client,
    api_base: String,
    credentials: QiniuCredentials,
    mode: TokenMode,
}

impl QiniuClient {
    pub fn new(
        credentials: QiniuCredentials,
        mode: TokenMode,
        timeout: Option<Duration>,
    ) -> CdnResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            api_base: DEFAULT_API_BASE.to_string(),
            credentials,
            mode,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn mode(&self) -> TokenMode {
        self.mode
    }

    /// Send the same request once per token until one is accepted.
    ///
    /// Transport errors and non-success statuses only move on to the next
    /// token. Running out of tokens, or an accepted body carrying a failure
    /// marker, yields [`CdnError::Rejected`] with the last response text.
    pub async fn attempt_until_accepted(
        &self,
        tokens: &[UploadToken],
        method: Method,
        url: &str,
        body: &str,
    ) -> CdnResult<String> {
        let mut last_failure = String::new();

        for token in tokens {
            debug!(scheme = ?token.scheme, %method, url, "Trying Qiniu token");

            let result = self
                .http
                .request(method.clone(), url)
                .header(AUTHORIZATION, &token.value)
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(body.to_string())
                .send()
                .await;

            let resp = match result {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(scheme = ?token.scheme, error = %e, "Qiniu request failed");
                    last_failure = e.to_string();
                    continue;
                }
            };

            let status = resp.status();
            let text = match resp.text().await {
                Ok(text) => text,
                Err(e) => {
                    warn!(scheme = ?token.scheme, error = %e, "Failed to read Qiniu response");
                    last_failure = e.to_string();
                    continue;
                }
            };

            if !status.is_success() {
                warn!(scheme = ?token.scheme, %status, "Qiniu rejected token");
                last_failure = if text.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    text
                };
                continue;
            }

            if is_failure_body(&text) {
                return Err(CdnError::Rejected {
                    last_response: text,
                });
            }

            debug!(scheme = ?token.scheme, %status, "Qiniu accepted token");
            return Ok(text);
        }

        Err(CdnError::Rejected {
            last_response: last_failure,
        })
    }

    async fn signed_call(&self, method: Method, url: &str, body: &str) -> CdnResult<String> {
        let candidates = build_candidates(
            &self.credentials,
            method.as_str(),
            url,
            JSON_CONTENT_TYPE,
            body.as_bytes(),
        )?;
        let tokens = self.mode.restrict(candidates);
        self.attempt_until_accepted(&tokens, method, url, body).await
    }
}

#[async_trait]
impl CertificateUploader for QiniuClient {
    async fn upload_certificate(
        &self,
        name: &str,
        common_name: &str,
        private_key_pem: &str,
        full_chain_pem: &str,
    ) -> CdnResult<String> {
        let url = format!("{}/sslcert", self.api_base);
        let body = serde_json::to_string(&UploadCertRequest {
            name,
            common_name,
            pri: private_key_pem,
            ca: full_chain_pem,
        })?;

        let text = self
            .signed_call(Method::POST, &url, &body)
            .await
            .map_err(|e| match e {
                CdnError::Rejected { last_response } => CdnError::Upload { last_response },
                other => other,
            })?;

        let cert_id =
            parse_certificate_id(&text).ok_or(CdnError::MissingCertificateId { body: text })?;
        info!(name, common_name, cert_id = %cert_id, "Uploaded certificate to Qiniu");
        Ok(cert_id)
    }

    async fn bind_domain_certificate(
        &self,
        cdn_domain: &str,
        certificate_id: &str,
    ) -> CdnResult<CdnBinding> {
        let url = format!("{}/domain/{}/httpsconf", self.api_base, cdn_domain);
        let body = serde_json::to_string(&HttpsConfRequest {
            cert_id: certificate_id,
            force_https: false,
            http2_enable: true,
        })?;

        self.signed_call(Method::PUT, &url, &body)
            .await
            .map_err(|e| match e {
                CdnError::Rejected { last_response } => CdnError::Bind { last_response },
                other => other,
            })?;

        info!(cdn_domain, certificate_id, "Bound certificate to Qiniu domain");
        Ok(CdnBinding {
            cdn_domain: cdn_domain.to_string(),
            certificate_id: certificate_id.to_string(),
        })
    }
}
