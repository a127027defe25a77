//! Authorization token schemes for the Qiniu management API

use crate::error::{CdnError, CdnResult};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use cs_common::QiniuCredentials;
use hmac::{Hmac, Mac};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::fmt;
use std::str::FromStr;

type HmacSha1 = Hmac<Sha1>;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const OCTET_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScheme {
    /// Legacy `QBox <ak>:<sign>`, signs path, query and form bodies only
    QBox,
    /// `Qiniu <ak>:<sign>`, also signs method, host and content type
    Qiniu,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadToken {
    pub scheme: TokenScheme,
    /// Full `Authorization` header value
    pub value: String,
}

/// Which candidate tokens a call may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// Try every scheme in preference order
    #[default]
    Auto,
    /// Only the first (legacy) candidate
    V1,
    /// Only the candidates after the first
    V2,
}

impl TokenMode {
    /// Narrow a candidate list. A list of one is never narrowed.
    pub fn restrict(self, mut tokens: Vec<UploadToken>) -> Vec<UploadToken> {
        if tokens.len() <= 1 {
            return tokens;
        }
        match self {
            Self::Auto => tokens,
            Self::V1 => {
                tokens.truncate(1);
                tokens
            }
            Self::V2 => tokens.split_off(1),
        }
    }
}

impl FromStr for TokenMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(format!("unknown token mode '{}', expected auto|v1|v2", other)),
        }
    }
}

impl fmt::Display for TokenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

fn hmac_sign(secret_key: &str, data: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    URL_SAFE.encode(mac.finalize().into_bytes())
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(q) if !q.is_empty() => format!("{}?{}", url.path(), q),
        _ => url.path().to_string(),
    }
}

fn host_header(url: &Url) -> CdnResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| CdnError::InvalidUrl(format!("{} has no host", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn sign_qbox(
    creds: &QiniuCredentials,
    url: &Url,
    content_type: &str,
    body: &[u8],
) -> String {
    let mut data = path_and_query(url);
    data.push('\n');
    if content_type == FORM_CONTENT_TYPE && !body.is_empty() {
        data.push_str(&String::from_utf8_lossy(body));
    }
    format!(
        "QBox {}:{}",
        creds.access_key,
        hmac_sign(&creds.secret_key, &data)
    )
}

fn sign_qiniu(
    creds: &QiniuCredentials,
    method: &str,
    url: &Url,
    content_type: &str,
    body: &[u8],
) -> CdnResult<String> {
    let mut data = format!("{} {}", method, path_and_query(url));
    data.push_str(&format!("\nHost: {}\n", host_header(url)?));
    if !content_type.is_empty() {
        data.push_str(&format!("Content-Type: {}\n", content_type));
    }
    data.push('\n');
    if !body.is_empty() && !content_type.is_empty() && content_type != OCTET_CONTENT_TYPE {
        data.push_str(&String::from_utf8_lossy(body));
    }
    Ok(format!(
        "Qiniu {}:{}",
        creds.access_key,
        hmac_sign(&creds.secret_key, &data)
    ))
}

/// Sign one request with every supported scheme, legacy first
pub fn build_candidates(
    creds: &QiniuCredentials,
    method: &str,
    url: &str,
    content_type: &str,
    body: &[u8],
) -> CdnResult<Vec<UploadToken>> {
    let parsed = Url::parse(url).map_err(|e| CdnError::InvalidUrl(format!("{}: {}", url, e)))?;
    Ok(vec![
        UploadToken {
            scheme: TokenScheme::QBox,
            value: sign_qbox(creds, &parsed, content_type, body),
        },
        UploadToken {
            scheme: TokenScheme::Qiniu,
            value: sign_qiniu(creds, method, &parsed, content_type, body)?,
        },
    ])
}
