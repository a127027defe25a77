use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_ALICLOUD_ACCESS_KEY_ID: &str = "ALICLOUD_ACCESS_KEY_ID";
pub const ENV_ALICLOUD_ACCESS_KEY_SECRET: &str = "ALICLOUD_ACCESS_KEY_SECRET";
pub const ENV_QINIU_ACCESS_KEY: &str = "QINIU_ACCESS_KEY";
pub const ENV_QINIU_SECRET_KEY: &str = "QINIU_SECRET_KEY";

/// Credentials loaded from environment variables
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Alibaba Cloud DNS access key pair
    pub alicloud_access_key_id: Option<String>,
    pub alicloud_access_key_secret: Option<String>,
    /// Qiniu CDN access key pair (CLI flags take precedence)
    pub qiniu_access_key: Option<String>,
    pub qiniu_secret_key: Option<String>,
}

impl fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvConfig")
            .field("alicloud_access_key_id", &self.alicloud_access_key_id)
            .field("alicloud_access_key_secret", &redact(&self.alicloud_access_key_secret))
            .field("qiniu_access_key", &self.qiniu_access_key)
            .field("qiniu_secret_key", &redact(&self.qiniu_secret_key))
            .finish()
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

/// Alibaba Cloud access key pair used to sign DNS API calls
#[derive(Clone)]
pub struct DnsCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl fmt::Debug for DnsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// Qiniu access key pair used to sign CDN API calls
#[derive(Clone)]
pub struct QiniuCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for QiniuCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QiniuCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl EnvConfig {
    /// Read credentials from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup function. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            alicloud_access_key_id: get(ENV_ALICLOUD_ACCESS_KEY_ID),
            alicloud_access_key_secret: get(ENV_ALICLOUD_ACCESS_KEY_SECRET),
            qiniu_access_key: get(ENV_QINIU_ACCESS_KEY),
            qiniu_secret_key: get(ENV_QINIU_SECRET_KEY),
        }
    }

    /// Load a `.env` file, then read the environment.
    ///
    /// An explicit `env_file` must exist. Without one, `/etc/certswap/.env`
    /// and `./.env` are tried in that order and the first hit wins.
    pub fn load(env_file: Option<&Path>) -> Result<Self, AppError> {
        if let Some(path) = env_file {
            load_dotenv(path)?;
        } else {
            let candidates = [PathBuf::from("/etc/certswap/.env"), PathBuf::from(".env")];
            for candidate in &candidates {
                if candidate.exists() {
                    load_dotenv(candidate)?;
                    break;
                }
            }
        }

        Ok(Self::from_env())
    }

    /// DNS credentials, required for any run that touches DNS records
    pub fn dns_credentials(&self) -> Result<DnsCredentials, AppError> {
        match (&self.alicloud_access_key_id, &self.alicloud_access_key_secret) {
            (Some(id), Some(secret)) => Ok(DnsCredentials {
                access_key_id: id.clone(),
                access_key_secret: secret.clone(),
            }),
            _ => Err(AppError::Config(format!(
                "missing Alibaba Cloud credentials: set {} and {}",
                ENV_ALICLOUD_ACCESS_KEY_ID, ENV_ALICLOUD_ACCESS_KEY_SECRET
            ))),
        }
    }

    /// Qiniu credentials, with explicit values overriding the environment
    pub fn qiniu_credentials(
        &self,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Option<QiniuCredentials> {
        let access_key = access_key
            .filter(|v| !v.is_empty())
            .or_else(|| self.qiniu_access_key.clone())?;
        let secret_key = secret_key
            .filter(|v| !v.is_empty())
            .or_else(|| self.qiniu_secret_key.clone())?;
        Some(QiniuCredentials {
            access_key,
            secret_key,
        })
    }
}

/// Parse basic `KEY=VALUE` lines, skipping blanks and `#` comments
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim().trim_start_matches("export ").trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Load a `.env` file into the process environment without overriding
/// variables that are already set.
fn load_dotenv(path: &Path) -> Result<(), AppError> {
    let content = std::fs::read_to_string(path)?;
    let mut applied = 0usize;
    for (key, value) in parse_dotenv(&content) {
        if std::env::var(&key).is_err() {
            // SAFETY: called from main before the runtime spawns any threads
            unsafe { std::env::set_var(&key, value) };
            applied += 1;
        }
    }
    debug!(path = %path.display(), applied, "Loaded .env file");
    Ok(())
}
