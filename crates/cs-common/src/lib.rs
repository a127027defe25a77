pub mod config;
pub mod error;

pub use config::{DnsCredentials, EnvConfig, QiniuCredentials};
pub use error::AppError;
