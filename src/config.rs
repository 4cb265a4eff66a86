//! Connection and query settings.
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_HOST: &str = "middlemind.tivo.com";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_CERT: &str = "cdata.pem";

/// Settings for one [`Session`](crate::Session) and the queries run over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MindConfig {
    pub host: String,
    pub port: u16,
    /// PEM bundle holding the trust anchors and, optionally, a client identity.
    pub cert_path: PathBuf,
    pub connect_timeout: Duration,
    /// Upper bound on a single blocking socket read.
    pub read_timeout: Duration,
    /// Description language to keep; empty disables language filtering.
    pub language: String,
    /// Attempts made for a query the service answers with `mindUnavailable`.
    pub retry_attempts: usize,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cert_path: PathBuf::from(DEFAULT_CERT),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            language: DEFAULT_LANGUAGE.to_string(),
            retry_attempts: 3,
        }
    }
}
