// src/config.rs
//
//! Explicit, immutable client configuration.
//!
//! A `ClientConfig` is built once, either from the process environment or
//! field by field, and handed to client construction. There is no ambient
//! global credential state; two clients with different configs coexist.

use std::env;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::constants::{DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_REGION};

/// Credentials and connection settings for one storage client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Custom endpoint URL for S3-compatible services (MinIO, Ceph, ...).
    pub endpoint: Option<String>,
    /// Path-style addressing (`endpoint/bucket`) instead of virtual-hosted.
    /// Required by most S3-compatible services behind custom endpoints.
    pub force_path_style: bool,
    pub operation_timeout: Duration,
}

impl ClientConfig {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            force_path_style: false,
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
        }
    }

    /// Build a config from the process environment. Loads `.env` first so
    /// `AWS_*` vars are available; honors `AWS_REGION` and `AWS_ENDPOINT_URL`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let (Ok(access_key), Ok(secret_key)) =
            (env::var("AWS_ACCESS_KEY_ID"), env::var("AWS_SECRET_ACCESS_KEY"))
        else {
            bail!("Missing AWS_ACCESS_KEY_ID or AWS_SECRET_ACCESS_KEY");
        };

        let mut config = Self::new(access_key, secret_key);
        if let Ok(region) = env::var("AWS_REGION") {
            if !region.is_empty() {
                config.region = region;
            }
        }
        if let Ok(endpoint) = env::var("AWS_ENDPOINT_URL") {
            if !endpoint.is_empty() {
                config.endpoint = Some(endpoint);
            }
        }
        Ok(config)
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}
