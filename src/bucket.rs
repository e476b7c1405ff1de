// src/bucket.rs
//
//! Bucket-bound convenience client.
//!
//! Binds one bucket name to an [`ObjectGateway`] and exposes blocking
//! per-object calls. Ordinary store failures surface as `false`/`None`
//! with a logged warning, never as a raised error; the batch calls are
//! the one exception, and only for their length precondition.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use tracing::warn;

use crate::config::ClientConfig;
use crate::constants::DEFAULT_WORKER_LIMIT;
use crate::gateway::{ObjectGateway, S3Gateway};
use crate::s3_client::run_on_global_rt;
use crate::transfer::{self, TransferOptions, TransferReport};

pub struct BucketClient {
    bucket: String,
    gateway: Arc<dyn ObjectGateway>,
}

impl BucketClient {
    /// Bind `bucket` to a fresh S3 gateway built from `config`.
    pub fn new(bucket: impl Into<String>, config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            bucket: bucket.into(),
            gateway: Arc::new(S3Gateway::new(config)?),
        })
    }

    /// Bind `bucket` to an existing gateway. This is the seam tests use to
    /// substitute an in-memory store.
    pub fn with_gateway(bucket: impl Into<String>, gateway: Arc<dyn ObjectGateway>) -> Self {
        Self { bucket: bucket.into(), gateway }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Synthesize an object key: random 128-bit hex token plus a UTC
    /// millisecond timestamp, keeping the original file extension.
    /// Collisions are negligible, not impossible.
    pub fn generate_key(filename: &str) -> String {
        let mut token = [0u8; 16];
        rand::rngs::ThreadRng::default().fill(&mut token[..]);

        let mut key: String = token.iter().map(|b| format!("{b:02x}")).collect();
        key.push_str(&Utc::now().timestamp_millis().to_string());
        if let Some(ext) = Path::new(filename).extension() {
            key.push('.');
            key.push_str(&ext.to_string_lossy());
        }
        key
    }

    // -------------------------------------------------------------------------
    // Uploads
    // -------------------------------------------------------------------------

    /// Upload a local file to `key`.
    pub fn upload_file(&self, local_path: impl AsRef<Path>, key: &str) -> bool {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let path = local_path.as_ref().to_path_buf();
        let result = run_on_global_rt(async move {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {:?}", path))?;
            gateway.put(&bucket, &key_owned, &data).await
        });
        sentinel("upload", key, result)
    }

    /// Upload a local file under a generated key; `Some(key)` on success.
    pub fn upload_file_auto(&self, local_path: impl AsRef<Path>) -> Option<String> {
        let key = Self::generate_key(&local_path.as_ref().to_string_lossy());
        self.upload_file(local_path, &key).then_some(key)
    }

    /// Upload an in-memory buffer to `key`.
    pub fn upload_bytes(&self, data: &[u8], key: &str) -> bool {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let data = data.to_vec();
        let result = run_on_global_rt(async move {
            gateway.put(&bucket, &key_owned, &data).await
        });
        sentinel("upload", key, result)
    }

    // -------------------------------------------------------------------------
    // Downloads
    // -------------------------------------------------------------------------

    /// Download `key` into a local file.
    pub fn download_file(&self, key: &str, local_path: impl AsRef<Path>) -> bool {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let path = local_path.as_ref().to_path_buf();
        let result = run_on_global_rt(async move {
            let data = gateway.get(&bucket, &key_owned).await?;
            tokio::fs::write(&path, &data)
                .await
                .with_context(|| format!("failed to write {:?}", path))
        });
        sentinel("download", key, result)
    }

    /// Fetch `key` into memory; `None` if the store reports any error.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let result = run_on_global_rt(async move {
            gateway.get(&bucket, &key_owned).await
        });
        match result {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!("get of {} failed: {:#}", key, e);
                None
            }
        }
    }

    /// Download every object under `prefix` into `local_dir`, recreating the
    /// relative directory layout. Pulls objects through the worker pool.
    pub fn download_prefix(&self, prefix: &str, local_dir: impl AsRef<Path>) -> bool {
        let local_dir = local_dir.as_ref();
        let listed = self.list(prefix);

        let mut keys = Vec::with_capacity(listed.len());
        let mut paths = Vec::with_capacity(listed.len());
        for key in listed {
            // Objects ending in '/' are directory markers.
            if key.ends_with('/') {
                continue;
            }
            let relative = key.strip_prefix(prefix).unwrap_or(&key);
            let out_path = local_dir.join(relative);
            if let Some(parent) = out_path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!("download of prefix {} failed: cannot create {:?}: {}", prefix, parent, e);
                    return false;
                }
            }
            keys.push(key);
            paths.push(out_path.to_string_lossy().into_owned());
        }
        if keys.is_empty() {
            return true;
        }

        match self.download_many(&keys, &paths, DEFAULT_WORKER_LIMIT) {
            Ok(report) => report.is_complete_success(),
            Err(e) => {
                warn!("download of prefix {} failed: {:#}", prefix, e);
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Single-object queries and mutations
    // -------------------------------------------------------------------------

    /// Existence check. Any store error reads as "does not exist".
    pub fn exists(&self, key: &str) -> bool {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        run_on_global_rt(async move { Ok(gateway.exists(&bucket, &key_owned).await) })
            .unwrap_or(false)
    }

    pub fn delete(&self, key: &str) -> bool {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let result = run_on_global_rt(async move {
            gateway.delete(&bucket, &key_owned).await
        });
        sentinel("delete", key, result)
    }

    /// Keys under `prefix`; empty (and logged) on any store error.
    pub fn list(&self, prefix: &str) -> Vec<String> {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let prefix_owned = prefix.to_string();
        let result = run_on_global_rt(async move {
            gateway.list(&bucket, &prefix_owned).await
        });
        match result {
            Ok(keys) => keys,
            Err(e) => {
                warn!("list of prefix {} failed: {:#}", prefix, e);
                Vec::new()
            }
        }
    }

    /// Server-side copy within this bucket.
    pub fn copy(&self, src_key: &str, dst_key: &str) -> bool {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let src = src_key.to_string();
        let dst = dst_key.to_string();
        let result = run_on_global_rt(async move {
            gateway.copy(&bucket, &src, &bucket, &dst).await
        });
        sentinel("copy", src_key, result)
    }

    /// Copy then delete the source. Succeeds only if both steps do.
    pub fn move_object(&self, src_key: &str, dst_key: &str) -> bool {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let src = src_key.to_string();
        let dst = dst_key.to_string();
        let result = run_on_global_rt(async move {
            gateway.copy(&bucket, &src, &bucket, &dst).await?;
            gateway.delete(&bucket, &src).await
        });
        sentinel("move", src_key, result)
    }

    /// Tag `key` with a download filename via a metadata-replacing copy.
    pub fn set_disposition(&self, key: &str, filename: &str) -> bool {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let filename = filename.to_string();
        let result = run_on_global_rt(async move {
            gateway.copy_with_disposition(&bucket, &key_owned, &filename).await
        });
        sentinel("disposition copy", key, result)
    }

    /// Object size in bytes; `None` if the HEAD fails for any reason.
    pub fn size(&self, key: &str) -> Option<u64> {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let result = run_on_global_rt(async move {
            gateway.stat(&bucket, &key_owned).await
        });
        match result {
            Ok(stat) => Some(stat.size),
            Err(e) => {
                warn!("stat of {} failed: {:#}", key, e);
                None
            }
        }
    }

    pub fn size_mb(&self, key: &str) -> Option<f64> {
        self.size(key).map(|bytes| bytes as f64 / 1024.0 / 1024.0)
    }

    pub fn size_gb(&self, key: &str) -> Option<f64> {
        self.size(key).map(|bytes| bytes as f64 / 1024.0 / 1024.0 / 1024.0)
    }

    // -------------------------------------------------------------------------
    // Presigned URLs
    // -------------------------------------------------------------------------

    pub fn presign_get(&self, key: &str, ttl_secs: u64) -> Option<String> {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let result = run_on_global_rt(async move {
            gateway.presign_get(&bucket, &key_owned, Duration::from_secs(ttl_secs)).await
        });
        match result {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("presign GET of {} failed: {:#}", key, e);
                None
            }
        }
    }

    pub fn presign_put(&self, key: &str, ttl_secs: u64) -> Option<String> {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let key_owned = key.to_string();
        let result = run_on_global_rt(async move {
            gateway.presign_put(&bucket, &key_owned, Duration::from_secs(ttl_secs)).await
        });
        match result {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("presign PUT of {} failed: {:#}", key, e);
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Batch transfers
    // -------------------------------------------------------------------------

    /// Copy many objects within this bucket through the batch engine.
    ///
    /// `Err` only for the structural precondition (mismatched list lengths,
    /// zero-sized options); every store failure is a per-item outcome in the
    /// returned report.
    pub fn copy_many(
        &self,
        source_keys: &[String],
        dest_keys: &[String],
        options: &TransferOptions,
    ) -> Result<TransferReport> {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let sources = source_keys.to_vec();
        let dests = dest_keys.to_vec();
        let options = options.clone();
        run_on_global_rt(async move {
            transfer::copy_batched(&sources, &dests, &options, move |src, dst| {
                let gateway = gateway.clone();
                let bucket = bucket.clone();
                async move { gateway.copy(&bucket, &src, &bucket, &dst).await }
            })
            .await
        })
    }

    /// Download many objects to local paths through the worker pool.
    pub fn download_many(
        &self,
        keys: &[String],
        local_paths: &[String],
        worker_limit: usize,
    ) -> Result<TransferReport> {
        let gateway = self.gateway.clone();
        let bucket = self.bucket.clone();
        let keys = keys.to_vec();
        let paths = local_paths.to_vec();
        run_on_global_rt(async move {
            transfer::download_pooled(&keys, &paths, worker_limit, move |key, path| {
                let gateway = gateway.clone();
                let bucket = bucket.clone();
                async move {
                    let data = gateway.get(&bucket, &key).await?;
                    tokio::fs::write(&path, &data)
                        .await
                        .with_context(|| format!("failed to write {}", path))
                }
            })
            .await
        })
    }
}

fn sentinel(op: &str, key: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("{} of {} failed: {:#}", op, key, e);
            false
        }
    }
}
