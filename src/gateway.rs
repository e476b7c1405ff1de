// src/gateway.rs
//
//! Thin adapter issuing single-object operations against the external store.
//!
//! Every method is one network round trip (paginated `list` excepted);
//! nothing is cached and nothing is retried. The trait is the seam the
//! bucket facade builds on, so tests can swap in an in-memory double.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use bytes::Bytes;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::s3_client::build_client;

/// Provider-neutral object metadata (HEAD result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
}

/// Single-object operations against the external store.
#[async_trait]
pub trait ObjectGateway: Send + Sync {
    /// Upload `data` to `(bucket, key)`.
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()>;

    /// Download an entire object into memory.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Server-side copy. The source is not checked beforehand; a missing
    /// source surfaces as the store's own error.
    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()>;

    /// Same-key copy with metadata replacement, tagging the object with a
    /// `Content-Disposition: attachment` download filename.
    async fn copy_with_disposition(&self, bucket: &str, key: &str, filename: &str) -> Result<()>;

    /// Delete a single object.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// HEAD a single object.
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat>;

    /// List every key under `prefix`, following continuation tokens until
    /// the listing is exhausted.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Presigned GET URL, valid for `ttl` from generation.
    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;

    /// Presigned PUT URL, valid for `ttl` from generation.
    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;

    /// Existence check. Any store error collapses to `false`, so absence is
    /// indistinguishable from a failed request.
    async fn exists(&self, bucket: &str, key: &str) -> bool {
        self.stat(bucket, key).await.is_ok()
    }
}

/// The aws-sdk-s3 implementation, holding one SDK client.
pub struct S3Gateway {
    client: Client,
}

impl S3Gateway {
    /// Build a gateway from an explicit config (blocking).
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self { client: build_client(config)? })
    }

    /// Wrap an already-built SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectGateway for S3Gateway {
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        let body = ByteStream::from(data.to_vec());
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("put_object s3://{bucket}/{key} failed"))?;
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("get_object s3://{bucket}/{key} failed"))?;
        let data = resp
            .body
            .collect()
            .await
            .context("collect body failed")?
            .into_bytes();
        Ok(data)
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(format!("{src_bucket}/{src_key}"))
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await
            .with_context(|| {
                format!("copy_object s3://{src_bucket}/{src_key} -> s3://{dst_bucket}/{dst_key} failed")
            })?;
        Ok(())
    }

    async fn copy_with_disposition(&self, bucket: &str, key: &str, filename: &str) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(format!("{bucket}/{key}"))
            .bucket(bucket)
            .key(key)
            .metadata_directive(MetadataDirective::Replace)
            .content_disposition(format!("attachment; filename=\"{filename}\""))
            .send()
            .await
            .with_context(|| format!("disposition copy of s3://{bucket}/{key} failed"))?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("delete_object s3://{bucket}/{key} failed"))?;
        Ok(())
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("head_object s3://{bucket}/{key} failed"))?;
        let size = resp.content_length().unwrap_or_default().max(0) as u64;
        Ok(ObjectStat { size })
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut cont: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = &cont {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.context("list_objects_v2 failed")?;
            for obj in resp.contents() {
                if let Some(k) = obj.key() {
                    keys.push(k.to_owned());
                }
            }
            if let Some(token) = resp.next_continuation_token() {
                cont = Some(token.to_string());
            } else {
                break;
            }
        }
        Ok(keys)
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        let presign_config = PresigningConfig::expires_in(ttl)
            .with_context(|| format!("invalid presign TTL {ttl:?}"))?;
        let req = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .with_context(|| format!("presign GET s3://{bucket}/{key} failed"))?;
        Ok(req.uri().to_string())
    }

    async fn presign_put(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        let presign_config = PresigningConfig::expires_in(ttl)
            .with_context(|| format!("invalid presign TTL {ttl:?}"))?;
        let req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .with_context(|| format!("presign PUT s3://{bucket}/{key} failed"))?;
        Ok(req.uri().to_string())
    }
}
