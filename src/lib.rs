// src/lib.rs
//
// Crate root — public re-exports.

//! Convenience layer over S3-compatible object storage: bucket-bound
//! clients for single-object operations, plus a bounded-concurrency batch
//! engine for copy and download fan-out.

pub mod bucket;
pub mod config;
pub mod constants;
pub mod gateway;
pub mod s3_client;
pub mod transfer;

pub use bucket::BucketClient;
pub use config::ClientConfig;
pub use constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_PRESIGN_TTL_SECS, DEFAULT_REGION, DEFAULT_WORKER_LIMIT,
};
pub use gateway::{ObjectGateway, ObjectStat, S3Gateway};
pub use s3_client::{build_client, build_client_async, run_on_global_rt};
pub use transfer::{
    TransferError, TransferOptions, TransferOutcome, TransferReport, copy_batched,
    download_pooled,
};
