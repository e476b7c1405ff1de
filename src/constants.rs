// src/constants.rs
//
// Centralized constants for s3kit to avoid hardcoded values throughout the codebase

/// Default region when neither the config nor the environment names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default number of concurrently executing tasks within one transfer batch
pub const DEFAULT_WORKER_LIMIT: usize = 10;

/// Default number of copy requests per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default lifetime of a presigned URL (seconds)
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 3600;

/// Default timeout for a single storage operation (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 120;

/// Connection timeout when establishing a link to the store (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
