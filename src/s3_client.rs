// src/s3_client.rs
//
//! Thread-safe, blocking bridge onto the async AWS Rust SDK.
//! Owns a single background multi-thread Tokio runtime and builds
//! `aws_sdk_s3::Client` instances from an explicit [`ClientConfig`].

use anyhow::Result;
use aws_config::meta::region::RegionProviderChain;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::{Client, config::Credentials, config::Region};
use std::sync::mpsc;
use std::{thread, time::Duration};
use tokio::runtime::{Builder as TokioBuilder, Handle};
use tokio::sync::oneshot;
use tracing::debug;

use crate::config::ClientConfig;
use crate::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REGION};

// -----------------------------------------------------------------------------
// Global runtime (lazy, thread-safe)
// -----------------------------------------------------------------------------
static RT_HANDLE: once_cell::sync::OnceCell<Handle> = once_cell::sync::OnceCell::new();

// Create (once) a background multi-thread Tokio runtime and return its Handle.
fn global_rt_handle() -> &'static Handle {
    RT_HANDLE.get_or_init(|| {
        let (tx, rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("s3kit-rt".to_string())
            .spawn(move || {
                let threads = get_runtime_threads();
                debug!("Creating Tokio runtime with {} worker threads", threads);

                let rt = TokioBuilder::new_multi_thread()
                    .enable_io()
                    .enable_time()
                    .worker_threads(threads)
                    .thread_name("s3kit-rt-worker")
                    .build()
                    .expect("failed to build global tokio runtime");

                // Send a Handle clone back to the creator, then park the runtime forever.
                let handle = rt.handle().clone();
                tx.send(handle).expect("send runtime handle");
                rt.block_on(async { std::future::pending::<()>().await });
            })
            .expect("failed to spawn s3kit runtime thread");

        rx.recv().expect("receive runtime handle")
    })
}

/// Number of runtime threads, with environment override via `S3KIT_RT_THREADS`.
fn get_runtime_threads() -> usize {
    std::env::var("S3KIT_RT_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            let cores = num_cpus::get();
            std::cmp::min(std::cmp::max(4, cores), 16)
        })
}

/// Run an async `fut` on the global runtime and block the **current** thread
/// until it completes. Handles both runtime and non-runtime contexts.
pub fn run_on_global_rt<F, T>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match Handle::try_current() {
        Ok(_) => {
            // Already inside some runtime: still execute on our global runtime,
            // and use a blocking std channel receive, which works from within
            // a runtime context.
            let handle = global_rt_handle().clone();
            let (tx, rx) = std::sync::mpsc::channel();

            handle.spawn(async move {
                let result = fut.await;
                let _ = tx.send(result);
            });

            rx.recv()
                .map_err(|_| anyhow::anyhow!("global runtime task crashed: RecvError(())"))?
        }
        Err(_) => {
            let handle = global_rt_handle().clone();
            let (tx, rx) = oneshot::channel();

            handle.spawn(async move {
                let _ = tx.send(fut.await);
            });

            // Block this plain OS thread until the async result arrives.
            rx.blocking_recv()
                .map_err(|_| anyhow::anyhow!("global runtime task crashed: RecvError(())"))?
        }
    }
}

// -----------------------------------------------------------------------------
// Client factory
// -----------------------------------------------------------------------------

/// Build an S3 client from an explicit config. Safe to call from any async
/// context; nothing global is initialized besides the runtime itself.
pub async fn build_client_async(config: &ClientConfig) -> Result<Client> {
    let credentials = Credentials::new(
        config.access_key.clone(),
        config.secret_key.clone(),
        None,
        None,
        "s3kit",
    );

    let region = RegionProviderChain::first_try(Region::new(config.region.clone()))
        .or_default_provider()
        .or_else(Region::new(DEFAULT_REGION));

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .operation_timeout(config.operation_timeout)
        .build();

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .credentials_provider(credentials)
        .region(region)
        .timeout_config(timeout_config);

    if let Some(endpoint) = &config.endpoint {
        if !endpoint.is_empty() {
            loader = loader.endpoint_url(endpoint);
        }
    }

    let shared = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(config.force_path_style)
        .build();
    Ok(Client::from_conf(s3_config))
}

/// Synchronous wrapper for places that are not async.
/// Internally hops onto the global runtime via `run_on_global_rt`.
pub fn build_client(config: &ClientConfig) -> Result<Client> {
    let config = config.clone();
    run_on_global_rt(async move { build_client_async(&config).await })
}
