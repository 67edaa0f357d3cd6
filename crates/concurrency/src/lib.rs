//! Concurrency layer for retrytx
//!
//! This crate implements the retry coordinator with:
//! - TxManager: runs units of work, commits, retries on conflict
//! - TxContext: lazily opened session plus transaction state machine
//! - Conflict classification (retryable vs. fatal)
//! - RetryConfig: attempt budget and exponential backoff
//!
//! Retry decisions switch on tagged `StoreError`/`TxError` variants, never
//! on message text.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod manager;

#[cfg(test)]
mod testing;

pub use classify::{classify, classify_store, RetryReason, Verdict};
pub use config::RetryConfig;
pub use context::{TxContext, TxState};
pub use error::ExecuteError;
pub use manager::{after_commit, AfterCommitHook, TxManager};
