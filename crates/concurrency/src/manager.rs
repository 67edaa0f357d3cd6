//! Retry coordinator
//!
//! Runs a unit of work inside a transaction, committing on success and
//! retrying on conflicts.
//!
//! ## Attempt sequence
//!
//! ```text
//! 1. unit_of_work(&mut ctx)            - reads and writes through repositories
//! 2. after-commit hooks (&mut ctx, &r) - same transaction, before commit
//! 3. ctx.commit()                      - conflicts may surface here
//! 4. on failure in 1-3: ctx.rollback(), then classify
//!      Fatal                     -> fail now
//!      Retryable, attempts left  -> warn, back off, go to 1
//!      Retryable, budget spent   -> error, fail with the last failure
//! ```
//!
//! The context is created once per call, reused across attempts, and
//! closed exactly once on every exit path.

use crate::classify::Verdict;
use crate::config::RetryConfig;
use crate::context::TxContext;
use crate::error::ExecuteError;
use retrytx_core::{Storage, TxError, TxResult};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Work run inside the transaction after the unit of work succeeds
pub type AfterCommitHook<'a, S, R> = Box<dyn Fn(&mut TxContext<S>, &R) -> TxResult<()> + 'a>;

/// Box a closure as an `AfterCommitHook`
pub fn after_commit<'a, S, R, F>(hook: F) -> AfterCommitHook<'a, S, R>
where
    S: Storage,
    F: Fn(&mut TxContext<S>, &R) -> TxResult<()> + 'a,
{
    Box::new(hook)
}

/// Executes units of work with automatic retry on conflict
///
/// Cloning is cheap; clones share the same storage.
pub struct TxManager<S: Storage> {
    storage: Arc<S>,
    config: RetryConfig,
}

impl<S: Storage> Clone for TxManager<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
        }
    }
}

impl<S: Storage> TxManager<S> {
    /// Create a manager with the default retry configuration
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_config(storage, RetryConfig::default())
    }

    /// Create a manager with an explicit retry configuration
    pub fn with_config(storage: Arc<S>, config: RetryConfig) -> Self {
        Self { storage, config }
    }

    /// Retry configuration in use
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Storage shared by this manager
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Fresh context for callers that manage transaction boundaries themselves
    pub fn context(&self) -> TxContext<S> {
        TxContext::new(Arc::clone(&self.storage))
    }

    /// Execute a unit of work with automatic retry on conflict
    ///
    /// The closure is called repeatedly until either:
    /// - The transaction commits successfully
    /// - A fatal error occurs (not retried)
    /// - The attempt budget is spent
    ///
    /// The closure must be `Fn`: every attempt starts from fresh reads.
    ///
    /// # Errors
    ///
    /// Returns an `ExecuteError` wrapping the fatal failure, or the last
    /// retryable failure when the budget ran out.
    ///
    /// # Example
    /// ```text
    /// let entity = manager.execute(|ctx| {
    ///     let mut e = repo.find(ctx, id, LockMode::Exclusive)?.ok_or(...)?;
    ///     e.set_content(format!("{} plus T1", e.content()));
    ///     repo.update(ctx, e)
    /// })?;
    /// ```
    pub fn execute<R, F>(&self, unit_of_work: F) -> Result<R, ExecuteError>
    where
        F: Fn(&mut TxContext<S>) -> TxResult<R>,
    {
        self.execute_with_hooks(unit_of_work, &[])
    }

    /// Execute a unit of work, then run `hooks` in the same transaction before committing
    ///
    /// A failing hook fails the attempt exactly like a failing unit of work.
    pub fn execute_with_hooks<R, F>(
        &self,
        unit_of_work: F,
        hooks: &[AfterCommitHook<'_, S, R>],
    ) -> Result<R, ExecuteError>
    where
        F: Fn(&mut TxContext<S>) -> TxResult<R>,
    {
        let max_attempts = self.config.attempt_budget();
        let mut ctx = self.context();
        let mut attempt = 0u32;

        let outcome = loop {
            attempt += 1;
            let failure = match Self::run_attempt(&mut ctx, &unit_of_work, hooks) {
                Ok(value) => {
                    debug!(target: "retrytx::txn", attempt, "Unit of work committed");
                    break Ok(value);
                }
                Err(e) => e,
            };

            ctx.rollback();

            match ctx.classify(&failure) {
                Verdict::Fatal => {
                    debug!(target: "retrytx::txn", attempt, error = %failure, "Unit of work failed");
                    break Err(ExecuteError::fatal(attempt, failure));
                }
                Verdict::Retryable(reason) if attempt < max_attempts => {
                    warn!(
                        target: "retrytx::txn",
                        attempt,
                        max_attempts,
                        %reason,
                        error = %failure,
                        "Retrying unit of work"
                    );
                    if reason.uses_backoff() {
                        std::thread::sleep(self.config.calculate_delay(attempt - 1));
                    }
                }
                Verdict::Retryable(reason) => {
                    error!(
                        target: "retrytx::txn",
                        attempts = attempt,
                        %reason,
                        error = %failure,
                        "Retry budget exhausted"
                    );
                    break Err(ExecuteError::exhausted(attempt, failure));
                }
            }
        };

        match ctx.close() {
            Ok(()) => outcome,
            Err(e) => {
                warn!(target: "retrytx::txn", error = %e, "Closing session failed");
                // Only surfaced when it is the sole failure
                match outcome {
                    Ok(_) => Err(ExecuteError::fatal(attempt, TxError::Store(e))),
                    failed => failed,
                }
            }
        }
    }

    fn run_attempt<R, F>(
        ctx: &mut TxContext<S>,
        unit_of_work: &F,
        hooks: &[AfterCommitHook<'_, S, R>],
    ) -> TxResult<R>
    where
        F: Fn(&mut TxContext<S>) -> TxResult<R>,
    {
        let value = unit_of_work(ctx)?;
        for hook in hooks {
            hook(ctx, &value)?;
        }
        ctx.commit()?;
        Ok(value)
    }
}
