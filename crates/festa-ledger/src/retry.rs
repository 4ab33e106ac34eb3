//! # Conflict Retry
//!
//! Runs a transaction body inside a fresh [`StoreTx`] and re-executes the
//! whole body when the store reports a conflict.
//!
//! ## Attempt Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1..=max_attempts                                               │
//! │                                                                         │
//! │   db.begin() ──► body(&mut tx) ──► tx.commit() ──► Ok(value)           │
//! │                      │                  │                               │
//! │                      │ Err              │ Err                           │
//! │                      ▼                  ▼                               │
//! │                  rollback          is_conflict()?                       │
//! │                      │                  │                               │
//! │                      └───── yes ────────┤──── no ──► Err(e)            │
//! │                                         ▼                               │
//! │                           sleep(next_backoff) and retry                 │
//! │                                                                         │
//! │  past the bound: LedgerError::RetriesExhausted                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bodies must be repeatable: everything they decide is re-derived from the
//! reads of the current attempt.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, error, warn};

use festa_db::{Database, StoreTx};

use crate::config::RetrySettings;
use crate::error::{LedgerError, LedgerResult};

/// Boxed future returned by a transaction body, borrowing the transaction.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = LedgerResult<T>> + Send + 't>>;

/// How often and how patiently a conflicting unit of work is re-executed.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts,
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `body` in its own store transaction, retrying on conflicts.
///
/// ## Example
/// ```rust,ignore
/// let value = run_in_transaction(&db, &policy, "process_sale", move |tx| {
///     let req = req.clone();
///     Box::pin(async move { sale::execute(tx, &req).await })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<T, F>(
    db: &Database,
    policy: &RetryPolicy,
    operation: &'static str,
    mut body: F,
) -> LedgerResult<T>
where
    T: Send,
    F: for<'t> FnMut(&'t mut StoreTx) -> TxFuture<'t, T> + Send,
{
    let mut backoff = policy.backoff();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let err = match attempt_once(db, &mut body).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Committed after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_conflict() {
            return Err(err);
        }

        if attempt >= policy.max_attempts {
            error!(operation, attempts = attempt, error = %err, "Conflict retries exhausted");
            return Err(LedgerError::RetriesExhausted { attempts: attempt });
        }

        let delay = backoff.next_backoff().unwrap_or(policy.max_backoff);
        warn!(operation, attempt, ?delay, error = %err, "Transaction conflict, retrying");
        tokio::time::sleep(delay).await;
    }
}

async fn attempt_once<T, F>(db: &Database, body: &mut F) -> LedgerResult<T>
where
    F: for<'t> FnMut(&'t mut StoreTx) -> TxFuture<'t, T>,
{
    let mut tx = db.begin().await?;

    match body(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
