//! # Idempotency Guard
//!
//! Maps a client-supplied key to at most one applied effect.
//!
//! ## Placement Inside a Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  check(tx, key)        FIRST read                                       │
//! │     │                                                                   │
//! │     ├── AlreadyApplied(echo) ──► body returns Outcome::AlreadyProcessed │
//! │     │                                                                   │
//! │     └── Fresh ──► reads, validation, writes ...                         │
//! │                      │                                                  │
//! │                 record(tx, key, op, &result)   LAST write               │
//! │                                                                         │
//! │  Two first uses of one key race on the record's primary key. The loser  │
//! │  gets a conflict, re-runs, and then sees AlreadyApplied.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A key reused with a different payload is accepted once and the rest are
//! reported as already processed. Payloads are not compared.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use festa_core::IdempotencyRecord;
use festa_db::StoreTx;

use crate::error::LedgerResult;

/// Result of an orchestrated call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// This call applied the effect.
    Processed(T),
    /// An earlier call with the same key applied it. Carries the stored
    /// echo of that call's result when one could be decoded.
    AlreadyProcessed(Option<T>),
}

impl<T> Outcome<T> {
    pub fn is_processed(&self) -> bool {
        matches!(self, Outcome::Processed(_))
    }

    /// The result of this call or, for a replay, the cached one.
    pub fn result(&self) -> Option<&T> {
        match self {
            Outcome::Processed(value) => Some(value),
            Outcome::AlreadyProcessed(value) => value.as_ref(),
        }
    }

    pub fn into_result(self) -> Option<T> {
        match self {
            Outcome::Processed(value) => Some(value),
            Outcome::AlreadyProcessed(value) => value,
        }
    }
}

/// What the guard found for a key.
#[derive(Debug)]
pub enum Reservation<T> {
    Fresh,
    AlreadyApplied(Option<T>),
}

/// Looks up `key`. Must be the first read of the unit of work.
pub async fn check<T: DeserializeOwned>(
    tx: &mut StoreTx,
    key: &str,
) -> LedgerResult<Reservation<T>> {
    let Some(record) = tx.idempotency().get(key).await? else {
        return Ok(Reservation::Fresh);
    };

    debug!(key = %key, operation = %record.operation, "Idempotency key already applied");

    let cached = match record.result.as_deref() {
        Some(json) => match serde_json::from_str::<T>(json) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "Cached result could not be decoded");
                None
            }
        },
        None => None,
    };

    Ok(Reservation::AlreadyApplied(cached))
}

/// Writes the record for `key` with an echo of `result`. Must be the last
/// write of the unit of work.
pub async fn record<T: Serialize>(
    tx: &mut StoreTx,
    key: &str,
    operation: &str,
    result: &T,
) -> LedgerResult<()> {
    let record = IdempotencyRecord {
        key: key.to_string(),
        operation: operation.to_string(),
        result: Some(serde_json::to_string(result)?),
        created_at: Utc::now(),
    };
    tx.idempotency().insert(&record).await?;
    Ok(())
}
