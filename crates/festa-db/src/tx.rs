//! # Store Transaction
//!
//! The atomic unit of the ledger. Every orchestrated operation opens one
//! [`StoreTx`], performs all reads, then all writes, then commits.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.begin()                                                            │
//! │    │                                                                    │
//! │    ├── tx.idempotency().get(key)        first read                     │
//! │    ├── tx.qr_codes() / tx.customers()   reads                          │
//! │    ├── tx.assignments() / tx.transactions()                            │
//! │    │                                                                    │
//! │    ├── tx.transactions().insert(..)     writes                         │
//! │    ├── tx.customers().update_account(..)  (version-guarded)            │
//! │    ├── tx.idempotency().insert(..)      last write                     │
//! │    │                                                                    │
//! │  tx.commit()  ── Conflict? ──► dropped, body re-executed by caller     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dropping a `StoreTx` without committing rolls it back.

use sqlx::{Sqlite, Transaction};

use crate::error::DbResult;
use crate::repository::{
    AssignmentRepository, CustomerRepository, IdempotencyRepository, LiveStatsRepository,
    PaymentRepository, QrCodeRepository, RegistrationRepository, StallRepository,
    TransactionRepository,
};

/// An open store transaction.
pub struct StoreTx {
    tx: Transaction<'static, Sqlite>,
}

impl StoreTx {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        StoreTx { tx }
    }

    pub fn customers(&mut self) -> CustomerRepository<'_> {
        CustomerRepository::new(&mut self.tx)
    }

    pub fn transactions(&mut self) -> TransactionRepository<'_> {
        TransactionRepository::new(&mut self.tx)
    }

    pub fn payments(&mut self) -> PaymentRepository<'_> {
        PaymentRepository::new(&mut self.tx)
    }

    pub fn registrations(&mut self) -> RegistrationRepository<'_> {
        RegistrationRepository::new(&mut self.tx)
    }

    pub fn qr_codes(&mut self) -> QrCodeRepository<'_> {
        QrCodeRepository::new(&mut self.tx)
    }

    pub fn assignments(&mut self) -> AssignmentRepository<'_> {
        AssignmentRepository::new(&mut self.tx)
    }

    pub fn stalls(&mut self) -> StallRepository<'_> {
        StallRepository::new(&mut self.tx)
    }

    pub fn idempotency(&mut self) -> IdempotencyRepository<'_> {
        IdempotencyRepository::new(&mut self.tx)
    }

    pub fn live_stats(&mut self) -> LiveStatsRepository<'_> {
        LiveStatsRepository::new(&mut self.tx)
    }

    /// Commits all writes. A conflict here means nothing was applied.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discards all writes.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
