//! # Ledger Service
//!
//! The transaction orchestrator. Each public method is one unit of work:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate(request)          InvalidArgument, nothing read               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  run_in_transaction ─────────────────────────────────────────┐         │
//! │  │  idempotency::check       first read                      │ retried │
//! │  │  QR code, customer, assignment, original entry, refunds   │ on      │
//! │  │  rule checks              (any failure: rollback)         │ conflict│
//! │  │  ledger entry, account, QR status writes                  │         │
//! │  │  idempotency::record      last write                      │         │
//! │  └── commit ─────────────────────────────────────────────────┘         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  projector.publish(events)  after commit only                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The bodies live in the submodules and only see a [`StoreTx`]; they hold no
//! state between attempts, so re-running one after a conflict is safe.

mod admin;
mod cancel;
mod checkout;
mod refund;
mod registration;
mod sale;

#[cfg(test)]
mod tests;

use tokio::task::JoinHandle;
use tracing::info;

use festa_core::requests::Validate;
use festa_core::{
    AssignOperatorRequest, Assignment, CancelPaymentRequest, CancelRegistrationRequest,
    CancelResult, CancelTransactionRequest, CheckoutResult, CoreError, CreateCustomerRequest,
    CreateStallRequest, Customer, GenerateQrBatchRequest, LiveStats, ProcessCheckoutRequest,
    ProcessRefundRequest, ProcessSaleRequest, QrBatchResult, QrCode, RefundResult,
    ReissueQrRequest, ReissueResult, SaleResult, Stall,
};
use festa_core::qr::QrAction;
use festa_db::{Database, StoreTx};

use crate::auth::Caller;
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::idempotency::Outcome;
use crate::projector::{LedgerEvent, Projector, ProjectorHandle};
use crate::qr_registry;
use crate::retry::{run_in_transaction, RetryPolicy, TxFuture};

/// Orchestrates every ledger operation. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LedgerService {
    db: Database,
    retry: RetryPolicy,
    label_attempts: u32,
    projector: ProjectorHandle,
}

impl LedgerService {
    /// Builds the service and starts its projector task.
    pub fn start(db: Database, config: &LedgerConfig) -> (Self, JoinHandle<()>) {
        let retry = RetryPolicy::from(&config.retry);
        let (projector, task) = Projector::new(db.clone(), retry.clone(), config.rebuild_interval())
            .start(&config.projector);

        let service = LedgerService::new(db, retry, config.qr.label_attempts, projector);
        (service, task)
    }

    pub fn new(
        db: Database,
        retry: RetryPolicy,
        label_attempts: u32,
        projector: ProjectorHandle,
    ) -> Self {
        LedgerService {
            db,
            retry,
            label_attempts,
            projector,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn projector(&self) -> &ProjectorHandle {
        &self.projector
    }

    /// Runs a body that emits projector events, publishing them once the
    /// unit of work has committed.
    async fn execute<T, F>(&self, operation: &'static str, body: F) -> LedgerResult<T>
    where
        T: Send,
        F: for<'t> FnMut(&'t mut StoreTx) -> TxFuture<'t, (T, Vec<LedgerEvent>)> + Send,
    {
        let (value, events) = run_in_transaction(&self.db, &self.retry, operation, body).await?;
        self.projector.publish(events);
        Ok(value)
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    pub async fn process_sale(
        &self,
        caller: &Caller,
        req: ProcessSaleRequest,
    ) -> LedgerResult<Outcome<SaleResult>> {
        req.validate()?;
        let caller = caller.clone();
        self.execute("process_sale", move |tx| {
            let (caller, req) = (caller.clone(), req.clone());
            Box::pin(async move { sale::execute(tx, &caller, &req).await })
        })
        .await
    }

    pub async fn process_refund(
        &self,
        caller: &Caller,
        req: ProcessRefundRequest,
    ) -> LedgerResult<Outcome<RefundResult>> {
        req.validate()?;
        let caller = caller.clone();
        self.execute("process_refund", move |tx| {
            let (caller, req) = (caller.clone(), req.clone());
            Box::pin(async move { refund::execute(tx, &caller, &req).await })
        })
        .await
    }

    pub async fn process_checkout(
        &self,
        caller: &Caller,
        req: ProcessCheckoutRequest,
    ) -> LedgerResult<Outcome<CheckoutResult>> {
        req.validate()?;
        let caller = caller.clone();
        self.execute("process_checkout", move |tx| {
            let (caller, req) = (caller.clone(), req.clone());
            Box::pin(async move { checkout::execute(tx, &caller, &req).await })
        })
        .await
    }

    pub async fn create_customer(
        &self,
        caller: &Caller,
        req: CreateCustomerRequest,
    ) -> LedgerResult<Outcome<Customer>> {
        req.validate()?;
        let caller = caller.clone();
        self.execute("create_customer", move |tx| {
            let (caller, req) = (caller.clone(), req.clone());
            Box::pin(async move { registration::execute(tx, &caller, &req).await })
        })
        .await
    }

    // =========================================================================
    // Cancellations
    // =========================================================================

    pub async fn cancel_transaction(
        &self,
        caller: &Caller,
        req: CancelTransactionRequest,
    ) -> LedgerResult<CancelResult> {
        req.validate()?;
        let caller = caller.clone();
        self.execute("cancel_transaction", move |tx| {
            let (caller, req) = (caller.clone(), req.clone());
            Box::pin(async move { cancel::transaction(tx, &caller, &req).await })
        })
        .await
    }

    pub async fn cancel_payment(
        &self,
        caller: &Caller,
        req: CancelPaymentRequest,
    ) -> LedgerResult<CancelResult> {
        req.validate()?;
        let caller = caller.clone();
        self.execute("cancel_payment", move |tx| {
            let (caller, req) = (caller.clone(), req.clone());
            Box::pin(async move { cancel::payment(tx, &caller, &req).await })
        })
        .await
    }

    pub async fn cancel_registration(
        &self,
        caller: &Caller,
        req: CancelRegistrationRequest,
    ) -> LedgerResult<CancelResult> {
        req.validate()?;
        let caller = caller.clone();
        self.execute("cancel_registration", move |tx| {
            let (caller, req) = (caller.clone(), req.clone());
            Box::pin(async move { cancel::registration(tx, &caller, &req).await })
        })
        .await
    }

    // =========================================================================
    // Admin Operations
    // =========================================================================

    pub async fn generate_qr_batch(
        &self,
        caller: &Caller,
        req: GenerateQrBatchRequest,
    ) -> LedgerResult<QrBatchResult> {
        caller.require_admin("generate QR batch")?;
        req.validate()?;

        let generated_by = caller.operator_id.clone();
        let label_attempts = self.label_attempts;
        run_in_transaction(&self.db, &self.retry, "generate_qr_batch", move |tx| {
            let (req, generated_by) = (req.clone(), generated_by.clone());
            Box::pin(async move {
                qr_registry::generate_batch(tx, &req, &generated_by, label_attempts).await
            })
        })
        .await
    }

    pub async fn void_qr(&self, caller: &Caller, label: &str) -> LedgerResult<QrCode> {
        caller.require_admin("void QR code")?;
        self.retire_qr(label, QrAction::Void).await
    }

    pub async fn mark_qr_lost(&self, caller: &Caller, label: &str) -> LedgerResult<QrCode> {
        caller.require_admin("mark QR code lost")?;
        self.retire_qr(label, QrAction::MarkLost).await
    }

    async fn retire_qr(&self, label: &str, action: QrAction) -> LedgerResult<QrCode> {
        festa_core::validation::validate_qr_label("label", label)?;
        let label = label.to_string();
        run_in_transaction(&self.db, &self.retry, "retire_qr", move |tx| {
            let label = label.clone();
            Box::pin(async move { qr_registry::retire(tx, &label, action).await })
        })
        .await
    }

    pub async fn reissue_qr(
        &self,
        caller: &Caller,
        req: ReissueQrRequest,
    ) -> LedgerResult<ReissueResult> {
        caller.require_admin("reissue QR code")?;
        req.validate()?;
        run_in_transaction(&self.db, &self.retry, "reissue_qr", move |tx| {
            let req = req.clone();
            Box::pin(async move { qr_registry::reissue(tx, &req).await })
        })
        .await
    }

    pub async fn create_stall(
        &self,
        caller: &Caller,
        req: CreateStallRequest,
    ) -> LedgerResult<Stall> {
        caller.require_admin("create stall")?;
        req.validate()?;
        run_in_transaction(&self.db, &self.retry, "create_stall", move |tx| {
            let req = req.clone();
            Box::pin(async move { admin::create_stall(tx, &req).await })
        })
        .await
    }

    pub async fn assign_operator(
        &self,
        caller: &Caller,
        req: AssignOperatorRequest,
    ) -> LedgerResult<Assignment> {
        caller.require_admin("assign operator")?;
        req.validate()?;
        run_in_transaction(&self.db, &self.retry, "assign_operator", move |tx| {
            let req = req.clone();
            Box::pin(async move { admin::assign_operator(tx, &req).await })
        })
        .await
    }

    /// Recomputes every aggregate. Runs on the projector task so it is
    /// ordered with the events queued before it.
    pub async fn rebuild_live_stats(&self, caller: &Caller) -> LedgerResult<LiveStats> {
        caller.require_admin("rebuild live stats")?;
        let stats = self.projector.rebuild().await?;
        info!(requested_by = %caller.operator_id, "Live stats rebuild requested");
        Ok(stats)
    }

    pub async fn update_top_stall(&self, caller: &Caller) -> LedgerResult<LiveStats> {
        caller.require_admin("update top stall")?;
        self.projector.update_top_stall().await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn live_stats(&self) -> LedgerResult<LiveStats> {
        let mut tx = self.db.begin().await?;
        let stats = tx.live_stats().get().await?;
        tx.commit().await?;
        Ok(stats)
    }

    pub async fn get_customer(&self, customer_id: &str) -> LedgerResult<Customer> {
        festa_core::validation::validate_id("customerId", customer_id)?;
        let mut tx = self.db.begin().await?;
        let customer = tx.customers().get(customer_id).await?;
        tx.commit().await?;
        customer.ok_or_else(|| CoreError::not_found("Customer", customer_id).into())
    }

    /// Stops the projector after it drains queued events.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        self.projector.shutdown().await
    }
}
