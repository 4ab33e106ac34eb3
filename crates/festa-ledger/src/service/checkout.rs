//! ProcessCheckout: settle an account's outstanding balance.
//!
//! Writes the payment, a settlement entry that keeps the ledger reconciled,
//! and the zeroed account.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use festa_core::{
    CheckoutResult, CoreError, LedgerTransaction, Money, Payment, ProcessCheckoutRequest,
    TransactionType,
};
use festa_db::StoreTx;

use crate::assignment;
use crate::auth::Caller;
use crate::error::LedgerResult;
use crate::idempotency::{self, Outcome, Reservation};
use crate::projector::LedgerEvent;
use crate::qr_registry;

pub(crate) async fn execute(
    tx: &mut StoreTx,
    caller: &Caller,
    req: &ProcessCheckoutRequest,
) -> LedgerResult<(Outcome<CheckoutResult>, Vec<LedgerEvent>)> {
    if let Reservation::AlreadyApplied(cached) = idempotency::check(tx, &req.idempotency_key).await? {
        return Ok((Outcome::AlreadyProcessed(cached), Vec::new()));
    }

    let (_, customer_id) = qr_registry::lookup_assigned(tx, &req.qr_code_id).await?;
    let customer = tx
        .customers()
        .get(&customer_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Customer", &customer_id))?;
    let assignment = assignment::resolve(tx, &caller.operator_id).await?;

    let now = Utc::now();
    let amount = Money::from_cents(req.amount_cents);
    let mut account = customer.account.clone();
    account.apply_checkout(&customer.id, amount, now)?;

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        method: req.payment_method,
        amount_cents: amount.cents(),
        operator_id: caller.operator_id.clone(),
        customer_id: customer.id.clone(),
        stall_id: assignment.stall_id.clone(),
        idempotency_key: req.idempotency_key.clone(),
        created_at: now,
    };
    let settlement = LedgerTransaction {
        id: Uuid::new_v4().to_string(),
        stall_id: assignment.stall_id.clone(),
        operator_id: caller.operator_id.clone(),
        operator_name: assignment.user_name.clone(),
        customer_id: customer.id.clone(),
        amount_cents: amount.cents(),
        txn_type: TransactionType::Settlement,
        refund_of_txn_id: None,
        payment_id: Some(payment.id.clone()),
        idempotency_key: req.idempotency_key.clone(),
        created_at: now,
    };

    tx.payments().insert(&payment).await?;
    tx.transactions().insert(&settlement).await?;
    tx.customers()
        .update_account(&customer.id, customer.version, &account)
        .await?;

    let result = CheckoutResult {
        payment_id: payment.id.clone(),
        customer_id: customer.id.clone(),
        amount_cents: payment.amount_cents,
    };
    idempotency::record(tx, &req.idempotency_key, "process_checkout", &result).await?;

    info!(
        payment_id = %payment.id,
        customer_id = %customer.id,
        method = ?payment.method,
        amount_cents = payment.amount_cents,
        idempotency_key = %req.idempotency_key,
        "Checkout completed"
    );

    let event = LedgerEvent::Payment {
        stall_id: payment.stall_id,
        amount_cents: payment.amount_cents,
    };
    Ok((Outcome::Processed(result), vec![event]))
}
