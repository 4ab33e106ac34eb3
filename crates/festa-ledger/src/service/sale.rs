//! ProcessSale: charge a customer's account at the operator's stall.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use festa_core::{
    Account, CoreError, LedgerTransaction, Money, ProcessSaleRequest, SaleResult, TransactionType,
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
    req: &ProcessSaleRequest,
) -> LedgerResult<(Outcome<SaleResult>, Vec<LedgerEvent>)> {
    if let Reservation::AlreadyApplied(cached) = idempotency::check(tx, &req.idempotency_key).await? {
        return Ok((Outcome::AlreadyProcessed(cached), Vec::new()));
    }

    let (_, customer_id) = qr_registry::lookup_assigned(tx, &req.qr_code_id).await?;
    let customer = tx
        .customers()
        .get(&customer_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Customer", &customer_id))?;
    let assignment = assignment::authorize_operator(tx, &caller.operator_id, &req.stall_id).await?;

    let amount = Money::from_cents(req.amount_cents);
    let mut account = customer.account.clone();
    Account::with_customer(account.apply_sale(amount), &customer.id)?;

    let txn = LedgerTransaction {
        id: Uuid::new_v4().to_string(),
        stall_id: req.stall_id.clone(),
        operator_id: caller.operator_id.clone(),
        operator_name: req
            .operator_name
            .clone()
            .unwrap_or_else(|| assignment.user_name.clone()),
        customer_id: customer.id.clone(),
        amount_cents: amount.cents(),
        txn_type: TransactionType::Sale,
        refund_of_txn_id: None,
        payment_id: None,
        idempotency_key: req.idempotency_key.clone(),
        created_at: Utc::now(),
    };

    tx.transactions().insert(&txn).await?;
    tx.customers()
        .update_account(&customer.id, customer.version, &account)
        .await?;

    let result = SaleResult {
        transaction_id: txn.id.clone(),
        customer_id: customer.id.clone(),
        new_balance_cents: account.balance_cents,
    };
    idempotency::record(tx, &req.idempotency_key, "process_sale", &result).await?;

    info!(
        transaction_id = %txn.id,
        customer_id = %customer.id,
        stall_id = %txn.stall_id,
        amount_cents = txn.amount_cents,
        new_balance_cents = account.balance_cents,
        idempotency_key = %req.idempotency_key,
        "Sale recorded"
    );

    let event = LedgerEvent::Sale {
        stall_id: txn.stall_id,
        amount_cents: txn.amount_cents,
    };
    Ok((Outcome::Processed(result), vec![event]))
}
