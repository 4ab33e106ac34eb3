//! ProcessRefund: credit part of an earlier sale back to the account.
//!
//! The refund is recorded at the stall of the original sale, and only an
//! operator assigned to that stall may issue it.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use festa_core::account::check_refund;
use festa_core::{
    Account, CoreError, LedgerTransaction, Money, ProcessRefundRequest, RefundResult,
    TransactionType,
};
use festa_db::StoreTx;

use crate::assignment;
use crate::auth::Caller;
use crate::error::LedgerResult;
use crate::idempotency::{self, Outcome, Reservation};
use crate::projector::LedgerEvent;

pub(crate) async fn execute(
    tx: &mut StoreTx,
    caller: &Caller,
    req: &ProcessRefundRequest,
) -> LedgerResult<(Outcome<RefundResult>, Vec<LedgerEvent>)> {
    if let Reservation::AlreadyApplied(cached) = idempotency::check(tx, &req.idempotency_key).await? {
        return Ok((Outcome::AlreadyProcessed(cached), Vec::new()));
    }

    let customer = tx
        .customers()
        .get(&req.account_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Customer", &req.account_id))?;
    let assignment = assignment::resolve(tx, &caller.operator_id).await?;
    let original = tx
        .transactions()
        .get(&req.refund_of_txn_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Transaction", &req.refund_of_txn_id))?;

    if original.txn_type != TransactionType::Sale {
        return Err(CoreError::InvalidRefundTarget {
            transaction_id: original.id,
            reason: "only sales can be refunded",
        }
        .into());
    }
    if original.customer_id != customer.id {
        return Err(CoreError::InvalidRefundTarget {
            transaction_id: original.id,
            reason: "the sale belongs to another account",
        }
        .into());
    }
    assignment::authorize(&assignment, &original.stall_id)?;

    let already_refunded = tx.transactions().sum_refunds_for(&original.id).await?;
    let amount = Money::from_cents(req.amount_cents);
    check_refund(original.amount(), already_refunded, amount)?;

    let mut account = customer.account.clone();
    Account::with_customer(account.apply_refund(amount), &customer.id)?;

    let refund = LedgerTransaction {
        id: Uuid::new_v4().to_string(),
        stall_id: original.stall_id.clone(),
        operator_id: caller.operator_id.clone(),
        operator_name: req
            .operator_name
            .clone()
            .unwrap_or_else(|| assignment.user_name.clone()),
        customer_id: customer.id.clone(),
        amount_cents: amount.cents(),
        txn_type: TransactionType::Refund,
        refund_of_txn_id: Some(original.id.clone()),
        payment_id: None,
        idempotency_key: req.idempotency_key.clone(),
        created_at: Utc::now(),
    };

    tx.transactions().insert(&refund).await?;
    tx.customers()
        .update_account(&customer.id, customer.version, &account)
        .await?;

    let result = RefundResult {
        refund_id: refund.id.clone(),
        customer_id: customer.id.clone(),
        new_balance_cents: account.balance_cents,
    };
    idempotency::record(tx, &req.idempotency_key, "process_refund", &result).await?;

    info!(
        refund_id = %refund.id,
        refund_of = %original.id,
        customer_id = %customer.id,
        amount_cents = refund.amount_cents,
        new_balance_cents = account.balance_cents,
        idempotency_key = %req.idempotency_key,
        "Refund recorded"
    );

    let event = LedgerEvent::Refund {
        stall_id: refund.stall_id,
        amount_cents: refund.amount_cents,
    };
    Ok((Outcome::Processed(result), vec![event]))
}
