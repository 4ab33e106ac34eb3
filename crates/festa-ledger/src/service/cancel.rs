//! Cancellations: remove a ledger entry and reverse its effect on the
//! account.
//!
//! Each cancellation is addressed by the idempotency key of the operation
//! it undoes. A key that matches nothing is a soft success
//! (`success = false`), which also makes repeating a cancellation harmless.
//! Admins may cancel anything; operators only entries recorded at the
//! stall they are assigned to.

use chrono::Utc;
use tracing::info;

use festa_core::{
    Account, CancelPaymentRequest, CancelRegistrationRequest, CancelResult,
    CancelTransactionRequest, CoreError, Customer, QrCode, QrStatus, TransactionType,
};
use festa_db::StoreTx;

use crate::assignment;
use crate::auth::Caller;
use crate::error::LedgerResult;
use crate::projector::LedgerEvent;
use crate::qr_registry;

async fn authorize_cancel(tx: &mut StoreTx, caller: &Caller, stall_id: &str) -> LedgerResult<()> {
    if caller.is_admin() {
        return Ok(());
    }
    assignment::authorize_operator(tx, &caller.operator_id, stall_id).await?;
    Ok(())
}

async fn load_customer(tx: &mut StoreTx, customer_id: &str) -> LedgerResult<Customer> {
    tx.customers()
        .get(customer_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Customer", customer_id).into())
}

/// Cancels the sale or refund written under `req.idempotency_key`.
pub(crate) async fn transaction(
    tx: &mut StoreTx,
    caller: &Caller,
    req: &CancelTransactionRequest,
) -> LedgerResult<(CancelResult, Vec<LedgerEvent>)> {
    let Some(txn) = tx
        .transactions()
        .find_by_idempotency_key(&req.idempotency_key)
        .await?
    else {
        // A checkout key names a settlement, which only payment
        // cancellation may remove.
        if let Some(payment) = tx
            .payments()
            .find_by_idempotency_key(&req.idempotency_key)
            .await?
        {
            return Err(CoreError::SettlementNotCancellable {
                transaction_id: payment.id,
            }
            .into());
        }
        return Ok((CancelResult::not_found(), Vec::new()));
    };

    authorize_cancel(tx, caller, &txn.stall_id).await?;
    let customer = load_customer(tx, &txn.customer_id).await?;

    let mut account = customer.account.clone();
    let event = match txn.txn_type {
        TransactionType::Sale => {
            if tx.transactions().count_refunds_for(&txn.id).await? > 0 {
                return Err(CoreError::HasRefunds {
                    transaction_id: txn.id,
                }
                .into());
            }
            Account::with_customer(account.reverse_sale(txn.amount()), &customer.id)?;
            LedgerEvent::SaleCancelled {
                stall_id: txn.stall_id.clone(),
                amount_cents: txn.amount_cents,
            }
        }
        TransactionType::Refund => {
            Account::with_customer(account.reverse_refund(txn.amount()), &customer.id)?;
            LedgerEvent::RefundCancelled {
                stall_id: txn.stall_id.clone(),
                amount_cents: txn.amount_cents,
            }
        }
        TransactionType::Settlement => {
            return Err(CoreError::SettlementNotCancellable {
                transaction_id: txn.id,
            }
            .into());
        }
    };

    tx.transactions().delete(&txn.id).await?;
    tx.customers()
        .update_account(&customer.id, customer.version, &account)
        .await?;

    info!(
        transaction_id = %txn.id,
        txn_type = %txn.txn_type,
        customer_id = %customer.id,
        new_balance_cents = account.balance_cents,
        cancelled_by = %caller.operator_id,
        "Transaction cancelled"
    );

    let message = format!("{} {} cancelled", txn.txn_type, txn.id);
    Ok((CancelResult::cancelled(message), vec![event]))
}

/// Cancels the checkout payment written under `req.idempotency_key`,
/// together with its settlement entry.
pub(crate) async fn payment(
    tx: &mut StoreTx,
    caller: &Caller,
    req: &CancelPaymentRequest,
) -> LedgerResult<(CancelResult, Vec<LedgerEvent>)> {
    let Some(payment) = tx
        .payments()
        .find_by_idempotency_key(&req.idempotency_key)
        .await?
    else {
        return Ok((CancelResult::not_found(), Vec::new()));
    };

    authorize_cancel(tx, caller, &payment.stall_id).await?;
    let customer = load_customer(tx, &payment.customer_id).await?;
    let settlement = tx
        .transactions()
        .find_settlement_for_payment(&payment.id)
        .await?;

    if let Some(settlement) = &settlement {
        tx.transactions().delete(&settlement.id).await?;
    }
    tx.payments().delete(&payment.id).await?;

    let previous_paid_at = tx.payments().latest_paid_at(&customer.id).await?;
    let mut account = customer.account.clone();
    Account::with_customer(
        account.reverse_checkout(payment.amount(), previous_paid_at),
        &customer.id,
    )?;
    tx.customers()
        .update_account(&customer.id, customer.version, &account)
        .await?;

    info!(
        payment_id = %payment.id,
        customer_id = %customer.id,
        amount_cents = payment.amount_cents,
        new_balance_cents = account.balance_cents,
        cancelled_by = %caller.operator_id,
        "Payment cancelled"
    );

    let event = LedgerEvent::PaymentCancelled {
        stall_id: payment.stall_id.clone(),
        amount_cents: payment.amount_cents,
    };
    let message = format!("payment {} cancelled", payment.id);
    Ok((CancelResult::cancelled(message), vec![event]))
}

/// Undoes a registration: deletes the customer and its registration and
/// returns the QR code to the pool. Only allowed before any ledger activity.
pub(crate) async fn registration(
    tx: &mut StoreTx,
    caller: &Caller,
    req: &CancelRegistrationRequest,
) -> LedgerResult<(CancelResult, Vec<LedgerEvent>)> {
    let Some(registration) = tx.registrations().get_by_customer(&req.customer_id).await? else {
        return Ok((CancelResult::not_found(), Vec::new()));
    };

    if registration.idempotency_key != req.idempotency_key {
        return Err(CoreError::IdempotencyKeyMismatch.into());
    }

    authorize_cancel(tx, caller, &registration.stall_id).await?;
    let customer = load_customer(tx, &registration.customer_id).await?;

    let entries = tx.transactions().count_for_customer(&customer.id).await?
        + tx.payments().count_for_customer(&customer.id).await?;
    if entries > 0 || customer.account.balance_cents != 0 {
        return Err(CoreError::HasLedgerActivity {
            customer_id: customer.id,
        }
        .into());
    }

    let code = match customer.qr_code_id.as_deref() {
        Some(label) => tx.qr_codes().get(label).await?,
        None => None,
    };

    let now = Utc::now();
    let held_by_customer = |c: &&QrCode| {
        c.status == QrStatus::Assigned
            && c.assigned_customer_id.as_deref() == Some(customer.id.as_str())
    };
    if let Some(code) = code.as_ref().filter(held_by_customer) {
        qr_registry::release(tx, code, now).await?;
    }

    tx.registrations().delete(&registration.id).await?;
    tx.customers().delete(&customer.id, customer.version).await?;

    info!(
        customer_id = %customer.id,
        registration_id = %registration.id,
        cancelled_by = %caller.operator_id,
        "Registration cancelled"
    );

    let event = LedgerEvent::RegistrationCancelled {
        stall_id: registration.stall_id.clone(),
    };
    let message = format!("registration of customer {} cancelled", customer.id);
    Ok((CancelResult::cancelled(message), vec![event]))
}
