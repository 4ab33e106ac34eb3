//! CreateCustomer: register a new customer on an unassigned QR code.
//!
//! Customer, registration entry, QR assignment and idempotency record are
//! written in one unit of work, so a replay after a timeout can never create
//! a second customer.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use festa_core::{Account, CreateCustomerRequest, Customer, Registration};
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
    req: &CreateCustomerRequest,
) -> LedgerResult<(Outcome<Customer>, Vec<LedgerEvent>)> {
    if let Reservation::AlreadyApplied(cached) = idempotency::check(tx, &req.idempotency_key).await? {
        return Ok((Outcome::AlreadyProcessed(cached), Vec::new()));
    }

    let code = qr_registry::get(tx, &req.qr_code_id).await?;
    qr_registry::check_assignable(&code)?;
    let assignment = assignment::authorize_operator(tx, &caller.operator_id, &req.stall_id).await?;

    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4().to_string(),
        name: req.customer_name.trim().to_string(),
        phone: req.phone.trim().to_string(),
        qr_code_id: Some(code.label.clone()),
        account: Account::new(),
        version: 0,
        created_at: now,
        updated_at: now,
    };
    let registration = Registration {
        id: Uuid::new_v4().to_string(),
        customer_id: customer.id.clone(),
        stall_id: req.stall_id.clone(),
        operator_id: caller.operator_id.clone(),
        operator_name: assignment.user_name.clone(),
        qr_code_id: code.label.clone(),
        idempotency_key: req.idempotency_key.clone(),
        created_at: now,
    };

    tx.customers().insert(&customer).await?;
    qr_registry::assign(tx, &code, &customer.id, now).await?;
    tx.registrations().insert(&registration).await?;
    idempotency::record(tx, &req.idempotency_key, "create_customer", &customer).await?;

    info!(
        customer_id = %customer.id,
        qr_code_id = %code.label,
        stall_id = %registration.stall_id,
        idempotency_key = %req.idempotency_key,
        "Customer registered"
    );

    let event = LedgerEvent::Registration {
        stall_id: registration.stall_id,
    };
    Ok((Outcome::Processed(customer), vec![event]))
}
