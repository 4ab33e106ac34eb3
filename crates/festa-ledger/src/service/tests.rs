use festa_core::{
    AccountStatus, CreateCustomerRequest, Customer, ErrorKind, PaymentMethod, QrStatus, Role,
    StallType, TransactionType,
};
use festa_db::DbConfig;

use super::*;
use crate::idempotency::Outcome;

struct Harness {
    service: LedgerService,
    admin: Caller,
    registrar: Caller,
    cashier: Caller,
    tacos_op: Caller,
    lemon_op: Caller,
    reg_stall: String,
    tacos: String,
    lemonade: String,
    exit: String,
    codes: Vec<String>,
}

async fn harness() -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    harness_on(db, LedgerConfig::default()).await
}

async fn harness_on(db: Database, config: LedgerConfig) -> Harness {
    let (service, _task) = LedgerService::start(db, &config);
    let admin = Caller::new("admin-1", "Root", Role::Admin);

    let mut stall_ids = Vec::new();
    for (name, stall_type, operator) in [
        ("Main Gate", StallType::Registration, "op-reg"),
        ("Exit Desk", StallType::Checkout, "op-cash"),
        ("Tacos", StallType::Commerce, "op-tacos"),
        ("Lemonade", StallType::Commerce, "op-lemon"),
    ] {
        let stall = service
            .create_stall(
                &admin,
                CreateStallRequest {
                    name: name.to_string(),
                    stall_type,
                },
            )
            .await
            .unwrap();
        service
            .assign_operator(
                &admin,
                AssignOperatorRequest {
                    operator_id: operator.to_string(),
                    stall_id: stall.id.clone(),
                    user_name: format!("{name} operator"),
                },
            )
            .await
            .unwrap();
        stall_ids.push(stall.id);
    }

    let batch = service
        .generate_qr_batch(
            &admin,
            GenerateQrBatchRequest {
                count: 10,
                batch_name: "test".to_string(),
            },
        )
        .await
        .unwrap();

    Harness {
        service,
        admin,
        registrar: Caller::new("op-reg", "Ada", Role::Operator),
        cashier: Caller::new("op-cash", "Grace", Role::Operator),
        tacos_op: Caller::new("op-tacos", "Linus", Role::Operator),
        lemon_op: Caller::new("op-lemon", "Barbara", Role::Operator),
        reg_stall: stall_ids[0].clone(),
        exit: stall_ids[1].clone(),
        tacos: stall_ids[2].clone(),
        lemonade: stall_ids[3].clone(),
        codes: batch.codes,
    }
}

fn customer_request(h: &Harness, label: &str, key: &str) -> CreateCustomerRequest {
    CreateCustomerRequest {
        qr_code_id: label.to_string(),
        customer_name: "Grace Hopper".to_string(),
        phone: "+1 555 0100".to_string(),
        stall_id: h.reg_stall.clone(),
        idempotency_key: key.to_string(),
    }
}

async fn register(h: &Harness, label: &str, key: &str) -> Customer {
    h.service
        .create_customer(&h.registrar, customer_request(h, label, key))
        .await
        .unwrap()
        .into_result()
        .unwrap()
}

fn sale_request(h: &Harness, label: &str, amount_cents: i64, key: &str) -> ProcessSaleRequest {
    ProcessSaleRequest {
        qr_code_id: label.to_string(),
        amount_cents,
        idempotency_key: key.to_string(),
        stall_id: h.tacos.clone(),
        operator_name: None,
    }
}

async fn sell(h: &Harness, label: &str, amount_cents: i64, key: &str) -> SaleResult {
    h.service
        .process_sale(&h.tacos_op, sale_request(h, label, amount_cents, key))
        .await
        .unwrap()
        .into_result()
        .unwrap()
}

fn refund_request(customer_id: &str, sale_id: &str, amount_cents: i64, key: &str) -> ProcessRefundRequest {
    ProcessRefundRequest {
        account_id: customer_id.to_string(),
        amount_cents,
        refund_of_txn_id: sale_id.to_string(),
        idempotency_key: key.to_string(),
        operator_name: None,
    }
}

fn checkout_request(label: &str, amount_cents: i64, key: &str) -> ProcessCheckoutRequest {
    ProcessCheckoutRequest {
        qr_code_id: label.to_string(),
        payment_method: PaymentMethod::Cash,
        amount_cents,
        idempotency_key: key.to_string(),
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_sale_refund_checkout_scenario() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;
    assert_eq!(customer.account.status, AccountStatus::Clean);

    let sale = sell(&h, &label, 5000, "sale-key-0001").await;
    assert_eq!(sale.new_balance_cents, 5000);
    let account = h.service.get_customer(&customer.id).await.unwrap().account;
    assert_eq!(account.status, AccountStatus::Unpaid);

    let refund = h
        .service
        .process_refund(
            &h.tacos_op,
            refund_request(&customer.id, &sale.transaction_id, 2000, "refund-key-0001"),
        )
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(refund.new_balance_cents, 3000);
    let account = h.service.get_customer(&customer.id).await.unwrap().account;
    assert_eq!(account.status, AccountStatus::Unpaid);

    let first = h
        .service
        .process_checkout(&h.cashier, checkout_request(&label, 3000, "checkout-key-0001"))
        .await
        .unwrap();
    assert!(first.is_processed());

    let after = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(after.account.balance_cents, 0);
    assert_eq!(after.account.status, AccountStatus::Paid);
    assert!(after.account.last_paid_at.is_some());

    let replay = h
        .service
        .process_checkout(&h.cashier, checkout_request(&label, 3000, "checkout-key-0001"))
        .await
        .unwrap();
    assert_eq!(replay, Outcome::AlreadyProcessed(first.into_result()));

    // Ledger reconciles: sale - refund - settlement = balance.
    let mut tx = h.service.database().begin().await.unwrap();
    let settlements = tx
        .transactions()
        .list_for_customer(&customer.id, TransactionType::Settlement)
        .await
        .unwrap();
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].amount_cents, 3000);
    assert_eq!(tx.payments().count_for_customer(&customer.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_batch_over_limit_creates_nothing() {
    let h = harness().await;

    let err = h
        .service
        .generate_qr_batch(
            &h.admin,
            GenerateQrBatchRequest {
                count: 501,
                batch_name: "too-big".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.public_message(), "Maximum is 500");

    let mut tx = h.service.database().begin().await.unwrap();
    assert!(tx.qr_codes().get_batch("too-big").await.unwrap().is_none());
    assert_eq!(tx.qr_codes().count_by_status(QrStatus::Unassigned).await.unwrap(), 10);
}

#[tokio::test]
async fn test_admin_operations_require_admin() {
    let h = harness().await;

    let err = h
        .service
        .generate_qr_batch(
            &h.tacos_op,
            GenerateQrBatchRequest {
                count: 1,
                batch_name: "sneaky".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h.service.void_qr(&h.tacos_op, &h.codes[0]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h.service.rebuild_live_stats(&h.tacos_op).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

// =============================================================================
// Idempotency & Validation
// =============================================================================

#[tokio::test]
async fn test_sale_replay_applies_once() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;

    let first = h
        .service
        .process_sale(&h.tacos_op, sale_request(&h, &label, 1500, "sale-key-0001"))
        .await
        .unwrap();
    let second = h
        .service
        .process_sale(&h.tacos_op, sale_request(&h, &label, 1500, "sale-key-0001"))
        .await
        .unwrap();

    assert!(first.is_processed());
    assert!(!second.is_processed());
    assert_eq!(first.result(), second.result());

    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 1500);

    let mut tx = h.service.database().begin().await.unwrap();
    assert_eq!(tx.transactions().count_for_customer(&customer.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_create_customer_replay_and_taken_code() {
    let h = harness().await;
    let label = h.codes[0].clone();

    let first = h
        .service
        .create_customer(&h.registrar, customer_request(&h, &label, "reg-key-0001"))
        .await
        .unwrap();
    let replay = h
        .service
        .create_customer(&h.registrar, customer_request(&h, &label, "reg-key-0001"))
        .await
        .unwrap();
    assert!(first.is_processed());
    assert_eq!(replay, Outcome::AlreadyProcessed(first.into_result()));

    let err = h
        .service
        .create_customer(&h.registrar, customer_request(&h, &label, "reg-key-0002"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let err = h
        .service
        .create_customer(&h.registrar, customer_request(&h, "QR-NOPE", "reg-key-0003"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut tx = h.service.database().begin().await.unwrap();
    assert_eq!(tx.customers().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_sale_rejections() {
    let h = harness().await;
    let label = h.codes[0].clone();
    register(&h, &label, "reg-key-0001").await;

    let err = h
        .service
        .process_sale(&h.tacos_op, sale_request(&h, &label, 0, "sale-key-0001"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = h
        .service
        .process_sale(&h.tacos_op, sale_request(&h, "QR-999999", 100, "sale-key-0002"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let padded = format!(" {label}");
    let err = h
        .service
        .process_sale(&h.tacos_op, sale_request(&h, &padded, 100, "sale-key-0006"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let unassigned = h.codes[1].clone();
    let err = h
        .service
        .process_sale(&h.tacos_op, sale_request(&h, &unassigned, 100, "sale-key-0003"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let err = h
        .service
        .process_sale(&h.lemon_op, sale_request(&h, &label, 100, "sale-key-0004"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let stranger = Caller::new("op-ghost", "Ghost", Role::Operator);
    let err = h
        .service
        .process_sale(&stranger, sale_request(&h, &label, 100, "sale-key-0005"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    // Nothing was recorded, so none of the keys were consumed.
    let mut tx = h.service.database().begin().await.unwrap();
    assert!(tx.idempotency().get("sale-key-0004").await.unwrap().is_none());
}

// =============================================================================
// Refunds & Checkout
// =============================================================================

#[tokio::test]
async fn test_refund_cap() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;
    let sale = sell(&h, &label, 1000, "sale-key-0001").await;

    h.service
        .process_refund(
            &h.tacos_op,
            refund_request(&customer.id, &sale.transaction_id, 600, "refund-key-0001"),
        )
        .await
        .unwrap();

    let err = h
        .service
        .process_refund(
            &h.tacos_op,
            refund_request(&customer.id, &sale.transaction_id, 500, "refund-key-0002"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert_eq!(
        err.public_message(),
        "Refund amount exceeds remaining balance. Maximum refund: 400"
    );

    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 400);
}

#[tokio::test]
async fn test_refund_target_rules() {
    let h = harness().await;
    let first = register(&h, &h.codes[0].clone(), "reg-key-0001").await;
    let second = register(&h, &h.codes[1].clone(), "reg-key-0002").await;
    let sale = sell(&h, &h.codes[0].clone(), 1000, "sale-key-0001").await;

    // Another stall's operator cannot refund it.
    let err = h
        .service
        .process_refund(
            &h.lemon_op,
            refund_request(&first.id, &sale.transaction_id, 100, "refund-key-0001"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    // The sale belongs to a different account.
    let err = h
        .service
        .process_refund(
            &h.tacos_op,
            refund_request(&second.id, &sale.transaction_id, 100, "refund-key-0002"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let err = h
        .service
        .process_refund(
            &h.tacos_op,
            refund_request(&first.id, "missing-txn", 100, "refund-key-0003"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_checkout_requires_exact_balance() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;

    let err = h
        .service
        .process_checkout(&h.cashier, checkout_request(&label, 100, "checkout-key-0001"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    sell(&h, &label, 2500, "sale-key-0001").await;
    let err = h
        .service
        .process_checkout(&h.cashier, checkout_request(&label, 2000, "checkout-key-0002"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 2500);
    assert_eq!(customer.account.status, AccountStatus::Unpaid);
}

#[tokio::test]
async fn test_sale_after_checkout_reopens_account() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;

    sell(&h, &label, 800, "sale-key-0001").await;
    h.service
        .process_checkout(&h.cashier, checkout_request(&label, 800, "checkout-key-0001"))
        .await
        .unwrap();
    sell(&h, &label, 300, "sale-key-0002").await;

    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 300);
    assert_eq!(customer.account.status, AccountStatus::Unpaid);
}

// =============================================================================
// Cancellations
// =============================================================================

#[tokio::test]
async fn test_cancel_transaction() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;
    sell(&h, &label, 1200, "sale-key-0001").await;

    // Only the stall's operator or an admin.
    let err = h
        .service
        .cancel_transaction(
            &h.lemon_op,
            CancelTransactionRequest {
                idempotency_key: "sale-key-0001".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let result = h
        .service
        .cancel_transaction(
            &h.tacos_op,
            CancelTransactionRequest {
                idempotency_key: "sale-key-0001".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(result.success);

    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 0);
    assert_eq!(customer.account.status, AccountStatus::Clean);

    let again = h
        .service
        .cancel_transaction(
            &h.admin,
            CancelTransactionRequest {
                idempotency_key: "sale-key-0001".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(again, CancelResult::not_found());
}

#[tokio::test]
async fn test_cancel_sale_with_refunds_is_rejected() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;
    let sale = sell(&h, &label, 1000, "sale-key-0001").await;
    h.service
        .process_refund(
            &h.tacos_op,
            refund_request(&customer.id, &sale.transaction_id, 100, "refund-key-0001"),
        )
        .await
        .unwrap();

    let err = h
        .service
        .cancel_transaction(
            &h.admin,
            CancelTransactionRequest {
                idempotency_key: "sale-key-0001".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    // Cancelling the refund first restores the balance.
    h.service
        .cancel_transaction(
            &h.admin,
            CancelTransactionRequest {
                idempotency_key: "refund-key-0001".to_string(),
            },
        )
        .await
        .unwrap();
    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 1000);
}

#[tokio::test]
async fn test_cancel_payment_restores_balance() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;
    sell(&h, &label, 2000, "sale-key-0001").await;
    h.service
        .process_checkout(&h.cashier, checkout_request(&label, 2000, "checkout-key-0001"))
        .await
        .unwrap();

    // A checkout key does not name a cancellable transaction.
    let err = h
        .service
        .cancel_transaction(
            &h.admin,
            CancelTransactionRequest {
                idempotency_key: "checkout-key-0001".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let result = h
        .service
        .cancel_payment(
            &h.cashier,
            CancelPaymentRequest {
                idempotency_key: "checkout-key-0001".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(result.success);

    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 2000);
    assert_eq!(customer.account.status, AccountStatus::Unpaid);
    assert!(customer.account.last_paid_at.is_none());

    let mut tx = h.service.database().begin().await.unwrap();
    let settlements = tx
        .transactions()
        .list_for_customer(&customer.id, TransactionType::Settlement)
        .await
        .unwrap();
    assert!(settlements.is_empty());
}

#[tokio::test]
async fn test_cancel_registration() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;

    let err = h
        .service
        .cancel_registration(
            &h.registrar,
            CancelRegistrationRequest {
                customer_id: customer.id.clone(),
                idempotency_key: "reg-key-9999".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert_eq!(err.public_message(), "idempotency key mismatch");

    let result = h
        .service
        .cancel_registration(
            &h.registrar,
            CancelRegistrationRequest {
                customer_id: customer.id.clone(),
                idempotency_key: "reg-key-0001".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(result.success);

    let err = h.service.get_customer(&customer.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The code is back in the pool.
    let again = register(&h, &label, "reg-key-0002").await;
    assert_eq!(again.qr_code_id.as_deref(), Some(label.as_str()));
}

#[tokio::test]
async fn test_cancel_registration_with_activity_is_rejected() {
    let h = harness().await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;
    sell(&h, &label, 100, "sale-key-0001").await;

    let err = h
        .service
        .cancel_registration(
            &h.admin,
            CancelRegistrationRequest {
                customer_id: customer.id.clone(),
                idempotency_key: "reg-key-0001".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

// =============================================================================
// QR Administration
// =============================================================================

#[tokio::test]
async fn test_reissue_and_retire() {
    let h = harness().await;
    let old = h.codes[0].clone();
    let new = h.codes[1].clone();
    let customer = register(&h, &old, "reg-key-0001").await;

    let result = h
        .service
        .reissue_qr(
            &h.admin,
            ReissueQrRequest {
                customer_id: customer.id.clone(),
                new_label: new.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(result.old_label.as_deref(), Some(old.as_str()));

    // Sales follow the new code; the old one is void.
    sell(&h, &new, 400, "sale-key-0001").await;
    let err = h
        .service
        .process_sale(&h.tacos_op, sale_request(&h, &old, 400, "sale-key-0002"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    let lost = h.service.mark_qr_lost(&h.admin, &h.codes[2]).await.unwrap();
    assert_eq!(lost.status, QrStatus::Lost);
    let err = h.service.void_qr(&h.admin, &h.codes[2]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

// =============================================================================
// Projector
// =============================================================================

#[tokio::test]
async fn test_projected_stats_match_rebuild() {
    let h = harness().await;
    let a = register(&h, &h.codes[0].clone(), "reg-key-0001").await;
    register(&h, &h.codes[1].clone(), "reg-key-0002").await;
    let third = register(&h, &h.codes[2].clone(), "reg-key-0003").await;

    let sale = sell(&h, &h.codes[0].clone(), 5000, "sale-key-0001").await;
    sell(&h, &h.codes[1].clone(), 700, "sale-key-0002").await;
    h.service
        .process_sale(
            &h.lemon_op,
            ProcessSaleRequest {
                stall_id: h.lemonade.clone(),
                ..sale_request(&h, &h.codes[1], 900, "sale-key-0003")
            },
        )
        .await
        .unwrap();
    h.service
        .process_refund(
            &h.tacos_op,
            refund_request(&a.id, &sale.transaction_id, 2000, "refund-key-0001"),
        )
        .await
        .unwrap();
    h.service
        .process_checkout(&h.cashier, checkout_request(&h.codes[0], 3000, "checkout-key-0001"))
        .await
        .unwrap();
    h.service
        .cancel_transaction(
            &h.admin,
            CancelTransactionRequest {
                idempotency_key: "sale-key-0002".to_string(),
            },
        )
        .await
        .unwrap();
    h.service
        .cancel_registration(
            &h.admin,
            CancelRegistrationRequest {
                customer_id: third.id.clone(),
                idempotency_key: "reg-key-0003".to_string(),
            },
        )
        .await
        .unwrap();

    h.service.projector().flush().await.unwrap();
    let projected = h.service.live_stats().await.unwrap();
    let projected_stalls = {
        let mut tx = h.service.database().begin().await.unwrap();
        tx.stalls().list().await.unwrap()
    };

    assert_eq!(projected.total_sales, 2);
    assert_eq!(projected.total_revenue_cents, 5000 + 900 - 2000);
    assert_eq!(projected.total_customers_registered, 2);
    assert_eq!(projected.total_customers, 2);
    assert_eq!(projected.total_checkout_amount_cents, 3000);
    assert_eq!(projected.top_performing_stall.as_deref(), Some(h.tacos.as_str()));

    let rebuilt = h.service.rebuild_live_stats(&h.admin).await.unwrap();
    assert_eq!(rebuilt.total_sales, projected.total_sales);
    assert_eq!(rebuilt.total_revenue_cents, projected.total_revenue_cents);
    assert_eq!(
        rebuilt.total_customers_registered,
        projected.total_customers_registered
    );
    assert_eq!(rebuilt.total_customers, projected.total_customers);
    assert_eq!(
        rebuilt.total_checkout_amount_cents,
        projected.total_checkout_amount_cents
    );
    assert_eq!(rebuilt.top_performing_stall, projected.top_performing_stall);

    let mut tx = h.service.database().begin().await.unwrap();
    let rebuilt_stalls = tx.stalls().list().await.unwrap();
    let totals = |stalls: &[Stall]| {
        stalls
            .iter()
            .map(|s| (s.id.clone(), s.total_amount_cents))
            .collect::<Vec<_>>()
    };
    assert_eq!(totals(&rebuilt_stalls), totals(&projected_stalls));

    let exit = rebuilt_stalls.iter().find(|s| s.id == h.exit).unwrap();
    assert_eq!(exit.total_amount_cents, 3000);
    let reg = rebuilt_stalls.iter().find(|s| s.id == h.reg_stall).unwrap();
    assert_eq!(reg.total_amount_cents, 0);
    drop(tx);

    let top = h.service.update_top_stall(&h.admin).await.unwrap();
    assert_eq!(top.top_performing_stall.as_deref(), Some(h.tacos.as_str()));
}

// =============================================================================
// Concurrency
// =============================================================================

async fn file_harness(dir: &tempfile::TempDir) -> Harness {
    let mut config = LedgerConfig::default();
    config.database.path = dir.path().join("ledger.db");
    config.database.max_connections = 8;
    config.retry.max_attempts = 200;
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 40;

    let db = Database::new(config.db_config()).await.unwrap();
    harness_on(db, config).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_sales_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir).await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;

    let mut tasks = Vec::new();
    for n in 0..16 {
        let service = h.service.clone();
        let caller = h.tacos_op.clone();
        let req = sale_request(&h, &label, 100, &format!("parallel-sale-{n:04}"));
        tasks.push(tokio::spawn(async move {
            service.process_sale(&caller, req).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_processed());
    }

    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 1600);
    assert_eq!(customer.version, 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_duplicates_apply_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = file_harness(&dir).await;
    let label = h.codes[0].clone();
    let customer = register(&h, &label, "reg-key-0001").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = h.service.clone();
        let caller = h.tacos_op.clone();
        let req = sale_request(&h, &label, 250, "duplicate-sale-0001");
        tasks.push(tokio::spawn(async move {
            service.process_sale(&caller, req).await
        }));
    }

    let mut processed = 0;
    for task in tasks {
        if task.await.unwrap().unwrap().is_processed() {
            processed += 1;
        }
    }
    assert_eq!(processed, 1);

    let customer = h.service.get_customer(&customer.id).await.unwrap();
    assert_eq!(customer.account.balance_cents, 250);

    h.service.projector().flush().await.unwrap();
    assert_eq!(h.service.live_stats().await.unwrap().total_sales, 1);
}
