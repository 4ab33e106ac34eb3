//! # Request Schemas
//!
//! Strongly-typed inputs and results of every orchestrated operation.
//! Each request implements [`Validate`]; the orchestrator calls it before
//! opening a store transaction, so malformed input never reaches a read.
//!
//! Results are serialized into the idempotency record, which is how a replay
//! returns the original answer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Customer, PaymentMethod, QrBatch, StallType};
use crate::validation::{
    validate_amount_cents, validate_batch_count, validate_id, validate_idempotency_key,
    validate_name, validate_phone, validate_qr_label, ValidationResult,
};

/// Boundary validation for request schemas.
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

fn validate_operator_name(name: &Option<String>) -> ValidationResult<()> {
    match name {
        Some(name) => validate_name("operatorName", name),
        None => Ok(()),
    }
}

// =============================================================================
// Ledger Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSaleRequest {
    /// Label scanned from the customer's QR code.
    pub qr_code_id: String,
    pub amount_cents: i64,
    pub idempotency_key: String,
    /// Stall the operator is selling at; must match their assignment.
    pub stall_id: String,
    /// Display name recorded on the entry. Defaults to the assignment's user name.
    #[serde(default)]
    pub operator_name: Option<String>,
}

impl Validate for ProcessSaleRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_qr_label("qrCodeId", &self.qr_code_id)?;
        validate_amount_cents(self.amount_cents)?;
        validate_idempotency_key(&self.idempotency_key)?;
        validate_id("stallId", &self.stall_id)?;
        validate_operator_name(&self.operator_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRefundRequest {
    /// Customer (account) id the refund is credited to.
    pub account_id: String,
    pub amount_cents: i64,
    /// The sale being refunded.
    pub refund_of_txn_id: String,
    pub idempotency_key: String,
    #[serde(default)]
    pub operator_name: Option<String>,
}

impl Validate for ProcessRefundRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_id("accountId", &self.account_id)?;
        validate_amount_cents(self.amount_cents)?;
        validate_id("refundOfTxnId", &self.refund_of_txn_id)?;
        validate_idempotency_key(&self.idempotency_key)?;
        validate_operator_name(&self.operator_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCheckoutRequest {
    pub qr_code_id: String,
    pub payment_method: PaymentMethod,
    /// Must equal the outstanding balance exactly.
    pub amount_cents: i64,
    pub idempotency_key: String,
}

impl Validate for ProcessCheckoutRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_qr_label("qrCodeId", &self.qr_code_id)?;
        validate_amount_cents(self.amount_cents)?;
        validate_idempotency_key(&self.idempotency_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    /// Unassigned code handed to the new customer.
    pub qr_code_id: String,
    pub customer_name: String,
    pub phone: String,
    pub stall_id: String,
    pub idempotency_key: String,
}

impl Validate for CreateCustomerRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_qr_label("qrCodeId", &self.qr_code_id)?;
        validate_name("customerName", &self.customer_name)?;
        validate_phone(&self.phone)?;
        validate_id("stallId", &self.stall_id)?;
        validate_idempotency_key(&self.idempotency_key)
    }
}

// =============================================================================
// Cancellations
// =============================================================================

/// Cancels the sale or refund written under `idempotency_key`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CancelTransactionRequest {
    pub idempotency_key: String,
}

impl Validate for CancelTransactionRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_idempotency_key(&self.idempotency_key)
    }
}

/// Cancels the checkout payment written under `idempotency_key`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CancelPaymentRequest {
    pub idempotency_key: String,
}

impl Validate for CancelPaymentRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_idempotency_key(&self.idempotency_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CancelRegistrationRequest {
    pub customer_id: String,
    /// Must match the key the registration was created with.
    pub idempotency_key: String,
}

impl Validate for CancelRegistrationRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_id("customerId", &self.customer_id)?;
        validate_idempotency_key(&self.idempotency_key)
    }
}

// =============================================================================
// Admin Requests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQrBatchRequest {
    pub count: i64,
    pub batch_name: String,
}

impl Validate for GenerateQrBatchRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_batch_count(self.count)?;
        validate_name("batchName", &self.batch_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReissueQrRequest {
    pub customer_id: String,
    pub new_label: String,
}

impl Validate for ReissueQrRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_id("customerId", &self.customer_id)?;
        validate_qr_label("newLabel", &self.new_label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateStallRequest {
    pub name: String,
    pub stall_type: StallType,
}

impl Validate for CreateStallRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AssignOperatorRequest {
    pub operator_id: String,
    pub stall_id: String,
    pub user_name: String,
}

impl Validate for AssignOperatorRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_id("operatorId", &self.operator_id)?;
        validate_id("stallId", &self.stall_id)?;
        validate_name("userName", &self.user_name)
    }
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleResult {
    pub transaction_id: String,
    pub customer_id: String,
    pub new_balance_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub refund_id: String,
    pub customer_id: String,
    pub new_balance_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub payment_id: String,
    pub customer_id: String,
    pub amount_cents: i64,
}

/// Outcome of a cancellation. A missing target is a soft success
/// (`success = false`), not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CancelResult {
    pub success: bool,
    pub message: String,
}

impl CancelResult {
    pub fn cancelled(message: impl Into<String>) -> Self {
        CancelResult {
            success: true,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        CancelResult {
            success: false,
            message: "not found".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QrBatchResult {
    pub batch: QrBatch,
    /// Labels created by this call, in generation order.
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReissueResult {
    pub customer: Customer,
    pub old_label: Option<String>,
    pub new_label: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn sale() -> ProcessSaleRequest {
        ProcessSaleRequest {
            qr_code_id: "QR-000001".to_string(),
            amount_cents: 5000,
            idempotency_key: "sale-key-0001".to_string(),
            stall_id: "stall-food".to_string(),
            operator_name: None,
        }
    }

    #[test]
    fn test_sale_request_validation() {
        assert!(sale().validate().is_ok());

        let mut bad = sale();
        bad.amount_cents = 0;
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::MustBePositive { .. })
        ));

        let mut bad = sale();
        bad.stall_id = String::new();
        assert!(matches!(bad.validate(), Err(ValidationError::Required { .. })));
    }

    #[test]
    fn test_sale_request_deserializes_camel_case() {
        let json = r#"{
            "qrCodeId": "QR-000001",
            "amountCents": 1250,
            "idempotencyKey": "abcdefgh-1",
            "stallId": "s-1"
        }"#;
        let req: ProcessSaleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.amount_cents, 1250);
        assert!(req.operator_name.is_none());
    }

    #[test]
    fn test_checkout_request_payment_method() {
        let json = r#"{
            "qrCodeId": "QR-000001",
            "paymentMethod": "card",
            "amountCents": 3000,
            "idempotencyKey": "checkout-0001"
        }"#;
        let req: ProcessCheckoutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Card);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_batch_request_cap() {
        let req = GenerateQrBatchRequest {
            count: 501,
            batch_name: "gate-a".to_string(),
        };
        assert_eq!(req.validate().unwrap_err().to_string(), "Maximum is 500");
    }

    #[test]
    fn test_create_customer_validation() {
        let req = CreateCustomerRequest {
            qr_code_id: "QR-000002".to_string(),
            customer_name: "Grace Hopper".to_string(),
            phone: "+1 555 0100".to_string(),
            stall_id: "stall-reg".to_string(),
            idempotency_key: "reg-key-0001".to_string(),
        };
        assert!(req.validate().is_ok());

        let req = CreateCustomerRequest {
            customer_name: " ".to_string(),
            ..req
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_cancel_result_helpers() {
        assert!(!CancelResult::not_found().success);
        assert_eq!(CancelResult::not_found().message, "not found");
        assert!(CancelResult::cancelled("payment cancelled").success);
    }
}
