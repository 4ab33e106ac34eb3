//! # Domain Types
//!
//! Ledger entities shared by the store, the orchestrator and the API.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ledger Entities                                 │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     QrCode      │   │    Customer     │   │ LedgerTransaction│      │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  label (PK)     │◄──│  qr_code_id     │◄──│  customer_id    │       │
//! │  │  status         │   │  account {..}   │   │  txn_type       │       │
//! │  │  assigned_to ───┼──►│  version        │   │  refund_of ─────┼─┐     │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘ │     │
//! │                               ▲   ▲                 ▲            │     │
//! │  ┌─────────────────┐          │   │                 └────────────┘     │
//! │  │  Registration   │──────────┘   │                                    │
//! │  └─────────────────┘   ┌──────────┴──────┐   ┌─────────────────┐       │
//! │                        │     Payment     │   │   Assignment    │       │
//! │                        └─────────────────┘   │ operator→stall  │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ledger entries (transactions, payments, registrations) are immutable once
//! written. The only mutable documents on the ledger path are the customer's
//! embedded account and the QR code status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::account::Account;
use crate::money::Money;

// =============================================================================
// Enumerations
// =============================================================================

/// Lifecycle of a scannable QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QrStatus {
    /// Printed, not yet handed to a customer.
    Unassigned,
    /// Linked to exactly one customer.
    Assigned,
    /// Withdrawn by an admin. Terminal.
    Void,
    /// Reported lost. Terminal.
    Lost,
}

impl fmt::Display for QrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QrStatus::Unassigned => write!(f, "unassigned"),
            QrStatus::Assigned => write!(f, "assigned"),
            QrStatus::Void => write!(f, "void"),
            QrStatus::Lost => write!(f, "lost"),
        }
    }
}

/// Kind of a ledger transaction entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Purchase at a stall; increases the balance.
    Sale,
    /// Partial or full return of a sale; decreases the balance.
    Refund,
    /// Reconciling entry written by checkout; carries the payment id.
    Settlement,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Sale => write!(f, "sale"),
            TransactionType::Refund => write!(f, "refund"),
            TransactionType::Settlement => write!(f, "settlement"),
        }
    }
}

/// How a checkout was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
}

/// What a stall does at the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StallType {
    /// Signs up customers and hands out QR codes.
    Registration,
    /// Settles balances.
    Checkout,
    /// Sells goods; ranked for the top-performing stall.
    Commerce,
}

impl fmt::Display for StallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StallType::Registration => write!(f, "registration"),
            StallType::Checkout => write!(f, "checkout"),
            StallType::Commerce => write!(f, "commerce"),
        }
    }
}

/// Caller role carried in the identity token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A registered attendee and their embedded account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Unique identifier (UUID v4). Also the account id.
    pub id: String,

    pub name: String,

    pub phone: String,

    /// Label of the QR code currently linked to this customer.
    pub qr_code_id: Option<String>,

    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub account: Account,

    /// Optimistic concurrency counter. Incremented on every account write.
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Ledger Entries
// =============================================================================

/// Immutable ledger entry: a sale, a refund, or a checkout settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    pub id: String,
    pub stall_id: String,
    pub operator_id: String,
    pub operator_name: String,
    pub customer_id: String,
    /// Always non-negative; the type decides the sign of the balance effect.
    pub amount_cents: i64,
    pub txn_type: TransactionType,
    /// Set iff `txn_type` is `Refund`.
    pub refund_of_txn_id: Option<String>,
    /// Set iff `txn_type` is `Settlement`.
    pub payment_id: Option<String>,
    pub idempotency_key: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Signed effect of this entry on the customer's balance.
    pub fn balance_effect(&self) -> Money {
        match self.txn_type {
            TransactionType::Sale => self.amount(),
            TransactionType::Refund | TransactionType::Settlement => -self.amount(),
        }
    }
}

/// Immutable record of a checkout payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub operator_id: String,
    pub customer_id: String,
    pub stall_id: String,
    pub idempotency_key: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Immutable record of a customer sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub customer_id: String,
    pub stall_id: String,
    pub operator_id: String,
    pub operator_name: String,
    pub qr_code_id: String,
    /// Key the registration was written under; cancellation must present it.
    pub idempotency_key: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// QR Codes
// =============================================================================

/// A scannable token linked to at most one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    /// Unique label printed on the code (e.g. `QR-042317`).
    pub label: String,
    pub status: QrStatus,
    pub assigned_customer_id: Option<String>,
    pub batch_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A named generation run. Repeated runs under one name accumulate `count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QrBatch {
    pub batch_name: String,
    pub generated_by: String,
    pub count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stalls & Assignments
// =============================================================================

/// A physical stall at the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Stall {
    pub id: String,
    pub name: String,
    pub stall_type: StallType,
    /// Projected running total (see the aggregate projector).
    pub total_amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Which stall an operator works at. Keyed by operator id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub operator_id: String,
    pub stall_id: String,
    pub stall_name: String,
    pub stall_type: StallType,
    pub user_name: String,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Idempotency
// =============================================================================

/// Write-once record of an applied client key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub key: String,
    /// Operation that first used the key (e.g. `process_sale`).
    pub operation: String,
    /// JSON echo of the first result, if one was stored.
    pub result: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Live Statistics
// =============================================================================

/// Global aggregate document, maintained by the projector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    /// Number of sale entries.
    pub total_sales: i64,
    /// Sales minus refunds, in cents.
    pub total_revenue_cents: i64,
    pub total_customers_registered: i64,
    /// Id of the commerce stall with the highest total.
    pub top_performing_stall: Option<String>,
    /// Sum of checkout payments, in cents.
    pub total_checkout_amount_cents: i64,
    pub total_customers: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(txn_type: TransactionType, amount_cents: i64) -> LedgerTransaction {
        LedgerTransaction {
            id: "t-1".to_string(),
            stall_id: "s-1".to_string(),
            operator_id: "op-1".to_string(),
            operator_name: "Ada".to_string(),
            customer_id: "c-1".to_string(),
            amount_cents,
            txn_type,
            refund_of_txn_id: None,
            payment_id: None,
            idempotency_key: "key-00001".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balance_effect_sign() {
        assert_eq!(entry(TransactionType::Sale, 500).balance_effect().cents(), 500);
        assert_eq!(entry(TransactionType::Refund, 200).balance_effect().cents(), -200);
        assert_eq!(
            entry(TransactionType::Settlement, 300).balance_effect().cents(),
            -300
        );
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&QrStatus::Unassigned).unwrap(), "\"unassigned\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::Mobile).unwrap(), "\"mobile\"");
        assert_eq!(
            serde_json::from_str::<StallType>("\"commerce\"").unwrap(),
            StallType::Commerce
        );
        assert_eq!(TransactionType::Settlement.to_string(), "settlement");
    }

    #[test]
    fn test_customer_json_is_camel_case() {
        let now = Utc::now();
        let customer = Customer {
            id: "c-1".to_string(),
            name: "Grace".to_string(),
            phone: "+15550100".to_string(),
            qr_code_id: Some("QR-000001".to_string()),
            account: Account::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&customer).unwrap();
        assert_eq!(json["qrCodeId"], "QR-000001");
        assert_eq!(json["account"]["balanceCents"], 0);
        assert_eq!(json["account"]["status"], "clean");
    }

    #[test]
    fn test_role() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Operator.is_admin());
    }
}
