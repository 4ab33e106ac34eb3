//! # Account Ledger State Machine
//!
//! Every customer carries exactly one embedded [`Account`]. Its balance and
//! status change only through the transitions in this module; the
//! orchestrator reads the account, applies one transition, and writes it back
//! inside the same store transaction.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Account Status                                   │
//! │                                                                         │
//! │        sale                 checkout (amount == balance)               │
//! │  CLEAN ─────────► UNPAID ─────────────────────────► PAID               │
//! │    ▲               │  ▲                               │                 │
//! │    │   refund to 0 │  │ sale                          │                 │
//! │    └───────────────┘  └───────────────────────────────┘                 │
//! │   (never paid)                                                          │
//! │                                                                         │
//! │  Derived rule (after sale, refund, cancellations):                     │
//! │    balance > 0              → UNPAID                                    │
//! │    balance <= 0, paid once  → PAID                                      │
//! │    balance <= 0, never paid → CLEAN                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Account Status
// =============================================================================

/// Settlement status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Zero balance, no payment ever taken.
    Clean,
    /// Positive balance outstanding.
    Unpaid,
    /// Settled by checkout.
    Paid,
}

impl Default for AccountStatus {
    fn default() -> Self {
        AccountStatus::Clean
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Clean => write!(f, "clean"),
            AccountStatus::Unpaid => write!(f, "unpaid"),
            AccountStatus::Paid => write!(f, "paid"),
        }
    }
}

// =============================================================================
// Account
// =============================================================================

/// Per-customer balance. Embedded in [`crate::Customer`]; its id is the
/// customer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Outstanding amount in cents. Signed.
    pub balance_cents: i64,

    pub status: AccountStatus,

    /// When the most recent (still standing) checkout happened.
    #[ts(as = "Option<String>")]
    pub last_paid_at: Option<DateTime<Utc>>,
}

impl Default for Account {
    fn default() -> Self {
        Account::new()
    }
}

impl Account {
    /// A freshly registered account: clean, zero balance.
    pub fn new() -> Self {
        Account {
            balance_cents: 0,
            status: AccountStatus::Clean,
            last_paid_at: None,
        }
    }

    /// Returns the balance as Money.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    /// Status implied by a balance and payment history.
    pub fn derive_status(balance: Money, last_paid_at: Option<DateTime<Utc>>) -> AccountStatus {
        if balance.is_positive() {
            AccountStatus::Unpaid
        } else if last_paid_at.is_some() {
            AccountStatus::Paid
        } else {
            AccountStatus::Clean
        }
    }

    /// Adds `delta` to the balance and recomputes the status.
    fn shift(&mut self, delta: Money) -> CoreResult<()> {
        let balance = self
            .balance()
            .checked_add(delta)
            .ok_or_else(|| CoreError::BalanceOverflow {
                customer_id: String::new(),
            })?;
        self.balance_cents = balance.cents();
        self.status = Account::derive_status(balance, self.last_paid_at);
        Ok(())
    }

    /// Sale: `balance += amount`.
    pub fn apply_sale(&mut self, amount: Money) -> CoreResult<()> {
        self.shift(amount)
    }

    /// Refund: `balance -= amount`. The refund cap is checked separately by
    /// [`check_refund`] against the original sale.
    pub fn apply_refund(&mut self, amount: Money) -> CoreResult<()> {
        self.shift(-amount)
    }

    /// Checkout: amount must equal the balance exactly and the account must
    /// not already be paid.
    pub fn apply_checkout(
        &mut self,
        customer_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.status == AccountStatus::Paid {
            return Err(CoreError::AlreadyPaid {
                customer_id: customer_id.to_string(),
            });
        }
        if !self.balance().is_positive() {
            return Err(CoreError::NothingToSettle {
                customer_id: customer_id.to_string(),
            });
        }
        if amount != self.balance() {
            return Err(CoreError::AmountMismatch {
                balance_cents: self.balance_cents,
                requested_cents: amount.cents(),
            });
        }

        self.balance_cents = 0;
        self.status = AccountStatus::Paid;
        self.last_paid_at = Some(now);
        Ok(())
    }

    /// Undoes a sale (`balance -= amount`).
    pub fn reverse_sale(&mut self, amount: Money) -> CoreResult<()> {
        self.shift(-amount)
    }

    /// Undoes a refund (`balance += amount`).
    pub fn reverse_refund(&mut self, amount: Money) -> CoreResult<()> {
        self.shift(amount)
    }

    /// Undoes a checkout: restores the paid amount to the balance.
    ///
    /// `previous_paid_at` is the timestamp of the latest payment that is
    /// still standing after the cancelled one is removed.
    pub fn reverse_checkout(
        &mut self,
        amount: Money,
        previous_paid_at: Option<DateTime<Utc>>,
    ) -> CoreResult<()> {
        self.last_paid_at = previous_paid_at;
        self.shift(amount)
    }

    /// Attaches the customer id to an overflow error raised by a transition.
    pub fn with_customer(result: CoreResult<()>, customer_id: &str) -> CoreResult<()> {
        result.map_err(|err| match err {
            CoreError::BalanceOverflow { .. } => CoreError::BalanceOverflow {
                customer_id: customer_id.to_string(),
            },
            other => other,
        })
    }
}

// =============================================================================
// Refund Cap
// =============================================================================

/// Amount still refundable against a sale.
pub fn remaining_refundable(sale_amount: Money, already_refunded: Money) -> Money {
    let remaining = sale_amount - already_refunded;
    if remaining.is_negative() {
        Money::zero()
    } else {
        remaining
    }
}

/// Enforces `already_refunded + requested <= sale_amount`.
pub fn check_refund(sale_amount: Money, already_refunded: Money, requested: Money) -> CoreResult<()> {
    let remaining = remaining_refundable(sale_amount, already_refunded);
    if requested > remaining {
        return Err(CoreError::RefundExceedsRemaining {
            max_refund_cents: remaining.cents(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
