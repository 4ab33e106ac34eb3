//! # QR Code Rules
//!
//! Label format and lifecycle transitions for QR codes. Collision checks
//! against existing codes need the store, so the registry in `festa-ledger`
//! drives [`candidate_label`] in a bounded loop.
//!
//! ## Lifecycle
//! ```text
//!                 assign                 void / mark_lost
//!  UNASSIGNED ─────────────► ASSIGNED ─────────────────────► VOID | LOST
//!      │                        │                             (terminal)
//!      │    void / mark_lost    │ reissue (old code voided)
//!      └────────────────────────┴──────────────────────────►
//! ```

use rand::Rng;

use crate::error::{CoreError, CoreResult};
use crate::types::{QrCode, QrStatus};

/// Tag every generated label starts with.
pub const QR_LABEL_PREFIX: &str = "QR-";

/// Number of random decimal digits after the prefix.
pub const QR_LABEL_DIGITS: usize = 6;

/// Default collision-retry bound for label generation.
pub const DEFAULT_LABEL_ATTEMPTS: u32 = 8;

/// Produces one random label candidate, e.g. `QR-042317`.
pub fn candidate_label<R: Rng + ?Sized>(rng: &mut R) -> String {
    let n: u32 = rng.gen_range(0..1_000_000);
    format!("{}{:0width$}", QR_LABEL_PREFIX, n, width = QR_LABEL_DIGITS)
}

/// True when `label` has the generated shape (prefix + six digits).
pub fn is_generated_label(label: &str) -> bool {
    match label.strip_prefix(QR_LABEL_PREFIX) {
        Some(digits) => digits.len() == QR_LABEL_DIGITS && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Actions that move a QR code between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrAction {
    Assign,
    Void,
    MarkLost,
}

impl QrAction {
    fn verb(&self) -> &'static str {
        match self {
            QrAction::Assign => "assign",
            QrAction::Void => "void",
            QrAction::MarkLost => "mark lost",
        }
    }
}

/// Returns the status `code` moves to under `action`, or why it can't.
pub fn transition(code: &QrCode, action: QrAction) -> CoreResult<QrStatus> {
    match (code.status, action) {
        (QrStatus::Unassigned, QrAction::Assign) => Ok(QrStatus::Assigned),
        (_, QrAction::Assign) => Err(CoreError::QrCodeUnavailable {
            label: code.label.clone(),
            status: code.status.to_string(),
        }),
        (QrStatus::Unassigned | QrStatus::Assigned, QrAction::Void) => Ok(QrStatus::Void),
        (QrStatus::Unassigned | QrStatus::Assigned, QrAction::MarkLost) => Ok(QrStatus::Lost),
        (QrStatus::Void | QrStatus::Lost, _) => Err(CoreError::InvalidQrTransition {
            label: code.label.clone(),
            status: code.status.to_string(),
            action: action.verb(),
        }),
    }
}

/// A sale or checkout may only proceed on an assigned code.
pub fn ensure_assigned(code: &QrCode) -> CoreResult<&str> {
    match (code.status, code.assigned_customer_id.as_deref()) {
        (QrStatus::Assigned, Some(customer_id)) => Ok(customer_id),
        _ => Err(CoreError::QrCodeNotAssigned {
            label: code.label.clone(),
            status: code.status.to_string(),
        }),
    }
}
