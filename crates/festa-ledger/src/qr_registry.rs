//! # QR Code Registry
//!
//! Lifecycle of scannable codes and collision-free label generation. Every
//! function here runs inside the caller's [`StoreTx`]; the status-guarded
//! updates in the store turn a concurrent transition into a conflict.
//!
//! ## Label Generation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for attempt in 1..=max_attempts                                        │
//! │      label = "QR-" + 6 random digits                                    │
//! │      exists(label)? ── no ──► return label                              │
//! │           │                                                             │
//! │          yes ──► next attempt                                           │
//! │                                                                         │
//! │  bound reached ──► LabelSpaceExhausted (ResourceExhausted)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use festa_core::qr::{self, QrAction};
use festa_core::{
    CoreError, GenerateQrBatchRequest, QrBatchResult, QrCode, QrStatus, ReissueQrRequest,
    ReissueResult,
};
use festa_db::StoreTx;

use crate::error::LedgerResult;

/// Loads a code or fails `NotFound`.
pub async fn get(tx: &mut StoreTx, label: &str) -> LedgerResult<QrCode> {
    tx.qr_codes()
        .get(label)
        .await?
        .ok_or_else(|| CoreError::not_found("QR code", label).into())
}

/// Loads a code and returns it with the customer it is assigned to.
pub async fn lookup_assigned(tx: &mut StoreTx, label: &str) -> LedgerResult<(QrCode, String)> {
    let code = get(tx, label).await?;
    let customer_id = qr::ensure_assigned(&code)?.to_string();
    Ok((code, customer_id))
}

/// Produces a label no existing code uses, drawing candidates from `rng`.
pub async fn generate_unique_label<R>(
    tx: &mut StoreTx,
    rng: &mut R,
    max_attempts: u32,
) -> LedgerResult<String>
where
    R: Rng + Send + ?Sized,
{
    for attempt in 1..=max_attempts {
        let candidate = qr::candidate_label(rng);
        if !tx.qr_codes().exists(&candidate).await? {
            return Ok(candidate);
        }
        debug!(label = %candidate, attempt, "QR label collision");
    }

    warn!(attempts = max_attempts, "QR label space exhausted");
    Err(CoreError::LabelSpaceExhausted {
        attempts: max_attempts,
    }
    .into())
}

/// Generates `req.count` unassigned codes and creates or grows the batch.
pub async fn generate_batch(
    tx: &mut StoreTx,
    req: &GenerateQrBatchRequest,
    generated_by: &str,
    label_attempts: u32,
) -> LedgerResult<QrBatchResult> {
    let now = Utc::now();
    let mut codes = Vec::with_capacity(req.count as usize);
    let mut rng = StdRng::from_entropy();

    for _ in 0..req.count {
        let label = generate_unique_label(tx, &mut rng, label_attempts).await?;
        tx.qr_codes()
            .insert(&QrCode {
                label: label.clone(),
                status: QrStatus::Unassigned,
                assigned_customer_id: None,
                batch_id: Some(req.batch_name.clone()),
                created_at: now,
                updated_at: now,
            })
            .await?;
        codes.push(label);
    }

    let batch = tx
        .qr_codes()
        .upsert_batch(&req.batch_name, generated_by, req.count, now)
        .await?;

    info!(
        batch_name = %batch.batch_name,
        generated = codes.len(),
        batch_total = batch.count,
        "Generated QR codes"
    );

    Ok(QrBatchResult { batch, codes })
}

/// Validates that `code` can be handed to a new customer.
pub fn check_assignable(code: &QrCode) -> LedgerResult<()> {
    qr::transition(code, QrAction::Assign)?;
    Ok(())
}

/// Moves an unassigned code to assigned, linked to `customer_id`.
pub async fn assign(
    tx: &mut StoreTx,
    code: &QrCode,
    customer_id: &str,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    let next = qr::transition(code, QrAction::Assign)?;
    tx.qr_codes()
        .update_status(&code.label, code.status, next, Some(customer_id), now)
        .await?;
    Ok(())
}

/// Returns an assigned code to the pool. Used when a registration is undone.
pub async fn release(tx: &mut StoreTx, code: &QrCode, now: DateTime<Utc>) -> LedgerResult<()> {
    if code.status != QrStatus::Assigned {
        return Err(CoreError::QrCodeNotAssigned {
            label: code.label.clone(),
            status: code.status.to_string(),
        }
        .into());
    }
    tx.qr_codes()
        .update_status(&code.label, QrStatus::Assigned, QrStatus::Unassigned, None, now)
        .await?;
    Ok(())
}

/// Applies a terminal transition (void or lost). The customer link is
/// kept for audit.
pub async fn retire(tx: &mut StoreTx, label: &str, action: QrAction) -> LedgerResult<QrCode> {
    let mut code = get(tx, label).await?;
    let next = qr::transition(&code, action)?;
    let now = Utc::now();

    tx.qr_codes()
        .update_status(
            &code.label,
            code.status,
            next,
            code.assigned_customer_id.as_deref(),
            now,
        )
        .await?;

    info!(label = %label, from = %code.status, to = %next, "QR code retired");
    code.status = next;
    code.updated_at = now;
    Ok(code)
}

/// Moves a customer onto a new code. The old code, if still assigned, is
/// voided; the new one must be unassigned.
pub async fn reissue(tx: &mut StoreTx, req: &ReissueQrRequest) -> LedgerResult<ReissueResult> {
    let mut customer = tx
        .customers()
        .get(&req.customer_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Customer", &req.customer_id))?;

    let old_code = match customer.qr_code_id.as_deref() {
        Some(label) => tx.qr_codes().get(label).await?,
        None => None,
    };
    let new_code = get(tx, &req.new_label).await?;
    let new_status = qr::transition(&new_code, QrAction::Assign)?;

    let now = Utc::now();

    if let Some(old) = old_code.as_ref().filter(|c| c.status == QrStatus::Assigned) {
        let voided = qr::transition(old, QrAction::Void)?;
        tx.qr_codes()
            .update_status(
                &old.label,
                old.status,
                voided,
                old.assigned_customer_id.as_deref(),
                now,
            )
            .await?;
    }

    tx.qr_codes()
        .update_status(
            &new_code.label,
            new_code.status,
            new_status,
            Some(&customer.id),
            now,
        )
        .await?;

    let version = tx
        .customers()
        .set_qr_code(&customer.id, customer.version, &new_code.label, now)
        .await?;

    let old_label = customer.qr_code_id.replace(new_code.label.clone());
    customer.version = version;
    customer.updated_at = now;

    info!(
        customer_id = %customer.id,
        old_label = ?old_label,
        new_label = %new_code.label,
        "QR code reissued"
    );

    Ok(ReissueResult {
        customer,
        old_label,
        new_label: new_code.label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use festa_core::{Account, Customer, ErrorKind};
    use festa_db::{Database, DbConfig};

    async fn insert_code(tx: &mut StoreTx, label: &str) {
        let now = Utc::now();
        tx.qr_codes()
            .insert(&QrCode {
                label: label.to_string(),
                status: QrStatus::Unassigned,
                assigned_customer_id: None,
                batch_id: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    async fn insert_customer(tx: &mut StoreTx, id: &str, label: &str) {
        let now = Utc::now();
        let code = get(tx, label).await.unwrap();
        tx.customers()
            .insert(&Customer {
                id: id.to_string(),
                name: "Ada".to_string(),
                phone: "5550100".to_string(),
                qr_code_id: Some(label.to_string()),
                account: Account::new(),
                version: 1,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        assign(tx, &code, id, now).await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_batch_accumulates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        let req = GenerateQrBatchRequest {
            count: 20,
            batch_name: "gate-a".to_string(),
        };
        let first = generate_batch(&mut tx, &req, "admin-1", 8).await.unwrap();
        assert_eq!(first.codes.len(), 20);
        assert_eq!(first.batch.count, 20);

        let second = generate_batch(&mut tx, &req, "admin-1", 8).await.unwrap();
        assert_eq!(second.batch.count, 40);

        let mut all: Vec<_> = first.codes.iter().chain(second.codes.iter()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 40);
        assert!(all.iter().all(|l| qr::is_generated_label(l)));
        assert_eq!(tx.qr_codes().count_by_status(QrStatus::Unassigned).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_zero_attempts_exhausts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        let err = generate_unique_label(&mut tx, &mut StdRng::seed_from_u64(1), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[tokio::test]
    async fn test_collisions_draw_again_until_bound() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        // The first three draws of this seed are already taken.
        let seeded = StdRng::seed_from_u64(42);
        let mut preview = seeded.clone();
        let taken: Vec<String> = (0..3).map(|_| qr::candidate_label(&mut preview)).collect();
        let fourth = qr::candidate_label(&mut preview);
        for label in &taken {
            if !tx.qr_codes().exists(label).await.unwrap() {
                insert_code(&mut tx, label).await;
            }
        }

        let label = generate_unique_label(&mut tx, &mut seeded.clone(), 4)
            .await
            .unwrap();
        assert_eq!(label, fourth);
        assert!(!taken.contains(&label));

        let err = generate_unique_label(&mut tx, &mut seeded.clone(), 3)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert!(matches!(
            err,
            crate::LedgerError::Core(CoreError::LabelSpaceExhausted { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_lookup_requires_assignment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        insert_code(&mut tx, "QR-000001").await;

        let err = lookup_assigned(&mut tx, "QR-000001").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

        let err = lookup_assigned(&mut tx, "QR-999999").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_retire_is_terminal() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        insert_code(&mut tx, "QR-000001").await;

        let code = retire(&mut tx, "QR-000001", QrAction::MarkLost).await.unwrap();
        assert_eq!(code.status, QrStatus::Lost);

        let err = retire(&mut tx, "QR-000001", QrAction::Void).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_reissue_moves_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        insert_code(&mut tx, "QR-000001").await;
        insert_code(&mut tx, "QR-000002").await;
        insert_customer(&mut tx, "c-1", "QR-000001").await;

        let result = reissue(
            &mut tx,
            &ReissueQrRequest {
                customer_id: "c-1".to_string(),
                new_label: "QR-000002".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(result.old_label.as_deref(), Some("QR-000001"));
        assert_eq!(result.customer.qr_code_id.as_deref(), Some("QR-000002"));

        let old = get(&mut tx, "QR-000001").await.unwrap();
        assert_eq!(old.status, QrStatus::Void);
        let new = get(&mut tx, "QR-000002").await.unwrap();
        assert_eq!(new.status, QrStatus::Assigned);
        assert_eq!(new.assigned_customer_id.as_deref(), Some("c-1"));

        let found = tx.customers().get_by_qr_code("QR-000002").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some("c-1".to_string()));
    }

    #[tokio::test]
    async fn test_reissue_onto_assigned_code_fails() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        insert_code(&mut tx, "QR-000001").await;
        insert_customer(&mut tx, "c-1", "QR-000001").await;

        let err = reissue(
            &mut tx,
            &ReissueQrRequest {
                customer_id: "c-1".to_string(),
                new_label: "QR-000001".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }
}
