//! Stall and assignment maintenance.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use festa_core::{AssignOperatorRequest, Assignment, CoreError, CreateStallRequest, Stall};
use festa_db::StoreTx;

use crate::error::LedgerResult;

pub(crate) async fn create_stall(tx: &mut StoreTx, req: &CreateStallRequest) -> LedgerResult<Stall> {
    let stall = Stall {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        stall_type: req.stall_type,
        total_amount_cents: 0,
        created_at: Utc::now(),
    };
    tx.stalls().insert(&stall).await?;

    info!(stall_id = %stall.id, name = %stall.name, stall_type = %stall.stall_type, "Stall created");
    Ok(stall)
}

/// Points an operator at a stall, denormalizing the stall's name and type
/// into the assignment.
pub(crate) async fn assign_operator(
    tx: &mut StoreTx,
    req: &AssignOperatorRequest,
) -> LedgerResult<Assignment> {
    let stall = tx
        .stalls()
        .get(&req.stall_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Stall", &req.stall_id))?;

    let assignment = Assignment {
        operator_id: req.operator_id.clone(),
        stall_id: stall.id,
        stall_name: stall.name,
        stall_type: stall.stall_type,
        user_name: req.user_name.trim().to_string(),
        updated_at: Utc::now(),
    };
    tx.assignments().upsert(&assignment).await?;

    info!(
        operator_id = %assignment.operator_id,
        stall_id = %assignment.stall_id,
        "Operator assigned"
    );
    Ok(assignment)
}
