//! Stall/operator assignment resolver.
//!
//! Every ledger write names a stall, and the acting operator must be
//! assigned to it. Sales and registrations compare against the request's
//! stall id, refunds against the stall the original sale was recorded at.

use festa_core::{Assignment, CoreError};
use festa_db::StoreTx;

use crate::error::LedgerResult;

/// Loads the operator's assignment or fails `OperatorNotAssigned`.
pub async fn resolve(tx: &mut StoreTx, operator_id: &str) -> LedgerResult<Assignment> {
    tx.assignments().get(operator_id).await?.ok_or_else(|| {
        CoreError::OperatorNotAssigned {
            operator_id: operator_id.to_string(),
        }
        .into()
    })
}

/// Checks that `assignment` covers `stall_id`.
pub fn authorize(assignment: &Assignment, stall_id: &str) -> LedgerResult<()> {
    if assignment.stall_id != stall_id {
        return Err(CoreError::StallMismatch {
            assigned: assignment.stall_id.clone(),
            requested: stall_id.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Resolves and authorizes in one step.
pub async fn authorize_operator(
    tx: &mut StoreTx,
    operator_id: &str,
    stall_id: &str,
) -> LedgerResult<Assignment> {
    let assignment = resolve(tx, operator_id).await?;
    authorize(&assignment, stall_id)?;
    Ok(assignment)
}
