//! Fixtures shared by the repository tests.

use chrono::Utc;
use festa_core::{Account, Customer, Stall, StallType};

use crate::StoreTx;

pub async fn seed_stall(tx: &mut StoreTx, id: &str, stall_type: StallType) {
    tx.stalls()
        .insert(&Stall {
            id: id.to_string(),
            name: format!("Stall {id}"),
            stall_type,
            total_amount_cents: 0,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

pub async fn seed_customer(tx: &mut StoreTx, id: &str, label: &str) {
    let now = Utc::now();
    tx.customers()
        .insert(&Customer {
            id: id.to_string(),
            name: "Grace".to_string(),
            phone: "+15550100".to_string(),
            qr_code_id: Some(label.to_string()),
            account: Account::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}
