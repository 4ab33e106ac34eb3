//! # Seed Data Generator
//!
//! Populates a ledger database with a demo event layout for development.
//!
//! ## Usage
//! ```bash
//! # Demo stalls, operators and 200 QR codes (default)
//! cargo run -p festa-db --bin seed
//!
//! # More codes
//! cargo run -p festa-db --bin seed -- --codes 500
//!
//! # Specify database path
//! cargo run -p festa-db --bin seed -- --db ./data/festa.db
//! ```
//!
//! ## Generated Data
//! - One registration stall, one checkout stall and four commerce stalls
//! - One operator assigned to each stall (`op-1` .. `op-6`)
//! - A batch named `demo` of sequential labels `QR-000001`, `QR-000002`, ...

use chrono::Utc;
use festa_core::{Assignment, QrCode, QrStatus, Stall, StallType, MAX_QR_BATCH_SIZE};
use festa_db::{Database, DbConfig, DbResult, StoreTx};
use std::env;
use uuid::Uuid;

/// Demo stalls: (name, type, operator name).
const STALLS: &[(&str, StallType, &str)] = &[
    ("Main Gate", StallType::Registration, "Ada"),
    ("Exit Desk", StallType::Checkout, "Grace"),
    ("Tacos", StallType::Commerce, "Linus"),
    ("Lemonade", StallType::Commerce, "Barbara"),
    ("Ring Toss", StallType::Commerce, "Ken"),
    ("Churros", StallType::Commerce, "Margaret"),
];

const DEMO_BATCH: &str = "demo";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut codes: i64 = 200;
    let mut db_path = "./festa_dev.db".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--codes" | "-c" => {
                if i + 1 < args.len() {
                    codes = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Festa Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --codes <N>    Number of QR codes to generate (default: 200, max: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./festa_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }
    let codes = codes.clamp(1, MAX_QR_BATCH_SIZE);

    println!("🌱 Festa Ledger Seed Data Generator");
    println!("===================================");
    println!("Database: {}", db_path);
    println!("QR codes: {}", codes);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut tx = db.begin().await?;

    let existing = tx.stalls().list().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} stalls", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    seed_stalls(&mut tx).await?;
    println!("✓ Created {} stalls with assigned operators", STALLS.len());

    seed_codes(&mut tx, codes).await?;
    println!("✓ Generated {} QR codes in batch '{}'", codes, DEMO_BATCH);

    tx.commit().await?;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

async fn seed_stalls(tx: &mut StoreTx) -> DbResult<()> {
    let now = Utc::now();

    for (idx, (name, stall_type, operator)) in STALLS.iter().enumerate() {
        let stall = Stall {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            stall_type: *stall_type,
            total_amount_cents: 0,
            created_at: now,
        };
        tx.stalls().insert(&stall).await?;

        tx.assignments()
            .upsert(&Assignment {
                operator_id: format!("op-{}", idx + 1),
                stall_id: stall.id.clone(),
                stall_name: stall.name.clone(),
                stall_type: stall.stall_type,
                user_name: operator.to_string(),
                updated_at: now,
            })
            .await?;
    }

    Ok(())
}

async fn seed_codes(tx: &mut StoreTx, count: i64) -> DbResult<()> {
    let now = Utc::now();
    tx.qr_codes()
        .upsert_batch(DEMO_BATCH, "seed", count, now)
        .await?;

    for n in 1..=count {
        tx.qr_codes()
            .insert(&QrCode {
                label: format!("QR-{:06}", n),
                status: QrStatus::Unassigned,
                assigned_customer_id: None,
                batch_id: Some(DEMO_BATCH.to_string()),
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    Ok(())
}
