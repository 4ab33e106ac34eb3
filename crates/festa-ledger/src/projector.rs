//! # Aggregate Projector
//!
//! Folds committed ledger events into the derived read models: per-stall
//! totals and the single live statistics document.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Aggregate Projector                              │
//! │                                                                         │
//! │  LedgerService ──(after commit)──► publish(events)                     │
//! │                                        │ try_send                       │
//! │                                        ▼                                │
//! │                              ┌───────────────────┐                      │
//! │                              │ bounded channel   │  full/closed:        │
//! │                              │ ProjectorCommand  │  warn! and drop      │
//! │                              └─────────┬─────────┘                      │
//! │                                        ▼                                │
//! │                              ┌───────────────────┐                      │
//! │                              │  Projector task   │                      │
//! │                              │                   │                      │
//! │                              │ Event   ─► increments (one store tx)    │
//! │                              │ Rebuild ─► full re-scan, overwrite      │
//! │                              │ TopStall ─► recompute leader            │
//! │                              │ tick    ─► periodic rebuild (optional)  │
//! │                              └───────────────────┘                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Increments commute, so event order does not matter. A dropped event
//! leaves the aggregates behind until the next rebuild. An event published
//! between a rebuild's scan and its own arrival is counted twice until the
//! next rebuild.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use festa_core::{LiveStats, Stall, StallType};
use festa_db::{Database, StatsDelta, StoreTx};

use crate::config::ProjectorSettings;
use crate::error::{LedgerError, LedgerResult};
use crate::retry::{run_in_transaction, RetryPolicy};

// =============================================================================
// Events
// =============================================================================

/// A committed ledger change the aggregates must reflect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Sale { stall_id: String, amount_cents: i64 },
    Refund { stall_id: String, amount_cents: i64 },
    Payment { stall_id: String, amount_cents: i64 },
    Registration { stall_id: String },
    SaleCancelled { stall_id: String, amount_cents: i64 },
    RefundCancelled { stall_id: String, amount_cents: i64 },
    PaymentCancelled { stall_id: String, amount_cents: i64 },
    RegistrationCancelled { stall_id: String },
}

impl LedgerEvent {
    pub fn stall_id(&self) -> &str {
        match self {
            LedgerEvent::Sale { stall_id, .. }
            | LedgerEvent::Refund { stall_id, .. }
            | LedgerEvent::Payment { stall_id, .. }
            | LedgerEvent::Registration { stall_id }
            | LedgerEvent::SaleCancelled { stall_id, .. }
            | LedgerEvent::RefundCancelled { stall_id, .. }
            | LedgerEvent::PaymentCancelled { stall_id, .. }
            | LedgerEvent::RegistrationCancelled { stall_id } => stall_id,
        }
    }

    /// Increments to the live statistics document.
    pub fn stats_delta(&self) -> StatsDelta {
        match *self {
            LedgerEvent::Sale { amount_cents, .. } => StatsDelta {
                sales: 1,
                revenue_cents: amount_cents,
                ..StatsDelta::default()
            },
            LedgerEvent::SaleCancelled { amount_cents, .. } => StatsDelta {
                sales: -1,
                revenue_cents: -amount_cents,
                ..StatsDelta::default()
            },
            LedgerEvent::Refund { amount_cents, .. } => StatsDelta {
                revenue_cents: -amount_cents,
                ..StatsDelta::default()
            },
            LedgerEvent::RefundCancelled { amount_cents, .. } => StatsDelta {
                revenue_cents: amount_cents,
                ..StatsDelta::default()
            },
            LedgerEvent::Payment { amount_cents, .. } => StatsDelta {
                checkout_cents: amount_cents,
                ..StatsDelta::default()
            },
            LedgerEvent::PaymentCancelled { amount_cents, .. } => StatsDelta {
                checkout_cents: -amount_cents,
                ..StatsDelta::default()
            },
            LedgerEvent::Registration { .. } => StatsDelta {
                registrations: 1,
                customers: 1,
                ..StatsDelta::default()
            },
            LedgerEvent::RegistrationCancelled { .. } => StatsDelta {
                registrations: -1,
                customers: -1,
                ..StatsDelta::default()
            },
        }
    }

    /// Change to the stall's running total, given the stall's type.
    pub fn stall_delta(&self, stall_type: StallType) -> i64 {
        match *self {
            LedgerEvent::Sale { amount_cents, .. } => amount_cents,
            LedgerEvent::SaleCancelled { amount_cents, .. } => -amount_cents,
            LedgerEvent::Refund { amount_cents, .. } => -amount_cents,
            LedgerEvent::RefundCancelled { amount_cents, .. } => amount_cents,
            LedgerEvent::Payment { amount_cents, .. } if stall_type == StallType::Checkout => {
                amount_cents
            }
            LedgerEvent::PaymentCancelled { amount_cents, .. }
                if stall_type == StallType::Checkout =>
            {
                -amount_cents
            }
            _ => 0,
        }
    }
}

// =============================================================================
// Projections
// =============================================================================

/// The commerce stall with the highest positive total. Ties go to the
/// smallest id.
pub fn top_stall(stalls: &[Stall]) -> Option<String> {
    stalls
        .iter()
        .filter(|s| s.stall_type == StallType::Commerce && s.total_amount_cents > 0)
        .max_by(|a, b| {
            a.total_amount_cents
                .cmp(&b.total_amount_cents)
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|s| s.id.clone())
}

/// Applies one event's increments.
pub async fn apply_event(tx: &mut StoreTx, event: &LedgerEvent) -> LedgerResult<()> {
    let delta = event.stats_delta();
    if !delta.is_empty() {
        tx.live_stats().apply_delta(&delta).await?;
    }

    let Some(stall) = tx.stalls().get(event.stall_id()).await? else {
        warn!(stall_id = %event.stall_id(), "Event names an unknown stall");
        return Ok(());
    };

    let stall_delta = event.stall_delta(stall.stall_type);
    if stall_delta != 0 {
        tx.stalls().add_to_total(&stall.id, stall_delta).await?;
        recompute_top_stall(tx).await?;
    }

    Ok(())
}

/// Recomputes `top_performing_stall` from the current stall totals.
pub async fn recompute_top_stall(tx: &mut StoreTx) -> LedgerResult<LiveStats> {
    let stalls = tx.stalls().list().await?;
    let top = top_stall(&stalls);
    tx.live_stats().set_top_stall(top.as_deref()).await?;
    Ok(tx.live_stats().get().await?)
}

/// Recomputes every aggregate from the ledger and overwrites the stored
/// values.
pub async fn rebuild(tx: &mut StoreTx) -> LedgerResult<LiveStats> {
    let totals = tx.transactions().totals().await?;
    let net_by_stall = tx.transactions().net_by_stall().await?;
    let checkout_cents = tx.payments().total_amount().await?;
    let payments_by_stall = tx.payments().totals_by_stall().await?;
    let registrations = tx.registrations().count().await?;
    let customers = tx.customers().count().await?;
    let mut stalls = tx.stalls().list().await?;

    for stall in stalls.iter_mut() {
        let net = net_by_stall
            .iter()
            .find(|r| r.stall_id == stall.id)
            .map_or(0, |r| r.net_cents);
        let paid = if stall.stall_type == StallType::Checkout {
            payments_by_stall
                .iter()
                .find(|(id, _)| *id == stall.id)
                .map_or(0, |(_, cents)| *cents)
        } else {
            0
        };
        stall.total_amount_cents = net + paid;
    }

    tx.stalls().reset_totals().await?;
    for stall in stalls.iter().filter(|s| s.total_amount_cents != 0) {
        tx.stalls().set_total(&stall.id, stall.total_amount_cents).await?;
    }

    let stats = LiveStats {
        total_sales: totals.sale_count,
        total_revenue_cents: totals.sale_cents - totals.refund_cents,
        total_customers_registered: registrations,
        top_performing_stall: top_stall(&stalls),
        total_checkout_amount_cents: checkout_cents,
        total_customers: customers,
        updated_at: Utc::now(),
    };
    tx.live_stats().overwrite(&stats).await?;

    info!(
        total_sales = stats.total_sales,
        total_revenue_cents = stats.total_revenue_cents,
        total_customers = stats.total_customers,
        "Live stats rebuilt"
    );

    Ok(stats)
}

// =============================================================================
// Projector Task
// =============================================================================

/// Commands for the projector task.
#[derive(Debug)]
enum ProjectorCommand {
    Event(LedgerEvent),
    Flush(oneshot::Sender<()>),
    Rebuild(oneshot::Sender<LedgerResult<LiveStats>>),
    UpdateTopStall(oneshot::Sender<LedgerResult<LiveStats>>),
    Shutdown,
}

/// Handle for feeding and controlling the projector.
#[derive(Debug, Clone)]
pub struct ProjectorHandle {
    cmd_tx: mpsc::Sender<ProjectorCommand>,
}

impl ProjectorHandle {
    /// Queues committed events. Never blocks the caller; an event that does
    /// not fit is logged and left for the next rebuild.
    pub fn publish(&self, events: Vec<LedgerEvent>) {
        for event in events {
            if let Err(err) = self.cmd_tx.try_send(ProjectorCommand::Event(event)) {
                warn!(error = %err, "Projector event dropped; aggregates stale until rebuild");
            }
        }
    }

    /// Waits until every event queued before this call has been applied.
    pub async fn flush(&self) -> LedgerResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ProjectorCommand::Flush(reply_tx)).await?;
        reply_rx.await.map_err(|_| closed())
    }

    pub async fn rebuild(&self) -> LedgerResult<LiveStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ProjectorCommand::Rebuild(reply_tx)).await?;
        reply_rx.await.map_err(|_| closed())?
    }

    pub async fn update_top_stall(&self) -> LedgerResult<LiveStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ProjectorCommand::UpdateTopStall(reply_tx)).await?;
        reply_rx.await.map_err(|_| closed())?
    }

    /// Stops the task after it applies the events already queued.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        self.send(ProjectorCommand::Shutdown).await
    }

    async fn send(&self, cmd: ProjectorCommand) -> LedgerResult<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| closed())
    }
}

fn closed() -> LedgerError {
    LedgerError::ChannelError("Projector channel closed".into())
}

/// Background task that owns the aggregate writes.
pub struct Projector {
    db: Database,
    policy: RetryPolicy,
    rebuild_interval: Option<Duration>,
}

impl Projector {
    pub fn new(db: Database, policy: RetryPolicy, rebuild_interval: Option<Duration>) -> Self {
        Projector {
            db,
            policy,
            rebuild_interval,
        }
    }

    /// Spawns the task and returns a handle to it.
    pub fn start(self, settings: &ProjectorSettings) -> (ProjectorHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(settings.channel_capacity);
        let task = tokio::spawn(async move {
            self.run(cmd_rx).await;
        });
        (ProjectorHandle { cmd_tx }, task)
    }

    async fn run(self, mut cmd_rx: mpsc::Receiver<ProjectorCommand>) {
        info!(rebuild_interval = ?self.rebuild_interval, "Projector started");

        let period = self.rebuild_interval.unwrap_or(Duration::from_secs(3600));
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ProjectorCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle(cmd).await,
                    }
                }
                _ = ticker.tick(), if self.rebuild_interval.is_some() => {
                    if let Err(e) = self.rebuild().await {
                        error!(error = %e, "Periodic rebuild failed");
                    }
                }
            }
        }

        cmd_rx.close();
        let mut drained = 0usize;
        while let Some(cmd) = cmd_rx.recv().await {
            if !matches!(cmd, ProjectorCommand::Shutdown) {
                self.handle(cmd).await;
                drained += 1;
            }
        }

        info!(drained, "Projector stopped");
    }

    async fn handle(&self, cmd: ProjectorCommand) {
        match cmd {
            ProjectorCommand::Event(event) => {
                debug!(?event, "Applying ledger event");
                if let Err(e) = self.apply(event.clone()).await {
                    error!(?event, error = %e, "Failed to apply ledger event");
                }
            }
            ProjectorCommand::Flush(reply) => {
                let _ = reply.send(());
            }
            ProjectorCommand::Rebuild(reply) => {
                let _ = reply.send(self.rebuild().await);
            }
            ProjectorCommand::UpdateTopStall(reply) => {
                let result = run_in_transaction(&self.db, &self.policy, "update_top_stall", |tx| {
                    Box::pin(recompute_top_stall(tx))
                })
                .await;
                let _ = reply.send(result);
            }
            ProjectorCommand::Shutdown => {}
        }
    }

    async fn apply(&self, event: LedgerEvent) -> LedgerResult<()> {
        run_in_transaction(&self.db, &self.policy, "apply_event", move |tx| {
            let event = event.clone();
            Box::pin(async move { apply_event(tx, &event).await })
        })
        .await
    }

    async fn rebuild(&self) -> LedgerResult<LiveStats> {
        run_in_transaction(&self.db, &self.policy, "rebuild_live_stats", |tx| {
            Box::pin(rebuild(tx))
        })
        .await
    }
}
