//! Domain events emitted by the pricing and reconciliation services. The
//! consumer here only logs; delivery to external workflows (approval queue,
//! notifications) happens outside this service.

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    JobPriced {
        job_id: Uuid,
        job_number: String,
        customer_total: Decimal,
    },
    ApprovalRequired {
        job_id: Uuid,
        job_number: String,
        shortfall_total: Decimal,
    },
    JobReconciled {
        job_id: Uuid,
        run_id: Uuid,
        fields_changed: usize,
    },
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Best-effort send; a full or closed channel is logged, never fatal.
    pub async fn send(&self, event: Event) {
        if let Err(err) = self.tx.send(event).await {
            warn!("event channel closed, dropping event: {err}");
        }
    }
}

/// Builds a sender/consumer pair with a bounded channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Logs every event until the channel closes.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::JobPriced {
                job_id,
                job_number,
                customer_total,
            } => info!(%job_id, %job_number, %customer_total, "job priced"),
            Event::ApprovalRequired {
                job_id,
                job_number,
                shortfall_total,
            } => info!(%job_id, %job_number, %shortfall_total, "quote requires approval"),
            Event::JobReconciled {
                job_id,
                run_id,
                fields_changed,
            } => info!(%job_id, %run_id, fields_changed, "job reconciled"),
        }
    }
}
