//! Delivery engine: sequential, paced fan-out of one draft to every subscriber.
//!
//! A run sweeps one snapshot of the registry, attempts exactly one send per
//! recipient, counts failures without aborting, and appends exactly one
//! history record once the sweep is over. The counts survive a failed
//! history write.

use crate::db::{BroadcastHistoryRepository, SubscriberRepository};
use crate::model::{DeliveryReport, Draft, NewBroadcast, Subscriber};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

/// Outbound message channel. Implementations may fail per recipient.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, recipient: i64, text: &str) -> Result<()>;

    async fn send_image(&self, recipient: i64, image_ref: &str, caption: &str) -> Result<()>;
}

/// Rate limiter consulted before every send of a run.
#[async_trait]
pub trait Pacer: Send {
    async fn ready(&mut self);
}

/// Spaces consecutive sends by at least `period`. The first send is immediate.
#[derive(Debug)]
pub struct FixedInterval {
    ticker: Option<Interval>,
}

impl FixedInterval {
    /// Must be called within a tokio runtime. A zero period disables pacing.
    pub fn new(period: Duration) -> Self {
        let ticker = (!period.is_zero()).then(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        Self { ticker }
    }
}

#[async_trait]
impl Pacer for FixedInterval {
    async fn ready(&mut self) {
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }
    }
}

/// Proof that the holder is the only delivery run in flight.
#[derive(Debug)]
pub struct DeliveryPermit {
    _guard: OwnedMutexGuard<()>,
}

pub struct DeliveryEngine {
    subscribers: Arc<dyn SubscriberRepository>,
    history: Arc<dyn BroadcastHistoryRepository>,
    transport: Arc<dyn Transport>,
    send_interval: Duration,
    running: Arc<Mutex<()>>,
}

impl DeliveryEngine {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        history: Arc<dyn BroadcastHistoryRepository>,
        transport: Arc<dyn Transport>,
        send_interval: Duration,
    ) -> Self {
        Self {
            subscribers,
            history,
            transport,
            send_interval,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Returns `None` while another run holds the permit.
    pub fn try_acquire(&self) -> Option<DeliveryPermit> {
        self.running
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| DeliveryPermit { _guard: guard })
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Ordered recipient list for the next run.
    pub async fn snapshot(&self) -> Result<Vec<Subscriber>> {
        self.subscribers.list_all().await
    }

    pub async fn deliver(
        &self,
        permit: &DeliveryPermit,
        recipients: &[Subscriber],
        draft: &Draft,
    ) -> DeliveryReport {
        let mut pacer = FixedInterval::new(self.send_interval);
        self.deliver_with(permit, recipients, draft, &mut pacer).await
    }

    #[instrument(
        skip_all,
        fields(recipients = recipients.len(), has_image = draft.image_ref.is_some())
    )]
    pub async fn deliver_with(
        &self,
        _permit: &DeliveryPermit,
        recipients: &[Subscriber],
        draft: &Draft,
        pacer: &mut dyn Pacer,
    ) -> DeliveryReport {
        info!("starting broadcast");

        let mut success_count: u64 = 0;
        let mut failure_count: u64 = 0;
        for recipient in recipients {
            pacer.ready().await;
            let sent = match draft.image_ref.as_deref() {
                Some(image_ref) => {
                    self.transport
                        .send_image(recipient.id, image_ref, &draft.text)
                        .await
                }
                None => self.transport.send_text(recipient.id, &draft.text).await,
            };
            match sent {
                Ok(()) => success_count += 1,
                Err(err) => {
                    warn!(?err, recipient = recipient.id, "broadcast send failed");
                    failure_count += 1;
                }
            }
        }

        let appended = self
            .history
            .append_record(&NewBroadcast {
                text: draft.text.clone(),
                image_ref: draft.image_ref.clone(),
                sent_at: Utc::now(),
                success_count: success_count as i64,
                failure_count: failure_count as i64,
            })
            .await;
        let record_id = match appended {
            Ok(record) => Some(record.id),
            Err(err) => {
                error!(?err, success_count, failure_count, "failed to record broadcast");
                None
            }
        };

        info!(?record_id, success_count, failure_count, "broadcast finished");
        DeliveryReport {
            record_id,
            success_count,
            failure_count,
        }
    }
}
