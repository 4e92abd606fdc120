//! Push feed of newly inserted admin alert rows.
//!
//! Delivery is at-least-once; duplicates reach subscribers as duplicates.
//! Dropping an [`AlertSubscription`] tears it down synchronously.

use super::AdminAlertEvent;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use ulid::Ulid;

/// Events buffered per subscription before publishers wait for the reader.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// Source of admin alert inserts.
pub trait AlertFeed: Send + Sync {
    /// Opens a subscription to new alert rows.
    ///
    /// # Errors
    /// Returns an error if the feed refuses or fails the subscription.
    fn subscribe(&self) -> Result<AlertSubscription>;
}

/// Live subscription. Closed exactly once, when dropped.
pub struct AlertSubscription {
    id: Ulid,
    events: mpsc::Receiver<AdminAlertEvent>,
    on_close: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl std::fmt::Debug for AlertSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl AlertSubscription {
    /// Wraps a receiver; `on_close` runs when the subscription is dropped.
    pub fn new(
        events: mpsc::Receiver<AdminAlertEvent>,
        on_close: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: Ulid::new(),
            events,
            on_close: Some(Box::new(on_close)),
        }
    }

    #[must_use]
    pub fn id(&self) -> Ulid {
        self.id
    }

    /// Next alert, or `None` once the feed has closed this subscription.
    pub async fn recv(&mut self) -> Option<AdminAlertEvent> {
        self.events.recv().await
    }
}

impl Drop for AlertSubscription {
    fn drop(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
        debug!(subscription = %self.id, "alert subscription closed");
    }
}

#[derive(Default)]
struct Channels {
    senders: Mutex<HashMap<u64, mpsc::Sender<AdminAlertEvent>>>,
    next_id: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
}

/// In-process feed fanning each published alert out to every live subscription.
#[derive(Clone, Default)]
pub struct BroadcastAlertFeed {
    channels: Arc<Channels>,
}

impl std::fmt::Debug for BroadcastAlertFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastAlertFeed")
            .field("live", &self.live_subscriptions())
            .finish()
    }
}

impl BroadcastAlertFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every live subscription, waiting while a
    /// subscription's buffer is full. Returns how many received it.
    pub async fn publish(&self, event: &AdminAlertEvent) -> usize {
        let senders: Vec<_> = self
            .channels
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut delivered = 0;
        for sender in senders {
            // Err only when the subscription closed while we waited.
            if sender.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.channels
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Subscriptions opened since the feed was created.
    #[must_use]
    pub fn opened(&self) -> u64 {
        self.channels.opened.load(Ordering::Acquire)
    }

    /// Subscriptions closed since the feed was created.
    #[must_use]
    pub fn closed(&self) -> u64 {
        self.channels.closed.load(Ordering::Acquire)
    }
}

impl AlertFeed for BroadcastAlertFeed {
    fn subscribe(&self) -> Result<AlertSubscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let key = self.channels.next_id.fetch_add(1, Ordering::AcqRel);

        self.channels
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, tx);
        self.channels.opened.fetch_add(1, Ordering::AcqRel);

        let channels = Arc::clone(&self.channels);
        Ok(AlertSubscription::new(rx, move || {
            channels
                .senders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            channels.closed.fetch_add(1, Ordering::AcqRel);
        }))
    }
}

/// Insert payload as delivered by the realtime channel: the new row under `new`.
#[derive(Deserialize)]
struct InsertPayload {
    new: AdminAlertEvent,
}

/// Parses one line of the feed: either an insert payload or a bare alert row.
///
/// # Errors
/// Returns an error if the line is neither shape.
pub fn parse_alert_line(line: &str) -> Result<AdminAlertEvent> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    if value.get("new").is_some() {
        let payload: InsertPayload = serde_json::from_value(value)?;
        return Ok(payload.new);
    }
    serde_json::from_value(value).map_err(Error::from)
}

/// Publishes every JSON line read from `reader` until EOF. Malformed lines are
/// logged and skipped. Reading pauses while a subscriber is saturated.
/// Returns the number of alerts published.
///
/// # Errors
/// Returns an error if reading from `reader` fails.
#[instrument(skip_all)]
pub async fn pump_json_lines<R>(feed: &BroadcastAlertFeed, reader: R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;

    while let Some(line) = lines.next_line().await.map_err(Error::Feed)? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_alert_line(line) {
            Ok(event) => {
                let delivered = feed.publish(&event).await;
                debug!(title = %event.title, delivered, "alert published");
                published += 1;
            }
            Err(err) => warn!("skipping malformed alert line: {err}"),
        }
    }

    debug!(published, "alert feed drained");
    Ok(published)
}
