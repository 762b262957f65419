#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use hirewire_domain::{ChatMessage, RoomSummary};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Process-wide pub/sub hub keyed by canonical channel name
/// (`room/{id}`, `user/{id}/notifications`).
///
/// Shared across connections so a message sent on one connection reaches
/// subscribers on every other connection.
#[derive(Debug, Clone)]
pub struct ChannelHub {
	inner: Arc<Mutex<Inner>>,
	cfg: ChannelHubConfig,
}

/// Configuration for `ChannelHub`.
#[derive(Debug, Clone)]
pub struct ChannelHubConfig {
	/// Maximum number of queued items per subscriber.
	pub subscriber_queue_capacity: usize,

	pub debug_logs: bool,
}

impl Default for ChannelHubConfig {
	fn default() -> Self {
		Self {
			subscriber_queue_capacity: 1024,
			debug_logs: false,
		}
	}
}

/// Items emitted on a subscriber stream.
#[derive(Debug, Clone)]
pub enum HubItem {
	Chat(Box<ChatMessage>),

	RoomCreated(Box<RoomSummary>),

	/// Indicates the subscriber is lagging and items were dropped.
	Lagged {
		dropped: u64,
	},
}

impl ChannelHub {
	pub fn new(cfg: ChannelHubConfig) -> Self {
		Self {
			inner: Arc::new(Mutex::new(Inner::default())),
			cfg,
		}
	}

	/// Subscribe to a channel.
	pub async fn subscribe(&self, channel: &str) -> mpsc::Receiver<HubItem> {
		let (tx, rx) = mpsc::channel(self.cfg.subscriber_queue_capacity);

		let mut inner = self.inner.lock().await;
		let entry = inner.channels.entry(channel.to_string()).or_default();

		prune_closed_subscribers(entry);

		entry.subscribers.push(tx);
		entry.pending_lag_by_subscriber.push(0);

		if self.cfg.debug_logs {
			debug!(channel, subs = entry.subscribers.len(), "channel hub: subscribed");
		}

		rx
	}

	/// Drop closed subscribers and forget the channel if nobody is left.
	pub async fn prune_channel(&self, channel: &str) {
		let mut inner = self.inner.lock().await;
		if let Some(entry) = inner.channels.get_mut(channel) {
			prune_closed_subscribers(entry);

			if entry.subscribers.is_empty() {
				inner.channels.remove(channel);
			}
		}
	}

	/// Publish an item to every live subscriber of `channel`.
	pub async fn publish(&self, channel: &str, item: HubItem) {
		let mut inner = self.inner.lock().await;
		let Some(entry) = inner.channels.get_mut(channel) else {
			return;
		};

		prune_closed_subscribers(entry);

		if entry.subscribers.is_empty() {
			inner.channels.remove(channel);
			return;
		}

		let mut dropped_total: u64 = 0;

		for (idx, sub) in entry.subscribers.iter_mut().enumerate() {
			match sub.try_send(item.clone()) {
				Ok(()) => {
					if let Some(pending) = entry.pending_lag_by_subscriber.get_mut(idx)
						&& *pending > 0 && sub.try_send(HubItem::Lagged { dropped: *pending }).is_ok()
					{
						*pending = 0;
					}
				}
				Err(mpsc::error::TrySendError::Full(_)) => {
					dropped_total += 1;

					if let Some(pending) = entry.pending_lag_by_subscriber.get_mut(idx) {
						*pending = pending.saturating_add(1);
					}
				}
				Err(mpsc::error::TrySendError::Closed(_)) => {}
			}
		}

		prune_closed_subscribers(entry);

		if entry.subscribers.is_empty() {
			inner.channels.remove(channel);
		}

		if self.cfg.debug_logs && dropped_total > 0 {
			debug!(channel, dropped = dropped_total, "channel hub: dropped due to full subscriber queues");
		}
	}

	/// Get a snapshot of subscriber counts per channel.
	#[allow(dead_code)]
	pub async fn channel_subscriber_counts(&self) -> HashMap<String, usize> {
		let inner = self.inner.lock().await;
		inner
			.channels
			.iter()
			.map(|(k, v)| (k.clone(), v.subscribers.iter().filter(|s| !s.is_closed()).count()))
			.collect()
	}
}

#[derive(Debug, Default)]
struct Inner {
	channels: HashMap<String, ChannelEntry>,
}

#[derive(Debug, Default)]
struct ChannelEntry {
	subscribers: Vec<mpsc::Sender<HubItem>>,

	/// Pending lag markers per subscriber.
	pending_lag_by_subscriber: Vec<u64>,
}

fn prune_closed_subscribers(entry: &mut ChannelEntry) {
	if entry.subscribers.len() != entry.pending_lag_by_subscriber.len() {
		entry.pending_lag_by_subscriber.resize(entry.subscribers.len(), 0);
	}

	let mut new_subs = Vec::with_capacity(entry.subscribers.len());
	let mut new_lag = Vec::with_capacity(entry.subscribers.len());

	for (idx, s) in entry.subscribers.drain(..).enumerate() {
		if !s.is_closed() {
			new_subs.push(s);
			new_lag.push(*entry.pending_lag_by_subscriber.get(idx).unwrap_or(&0));
		}
	}

	entry.subscribers = new_subs;
	entry.pending_lag_by_subscriber = new_lag;
}
