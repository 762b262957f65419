#![forbid(unsafe_code)]

use std::time::Duration;

use hirewire_domain::{ChatMessage, Destination};
use tokio::time::timeout;

use crate::server::hub::{ChannelHub, ChannelHubConfig, HubItem};

fn mk_message(room_id: i64, content: &str) -> HubItem {
	HubItem::Chat(Box::new(ChatMessage {
		id: 1,
		chat_room_id: room_id,
		sender_id: 100,
		content: content.to_string(),
		created_at_unix_ms: 1_700_000_000_000,
		is_read: false,
	}))
}

#[tokio::test]
async fn subscribe_receives_events_for_that_channel_only() {
	let hub = ChannelHub::new(ChannelHubConfig {
		subscriber_queue_capacity: 16,
		debug_logs: false,
	});

	let channel_a = Destination::room_channel(1);
	let channel_b = Destination::room_channel(2);

	let mut rx_a = hub.subscribe(&channel_a).await;
	let _rx_b = hub.subscribe(&channel_b).await;

	hub.publish(&channel_b, mk_message(2, "b-1")).await;

	let got_unexpected = timeout(Duration::from_millis(50), rx_a.recv()).await;
	assert!(
		got_unexpected.is_err(),
		"subscriber for channel A unexpectedly received an item for channel B"
	);

	hub.publish(&channel_a, mk_message(1, "a-1")).await;

	let item = timeout(Duration::from_millis(250), rx_a.recv())
		.await
		.expect("expected to receive within timeout")
		.expect("channel open");

	match item {
		HubItem::Chat(m) => assert_eq!(m.content, "a-1"),
		other => panic!("expected Chat item, got: {other:?}"),
	}
}

#[tokio::test]
async fn dropped_subscribers_are_pruned() {
	let hub = ChannelHub::new(ChannelHubConfig {
		subscriber_queue_capacity: 16,
		debug_logs: false,
	});

	let channel = Destination::user_notifications_channel(200);

	{
		let _rx = hub.subscribe(&channel).await;
	}

	hub.prune_channel(&channel).await;

	hub.publish(&channel, mk_message(1, "a-1")).await;

	let counts = hub.channel_subscriber_counts().await;
	assert_eq!(counts.get(&channel).copied().unwrap_or(0), 0);
}

#[tokio::test]
async fn bounded_queue_drops_and_emits_lagged_marker() {
	let hub = ChannelHub::new(ChannelHubConfig {
		subscriber_queue_capacity: 2,
		debug_logs: false,
	});

	let channel = Destination::room_channel(7);
	let mut rx = hub.subscribe(&channel).await;

	hub.publish(&channel, mk_message(7, "a-1")).await;
	hub.publish(&channel, mk_message(7, "a-2")).await;

	// Queue is full, so this one is dropped and recorded as lag.
	hub.publish(&channel, mk_message(7, "a-3")).await;

	for expected in ["a-1", "a-2"] {
		let item = timeout(Duration::from_millis(250), rx.recv())
			.await
			.expect("expected queued item")
			.expect("channel open");
		match item {
			HubItem::Chat(m) => assert_eq!(m.content, expected),
			other => panic!("expected Chat item, got: {other:?}"),
		}
	}

	// The pending lag marker is flushed by the next successful publish.
	hub.publish(&channel, mk_message(7, "a-4")).await;

	let next = timeout(Duration::from_millis(250), rx.recv())
		.await
		.expect("expected fourth message")
		.expect("channel open");
	match next {
		HubItem::Chat(m) => assert_eq!(m.content, "a-4"),
		other => panic!("expected Chat item, got: {other:?}"),
	}

	let marker = timeout(Duration::from_millis(250), rx.recv())
		.await
		.expect("expected lag marker")
		.expect("channel open");
	match marker {
		HubItem::Lagged { dropped } => assert!(dropped >= 1, "expected dropped >= 1, got {dropped}"),
		other => panic!("expected Lagged marker, got: {other:?}"),
	}
}
