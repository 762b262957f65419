#![forbid(unsafe_code)]

use std::time::Duration;

use hirewire_domain::{ChatError, Destination, Identity, Role};
use hirewire_store::ChatStore;
use tokio::time::timeout;

use crate::server::chat::ChatService;
use crate::server::hub::{ChannelHub, ChannelHubConfig, HubItem};

const RECRUITER_ID: i64 = 100;
const CANDIDATE_ID: i64 = 200;

fn recruiter() -> Identity {
	Identity {
		id: RECRUITER_ID,
		role: Role::Recruiter,
		name: "Rita Recruiter".to_string(),
	}
}

fn candidate() -> Identity {
	Identity {
		id: CANDIDATE_ID,
		role: Role::Candidate,
		name: "Carl Candidate".to_string(),
	}
}

async fn service() -> (ChatService, ChannelHub) {
	let store = ChatStore::in_memory().await.expect("in-memory store");
	store
		.upsert_user(RECRUITER_ID, "Rita", "Recruiter", "RECRUITER", 1)
		.await
		.expect("seed recruiter");
	store
		.upsert_user(CANDIDATE_ID, "Carl", "Candidate", "CANDIDATE", 1)
		.await
		.expect("seed candidate");

	let hub = ChannelHub::new(ChannelHubConfig::default());
	(ChatService::new(store, hub.clone()), hub)
}

#[tokio::test]
async fn initiate_requires_a_recruiter() {
	let (chat, _hub) = service().await;

	let err = chat.initiate_chat(None, CANDIDATE_ID).await.unwrap_err();
	assert!(matches!(err, ChatError::Unauthenticated), "got: {err:?}");

	let err = chat.initiate_chat(Some(&candidate()), CANDIDATE_ID).await.unwrap_err();
	assert!(matches!(err, ChatError::Unauthorized(_)), "got: {err:?}");
}

#[tokio::test]
async fn initiate_validates_the_target() {
	let (chat, _hub) = service().await;

	let err = chat.initiate_chat(Some(&recruiter()), 999).await.unwrap_err();
	assert!(matches!(err, ChatError::NotFound(_)), "got: {err:?}");

	// The target must actually be a candidate.
	let err = chat.initiate_chat(Some(&recruiter()), RECRUITER_ID).await.unwrap_err();
	assert!(matches!(err, ChatError::InvalidRequest(_)), "got: {err:?}");
}

#[tokio::test]
async fn initiate_is_idempotent_and_notifies_the_candidate_once() {
	let (chat, hub) = service().await;

	let mut notifications = hub.subscribe(&Destination::user_notifications_channel(CANDIDATE_ID)).await;

	let first = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate");
	let second = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("re-initiate");
	assert_eq!(first.id, second.id);
	assert_eq!(first.recruiter_name, "Rita Recruiter");
	assert_eq!(first.candidate_name, "Carl Candidate");

	let item = timeout(Duration::from_millis(250), notifications.recv())
		.await
		.expect("expected RoomCreated notification")
		.expect("channel open");
	match item {
		HubItem::RoomCreated(summary) => assert_eq!(summary.id, first.id),
		other => panic!("expected RoomCreated, got: {other:?}"),
	}

	// Re-initiating an existing room must not emit a second notification.
	let extra = timeout(Duration::from_millis(50), notifications.recv()).await;
	assert!(extra.is_err(), "unexpected extra notification");
}

#[tokio::test]
async fn candidate_cannot_open_the_conversation() {
	let (chat, _hub) = service().await;

	let room = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate");

	let err = chat.send_message(Some(&candidate()), room.id, "hello?").await.unwrap_err();
	assert!(matches!(err, ChatError::ConversationNotStarted), "got: {err:?}");

	chat.send_message(Some(&recruiter()), room.id, "hi Carl")
		.await
		.expect("recruiter opener");

	chat.send_message(Some(&candidate()), room.id, "hello!")
		.await
		.expect("candidate reply after opener");
}

#[tokio::test]
async fn send_rejects_empty_and_whitespace_content() {
	let (chat, _hub) = service().await;

	let room = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate");

	for content in ["", "   ", "\n\t"] {
		let err = chat.send_message(Some(&recruiter()), room.id, content).await.unwrap_err();
		assert!(matches!(err, ChatError::InvalidRequest(_)), "content {content:?} got: {err:?}");
	}
}

#[tokio::test]
async fn non_members_are_rejected() {
	let (chat, _hub) = service().await;
	chat.store()
		.upsert_user(300, "Olga", "Outsider", "RECRUITER", 1)
		.await
		.expect("seed outsider");

	let room = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate");

	let outsider = Identity {
		id: 300,
		role: Role::Recruiter,
		name: "Olga Outsider".to_string(),
	};

	let err = chat.send_message(Some(&outsider), room.id, "let me in").await.unwrap_err();
	assert!(matches!(err, ChatError::Unauthorized(_)), "got: {err:?}");

	let err = chat.history(Some(&outsider), room.id).await.unwrap_err();
	assert!(matches!(err, ChatError::Unauthorized(_)), "got: {err:?}");

	let err = chat.history(Some(&recruiter()), 999).await.unwrap_err();
	assert!(matches!(err, ChatError::NotFound(_)), "got: {err:?}");
}

#[tokio::test]
async fn history_marks_counterpart_messages_read() {
	let (chat, _hub) = service().await;

	let room = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate");
	chat.send_message(Some(&recruiter()), room.id, "first").await.expect("send");
	chat.send_message(Some(&recruiter()), room.id, "second").await.expect("send");

	let overview = chat.list_rooms(Some(&candidate())).await.expect("list rooms");
	assert_eq!(overview.rooms.len(), 1);
	assert_eq!(overview.rooms[0].unread_count, 2);
	assert_eq!(overview.total_unread, 2);
	assert_eq!(overview.rooms[0].last_message.as_deref(), Some("second"));

	let history = chat.history(Some(&candidate()), room.id).await.expect("history");
	assert_eq!(
		history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
		vec!["first", "second"]
	);
	assert!(history.iter().all(|m| m.is_read), "viewing must mark messages read");

	let overview = chat.list_rooms(Some(&candidate())).await.expect("list rooms");
	assert_eq!(overview.rooms[0].unread_count, 0);
	assert_eq!(overview.total_unread, 0);

	// The sender's own unread count never included their messages.
	let overview = chat.list_rooms(Some(&recruiter())).await.expect("list rooms");
	assert_eq!(overview.rooms[0].unread_count, 0);
	assert_eq!(overview.total_unread, 0);
}

#[tokio::test]
async fn list_rooms_totals_unread_across_rooms() {
	let (chat, _hub) = service().await;

	let second_recruiter = Identity {
		id: 101,
		role: Role::Recruiter,
		name: "Rosa Recruiter".to_string(),
	};
	chat.store()
		.upsert_user(second_recruiter.id, "Rosa", "Recruiter", "RECRUITER", 1)
		.await
		.expect("seed second recruiter");

	let room_a = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate a");
	let room_b = chat
		.initiate_chat(Some(&second_recruiter), CANDIDATE_ID)
		.await
		.expect("initiate b");
	assert_ne!(room_a.id, room_b.id);

	chat.send_message(Some(&recruiter()), room_a.id, "ping").await.expect("send a");
	chat.send_message(Some(&second_recruiter), room_b.id, "ping").await.expect("send b1");
	chat.send_message(Some(&second_recruiter), room_b.id, "ping again").await.expect("send b2");

	let overview = chat.list_rooms(Some(&candidate())).await.expect("list rooms");
	assert_eq!(overview.rooms.len(), 2);
	assert_eq!(overview.total_unread, 3);
	assert_eq!(
		overview.total_unread,
		overview.rooms.iter().map(|r| r.unread_count).sum::<i64>()
	);

	chat.history(Some(&candidate()), room_b.id).await.expect("view room b");
	let overview = chat.list_rooms(Some(&candidate())).await.expect("list rooms");
	assert_eq!(overview.total_unread, 1);
}

#[tokio::test]
async fn mark_read_reports_flipped_rows_and_is_idempotent() {
	let (chat, _hub) = service().await;

	let room = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate");
	chat.send_message(Some(&recruiter()), room.id, "one").await.expect("send");
	chat.send_message(Some(&recruiter()), room.id, "two").await.expect("send");

	let flipped = chat.mark_read(Some(&candidate()), room.id).await.expect("mark read");
	assert_eq!(flipped, 2);

	let flipped = chat.mark_read(Some(&candidate()), room.id).await.expect("mark read again");
	assert_eq!(flipped, 0);
}

#[tokio::test]
async fn send_fans_out_to_room_and_counterpart_notifications() {
	let (chat, hub) = service().await;

	let room = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate");

	let mut room_rx = hub.subscribe(&Destination::room_channel(room.id)).await;
	let mut notif_rx = hub.subscribe(&Destination::user_notifications_channel(CANDIDATE_ID)).await;

	let sent = chat
		.send_message(Some(&recruiter()), room.id, "ping")
		.await
		.expect("send");

	for rx in [&mut room_rx, &mut notif_rx] {
		let item = timeout(Duration::from_millis(250), rx.recv())
			.await
			.expect("expected fan-out item")
			.expect("channel open");
		match item {
			HubItem::Chat(m) => {
				assert_eq!(m.id, sent.id);
				assert_eq!(m.content, "ping");
			}
			other => panic!("expected Chat item, got: {other:?}"),
		}
	}
}

#[tokio::test]
async fn subscriptions_are_authorized_per_channel() {
	let (chat, _hub) = service().await;

	let room = chat.initiate_chat(Some(&recruiter()), CANDIDATE_ID).await.expect("initiate");

	let dest = chat
		.authorize_subscription(Some(&recruiter()), &Destination::room_channel(room.id))
		.await
		.expect("member may subscribe");
	assert_eq!(dest, Destination::Room(room.id));

	let err = chat
		.authorize_subscription(None, &Destination::room_channel(room.id))
		.await
		.unwrap_err();
	assert!(matches!(err, ChatError::Unauthenticated), "got: {err:?}");

	let err = chat
		.authorize_subscription(Some(&recruiter()), "not-a-channel")
		.await
		.unwrap_err();
	assert!(matches!(err, ChatError::InvalidRequest(_)), "got: {err:?}");

	// Notification channels are owner-only, even across room membership.
	let err = chat
		.authorize_subscription(Some(&recruiter()), &Destination::user_notifications_channel(CANDIDATE_ID))
		.await
		.unwrap_err();
	assert!(matches!(err, ChatError::Unauthorized(_)), "got: {err:?}");
}
