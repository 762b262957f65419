#![forbid(unsafe_code)]

use std::str::FromStr;

use hirewire_domain::{ChatError, ChatMessage, ChatRoom, Destination, Identity, Role, RoomId, RoomSummary, UserId};
use hirewire_store::ChatStore;
use tracing::{debug, info};

use crate::server::authorize::{authorize_destination, load_room, require_identity, require_member};
use crate::server::hub::{ChannelHub, HubItem};
use crate::util::time::unix_ms_now;

/// Viewer-wide room listing: per-room summaries plus the total unread badge.
#[derive(Debug, Clone)]
pub struct RoomsOverview {
	pub rooms: Vec<RoomSummary>,
	pub total_unread: i64,
}

/// Chat operations over the store plus fan-out through the hub.
///
/// Every method takes the caller's identity explicitly and performs its own
/// authorization before touching the store.
#[derive(Clone)]
pub struct ChatService {
	store: ChatStore,
	hub: ChannelHub,
}

impl ChatService {
	pub fn new(store: ChatStore, hub: ChannelHub) -> Self {
		Self { store, hub }
	}

	pub fn store(&self) -> &ChatStore {
		&self.store
	}

	/// Parse and authorize a subscription channel for this identity.
	pub async fn authorize_subscription(&self, identity: Option<&Identity>, channel: &str) -> Result<Destination, ChatError> {
		let identity = require_identity(identity)?;
		let dest = Destination::from_str(channel).map_err(|e| ChatError::InvalidRequest(e.to_string()))?;
		authorize_destination(&self.store, identity, &dest).await?;
		Ok(dest)
	}

	/// Open (or look up) the room between the calling recruiter and a
	/// candidate. Only recruiters may initiate; on first creation the
	/// candidate gets a RoomCreated event on their notifications channel.
	pub async fn initiate_chat(&self, identity: Option<&Identity>, candidate_id: UserId) -> Result<RoomSummary, ChatError> {
		let identity = require_identity(identity)?;
		if identity.role != Role::Recruiter {
			return Err(ChatError::Unauthorized("only recruiters may initiate chats".to_string()));
		}

		let candidate = self
			.store
			.user_by_id(candidate_id)
			.await
			.map_err(internal)?
			.ok_or_else(|| ChatError::NotFound(format!("user {candidate_id}")))?;
		match candidate.role.parse::<Role>() {
			Ok(Role::Candidate) => {}
			_ => {
				return Err(ChatError::InvalidRequest(format!("user {candidate_id} is not a candidate")));
			}
		}

		let (room, created) = self
			.store
			.find_or_create_room(identity.id, candidate_id, unix_ms_now())
			.await
			.map_err(internal)?;

		metrics::counter!("hirewire_server_initiate_chat_total").increment(1);
		if created {
			metrics::counter!("hirewire_server_rooms_created_total").increment(1);
			info!(room_id = room.id, recruiter_id = identity.id, candidate_id, "chat room created");

			let for_candidate = self.summary_for(&room, candidate_id).await?;
			self.hub
				.publish(
					&Destination::user_notifications_channel(candidate_id),
					HubItem::RoomCreated(Box::new(for_candidate)),
				)
				.await;
		} else {
			debug!(room_id = room.id, recruiter_id = identity.id, candidate_id, "chat room already exists");
		}

		self.summary_for(&room, identity.id).await
	}

	/// Rooms the caller belongs to, as viewer-specific summaries, plus the
	/// viewer's unread total across all rooms.
	pub async fn list_rooms(&self, identity: Option<&Identity>) -> Result<RoomsOverview, ChatError> {
		let identity = require_identity(identity)?;

		let rooms = self.store.rooms_for_user(identity.id).await.map_err(internal)?;
		let mut summaries = Vec::with_capacity(rooms.len());
		for room in &rooms {
			summaries.push(self.summary_for(room, identity.id).await?);
		}

		let total_unread = self.store.unread_count_for_user(identity.id).await.map_err(internal)?;

		Ok(RoomsOverview {
			rooms: summaries,
			total_unread,
		})
	}

	/// Ordered history of a room. Viewing marks the counterpart's messages
	/// read first, so the returned rows reflect the post-view state.
	pub async fn history(&self, identity: Option<&Identity>, room_id: RoomId) -> Result<Vec<ChatMessage>, ChatError> {
		let identity = require_identity(identity)?;
		let room = load_room(&self.store, room_id).await?;
		require_member(&room, identity)?;

		self.store.mark_read(room_id, identity.id).await.map_err(internal)?;
		self.store.history(room_id).await.map_err(internal)
	}

	/// Bulk mark the counterpart's messages in a room as read.
	pub async fn mark_read(&self, identity: Option<&Identity>, room_id: RoomId) -> Result<u64, ChatError> {
		let identity = require_identity(identity)?;
		let room = load_room(&self.store, room_id).await?;
		require_member(&room, identity)?;

		let flipped = self.store.mark_read(room_id, identity.id).await.map_err(internal)?;
		debug!(room_id, viewer_id = identity.id, flipped, "marked messages read");
		Ok(flipped)
	}

	/// Persist a message and fan it out to the room channel and the
	/// counterpart's notifications channel.
	///
	/// A candidate may not author the first message in a room: until the
	/// recruiter has sent something, candidate sends fail with
	/// `ConversationNotStarted`.
	pub async fn send_message(
		&self,
		identity: Option<&Identity>,
		room_id: RoomId,
		content: &str,
	) -> Result<ChatMessage, ChatError> {
		let identity = require_identity(identity)?;

		let content = content.trim();
		if content.is_empty() {
			return Err(ChatError::InvalidRequest("empty message".to_string()));
		}

		let room = load_room(&self.store, room_id).await?;
		require_member(&room, identity)?;

		if identity.id == room.candidate_id {
			let started = self
				.store
				.recruiter_has_messaged(room.id, room.recruiter_id)
				.await
				.map_err(internal)?;
			if !started {
				return Err(ChatError::ConversationNotStarted);
			}
		}

		let message = self
			.store
			.insert_message(room.id, identity.id, content, unix_ms_now())
			.await
			.map_err(internal)?;

		metrics::counter!("hirewire_server_messages_sent_total").increment(1);

		self.fan_out(&room, &message).await;

		Ok(message)
	}

	async fn fan_out(&self, room: &ChatRoom, message: &ChatMessage) {
		self.hub
			.publish(&Destination::room_channel(room.id), HubItem::Chat(Box::new(message.clone())))
			.await;

		if let Some(counterpart) = room.counterpart_of(message.sender_id) {
			self.hub
				.publish(
					&Destination::user_notifications_channel(counterpart),
					HubItem::Chat(Box::new(message.clone())),
				)
				.await;
		}
	}

	/// Build the viewer-specific room summary (names, last message, unread).
	async fn summary_for(&self, room: &ChatRoom, viewer_id: UserId) -> Result<RoomSummary, ChatError> {
		let recruiter_name = self.display_name(room.recruiter_id).await?;
		let candidate_name = self.display_name(room.candidate_id).await?;

		let last = self.store.last_message(room.id).await.map_err(internal)?;
		let unread_count = self.store.unread_count_in_room(room.id, viewer_id).await.map_err(internal)?;

		let (last_message, last_message_unix_ms) = match last {
			Some((content, at)) => (Some(content), Some(at)),
			None => (None, None),
		};

		Ok(RoomSummary {
			id: room.id,
			recruiter_id: room.recruiter_id,
			recruiter_name,
			candidate_id: room.candidate_id,
			candidate_name,
			last_message,
			last_message_unix_ms,
			unread_count,
		})
	}

	async fn display_name(&self, user_id: UserId) -> Result<String, ChatError> {
		Ok(self
			.store
			.user_by_id(user_id)
			.await
			.map_err(internal)?
			.map(|u| u.full_name())
			.unwrap_or_default())
	}
}

fn internal(e: anyhow::Error) -> ChatError {
	ChatError::Internal(format!("{e:#}"))
}
