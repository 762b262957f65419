#![forbid(unsafe_code)]

//! Per-operation authorization checks.
//!
//! Every check takes the identity as an explicit parameter; there is no
//! ambient "current user". An ADMIN role grants no extra access here: chat
//! rooms are readable and writable by their two members only.

use hirewire_domain::{ChatError, ChatRoom, Destination, Identity, RoomId};
use hirewire_store::ChatStore;

/// Reject the operation unless the connection carries a verified identity.
pub fn require_identity(identity: Option<&Identity>) -> Result<&Identity, ChatError> {
	identity.ok_or(ChatError::Unauthenticated)
}

/// Check that `identity` may subscribe to or receive from `dest`.
pub async fn authorize_destination(store: &ChatStore, identity: &Identity, dest: &Destination) -> Result<(), ChatError> {
	match dest {
		Destination::Room(room_id) => {
			let room = load_room(store, *room_id).await?;
			require_member(&room, identity)
		}
		Destination::UserNotifications(user_id) => {
			if *user_id == identity.id {
				Ok(())
			} else {
				Err(ChatError::Unauthorized(format!(
					"cannot subscribe to another user's notifications (user {user_id})"
				)))
			}
		}
	}
}

/// Fetch a room, mapping absence to `NotFound`.
pub async fn load_room(store: &ChatStore, room_id: RoomId) -> Result<ChatRoom, ChatError> {
	store
		.room_by_id(room_id)
		.await
		.map_err(|e| ChatError::Internal(format!("load room {room_id}: {e:#}")))?
		.ok_or_else(|| ChatError::NotFound(format!("chat room {room_id}")))
}

/// Membership check shared by every room-scoped operation.
pub fn require_member(room: &ChatRoom, identity: &Identity) -> Result<(), ChatError> {
	if room.is_member(identity.id) {
		Ok(())
	} else {
		Err(ChatError::Unauthorized(format!("not a member of chat room {}", room.id)))
	}
}
