#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric user identifier, as issued by the account subsystem.
pub type UserId = i64;

/// Numeric chat room identifier, assigned by the storage layer.
pub type RoomId = i64;

/// Numeric chat message identifier, assigned by the storage layer.
pub type MessageId = i64;

/// Roles a verified identity can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
	Candidate,
	Recruiter,
	Admin,
}

impl Role {
	/// Stable string identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::Candidate => "CANDIDATE",
			Role::Recruiter => "RECRUITER",
			Role::Admin => "ADMIN",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = ParseRoleError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseRoleError::Empty);
		}

		match s.to_ascii_uppercase().as_str() {
			"CANDIDATE" => Ok(Role::Candidate),
			"RECRUITER" => Ok(Role::Recruiter),
			"ADMIN" => Ok(Role::Admin),
			other => Err(ParseRoleError::Unknown(other.to_string())),
		}
	}
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseRoleError {
	#[error("empty role")]
	Empty,
	#[error("unknown role: {0}")]
	Unknown(String),
}

/// A verified identity attached to a connection session.
///
/// Produced once per connection by the connection authenticator and threaded
/// as an explicit parameter into every per-operation handler. Never stored in
/// shared or global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
	pub id: UserId,
	pub role: Role,
	pub name: String,
}

/// A persistent 1:1 conversation context between one recruiter and one
/// candidate. The `(recruiter_id, candidate_id)` pair is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
	pub id: RoomId,
	pub recruiter_id: UserId,
	pub candidate_id: UserId,
	pub created_at_unix_ms: i64,
}

impl ChatRoom {
	/// Membership: the identity's subject equals either side of the room.
	pub fn is_member(&self, user_id: UserId) -> bool {
		self.recruiter_id == user_id || self.candidate_id == user_id
	}

	/// The member on the other side of the room from `user_id`.
	pub fn counterpart_of(&self, user_id: UserId) -> Option<UserId> {
		if self.recruiter_id == user_id {
			Some(self.candidate_id)
		} else if self.candidate_id == user_id {
			Some(self.recruiter_id)
		} else {
			None
		}
	}
}

/// A persisted chat message. `is_read` means "read by the non-sender side".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub id: MessageId,
	pub chat_room_id: RoomId,
	pub sender_id: UserId,
	pub content: String,
	pub created_at_unix_ms: i64,
	pub is_read: bool,
}

/// Room view returned to a specific viewer: names, last message, unread count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
	pub id: RoomId,
	pub recruiter_id: UserId,
	pub recruiter_name: String,
	pub candidate_id: UserId,
	pub candidate_name: String,
	pub last_message: Option<String>,
	pub last_message_unix_ms: Option<i64>,
	pub unread_count: i64,
}

/// A parsed pub/sub channel name.
///
/// The broker understands exactly two patterns: `room/{roomId}` for a chat
/// room's broadcast channel and `user/{userId}/notifications` for a user's
/// personal notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
	Room(RoomId),
	UserNotifications(UserId),
}

impl Destination {
	/// Canonical channel name for a room's broadcast channel.
	pub fn room_channel(room_id: RoomId) -> String {
		format!("room/{room_id}")
	}

	/// Canonical channel name for a user's notification channel.
	pub fn user_notifications_channel(user_id: UserId) -> String {
		format!("user/{user_id}/notifications")
	}
}

impl fmt::Display for Destination {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Destination::Room(id) => write!(f, "room/{id}"),
			Destination::UserNotifications(id) => write!(f, "user/{id}/notifications"),
		}
	}
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseDestinationError {
	#[error("empty channel name")]
	Empty,
	#[error("invalid channel name: {0}")]
	InvalidFormat(String),
	#[error("invalid id in channel name: {0}")]
	InvalidId(String),
}

impl FromStr for Destination {
	type Err = ParseDestinationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseDestinationError::Empty);
		}

		if let Some(rest) = s.strip_prefix("room/") {
			if rest.is_empty() || rest.contains('/') {
				return Err(ParseDestinationError::InvalidFormat(s.to_string()));
			}
			let id: RoomId = rest.parse().map_err(|_| ParseDestinationError::InvalidId(s.to_string()))?;
			if id < 0 {
				return Err(ParseDestinationError::InvalidId(s.to_string()));
			}
			return Ok(Destination::Room(id));
		}

		if let Some(rest) = s.strip_prefix("user/") {
			let Some(user_part) = rest.strip_suffix("/notifications") else {
				return Err(ParseDestinationError::InvalidFormat(s.to_string()));
			};
			if user_part.is_empty() || user_part.contains('/') {
				return Err(ParseDestinationError::InvalidFormat(s.to_string()));
			}
			let id: UserId = user_part
				.parse()
				.map_err(|_| ParseDestinationError::InvalidId(s.to_string()))?;
			if id < 0 {
				return Err(ParseDestinationError::InvalidId(s.to_string()));
			}
			return Ok(Destination::UserNotifications(id));
		}

		Err(ParseDestinationError::InvalidFormat(s.to_string()))
	}
}

/// Failure taxonomy for chat operations.
///
/// Every per-operation failure is rejected locally; none of these terminate
/// the connection or the process.
#[derive(Debug, Error)]
pub enum ChatError {
	/// No identity attached where the operation requires one.
	#[error("unauthenticated")]
	Unauthenticated,

	/// Authenticated but not a member of the target room/channel, or the
	/// caller's role forbids the action.
	#[error("unauthorized: {0}")]
	Unauthorized(String),

	#[error("not found: {0}")]
	NotFound(String),

	/// A candidate may not author the first message in a room.
	#[error("conversation not started: a recruiter must send the first message")]
	ConversationNotStarted,

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	/// Concurrent room creation collided with the uniqueness constraint.
	/// Normally absorbed by retry-as-lookup and never surfaced.
	#[error("conflict: {0}")]
	Conflict(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl ChatError {
	/// Stable machine-readable code for wire errors and logs.
	pub const fn code(&self) -> &'static str {
		match self {
			ChatError::Unauthenticated => "UNAUTHENTICATED",
			ChatError::Unauthorized(_) => "UNAUTHORIZED",
			ChatError::NotFound(_) => "NOT_FOUND",
			ChatError::ConversationNotStarted => "CONVERSATION_NOT_STARTED",
			ChatError::InvalidRequest(_) => "INVALID_REQUEST",
			ChatError::Conflict(_) => "CONFLICT",
			ChatError::Internal(_) => "INTERNAL",
		}
	}
}

/// A string wrapper that redacts its contents in `Debug` output.
///
/// Used for HMAC secrets and bearer tokens so they never leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretString(***)")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn role_parse_roundtrip() {
		for role in [Role::Candidate, Role::Recruiter, Role::Admin] {
			assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
		}
		assert_eq!("recruiter".parse::<Role>().unwrap(), Role::Recruiter);
		assert!("".parse::<Role>().is_err());
		assert!("MANAGER".parse::<Role>().is_err());
	}

	#[test]
	fn destination_parses_room_channel() {
		assert_eq!("room/42".parse::<Destination>().unwrap(), Destination::Room(42));
		assert_eq!(Destination::Room(42).to_string(), "room/42");
		assert_eq!(Destination::room_channel(42), "room/42");
	}

	#[test]
	fn destination_parses_user_notifications_channel() {
		assert_eq!(
			"user/7/notifications".parse::<Destination>().unwrap(),
			Destination::UserNotifications(7)
		);
		assert_eq!(Destination::user_notifications_channel(7), "user/7/notifications");
	}

	#[test]
	fn destination_rejects_malformed_channels() {
		for bad in [
			"",
			"room/",
			"room/abc",
			"room/1/extra",
			"room/-1",
			"user/7",
			"user//notifications",
			"user/7/notifications/extra",
			"user/x/notifications",
			"jobs/7",
		] {
			assert!(bad.parse::<Destination>().is_err(), "expected parse failure for {bad:?}");
		}
	}

	#[test]
	fn room_membership_and_counterpart() {
		let room = ChatRoom {
			id: 10,
			recruiter_id: 1,
			candidate_id: 2,
			created_at_unix_ms: 0,
		};

		assert!(room.is_member(1));
		assert!(room.is_member(2));
		assert!(!room.is_member(3));
		assert_eq!(room.counterpart_of(1), Some(2));
		assert_eq!(room.counterpart_of(2), Some(1));
		assert_eq!(room.counterpart_of(3), None);
	}

	#[test]
	fn error_codes_are_stable() {
		assert_eq!(ChatError::Unauthenticated.code(), "UNAUTHENTICATED");
		assert_eq!(ChatError::ConversationNotStarted.code(), "CONVERSATION_NOT_STARTED");
		assert_eq!(ChatError::Unauthorized("x".into()).code(), "UNAUTHORIZED");
	}

	#[test]
	fn secret_string_redacts_debug() {
		let s = SecretString::new("hunter2");
		assert_eq!(format!("{s:?}"), "SecretString(***)");
		assert_eq!(s.expose(), "hunter2");
	}
}
