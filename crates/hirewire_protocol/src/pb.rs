#![forbid(unsafe_code)]

//! Wire messages for the `hirewire.v1` protocol.
//!
//! Hand-written `prost` message definitions; the framing layer wraps each
//! `Envelope` in a length-prefixed frame. Tags are stable and must not be
//! reused once released.

/// Top-level frame payload for both the control and events streams.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
	#[prost(uint32, tag = "1")]
	pub version: u32,

	/// Correlates a Response/result with the Request that caused it.
	#[prost(string, tag = "2")]
	pub request_id: String,

	#[prost(
		oneof = "envelope::Msg",
		tags = "10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23"
	)]
	pub msg: Option<envelope::Msg>,
}

pub mod envelope {
	#[derive(Clone, PartialEq, ::prost::Oneof)]
	pub enum Msg {
		#[prost(message, tag = "10")]
		Hello(super::Hello),
		#[prost(message, tag = "11")]
		Welcome(super::Welcome),
		#[prost(message, tag = "12")]
		Ping(super::Ping),
		#[prost(message, tag = "13")]
		Pong(super::Pong),
		#[prost(message, tag = "14")]
		Subscribe(super::Subscribe),
		#[prost(message, tag = "15")]
		Subscribed(super::Subscribed),
		#[prost(message, tag = "16")]
		Unsubscribe(super::Unsubscribe),
		#[prost(message, tag = "17")]
		Unsubscribed(super::Unsubscribed),
		#[prost(message, tag = "18")]
		SendChat(super::SendChat),
		#[prost(message, tag = "19")]
		SendChatResult(super::SendChatResult),
		#[prost(message, tag = "20")]
		Request(super::Request),
		#[prost(message, tag = "21")]
		Response(super::Response),
		#[prost(message, tag = "22")]
		Event(super::Event),
		#[prost(message, tag = "23")]
		Error(super::Error),
	}
}

/// First message on the control stream.
///
/// `authorization` carries `Bearer <token>`; `token` is the fallback slot for
/// transports that cannot set an authorization header. Both may be empty, in
/// which case the connection proceeds anonymously.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Hello {
	#[prost(string, tag = "1")]
	pub client_name: String,
	#[prost(string, tag = "2")]
	pub client_instance_id: String,
	#[prost(string, tag = "3")]
	pub authorization: String,
	#[prost(string, tag = "4")]
	pub token: String,
}

/// Server reply to `Hello`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Welcome {
	#[prost(string, tag = "1")]
	pub server_name: String,
	#[prost(string, tag = "2")]
	pub server_instance_id: String,
	#[prost(int64, tag = "3")]
	pub server_time_unix_ms: i64,
	#[prost(uint32, tag = "4")]
	pub max_frame_bytes: u32,
	/// Whether a verified identity was attached to this connection.
	#[prost(bool, tag = "5")]
	pub authenticated: bool,
	/// Verified subject id; zero when anonymous.
	#[prost(int64, tag = "6")]
	pub subject: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ping {
	#[prost(int64, tag = "1")]
	pub client_time_unix_ms: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pong {
	#[prost(int64, tag = "1")]
	pub client_time_unix_ms: i64,
	#[prost(int64, tag = "2")]
	pub server_time_unix_ms: i64,
}

/// Subscribe to one or more channels (`room/{id}`, `user/{id}/notifications`).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Subscribe {
	#[prost(string, repeated, tag = "1")]
	pub channels: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscriptionResult {
	#[prost(string, tag = "1")]
	pub channel: String,
	#[prost(enumeration = "SubscribeStatus", tag = "2")]
	pub status: i32,
	#[prost(string, tag = "3")]
	pub detail: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Subscribed {
	#[prost(message, repeated, tag = "1")]
	pub results: Vec<SubscriptionResult>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Unsubscribe {
	#[prost(string, repeated, tag = "1")]
	pub channels: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnsubscribeResult {
	#[prost(string, tag = "1")]
	pub channel: String,
	#[prost(enumeration = "UnsubscribeStatus", tag = "2")]
	pub status: i32,
	#[prost(string, tag = "3")]
	pub detail: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Unsubscribed {
	#[prost(message, repeated, tag = "1")]
	pub results: Vec<UnsubscribeResult>,
}

/// Application entry point for sending a chat message into a room.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SendChat {
	#[prost(int64, tag = "1")]
	pub chat_room_id: i64,
	#[prost(string, tag = "2")]
	pub content: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SendChatResult {
	#[prost(enumeration = "OpStatus", tag = "1")]
	pub status: i32,
	#[prost(string, tag = "2")]
	pub detail: String,
	/// The persisted message, present when `status == Ok`.
	#[prost(message, optional, tag = "3")]
	pub message: Option<ChatMessage>,
}

/// Request/response operations multiplexed over the control stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
	#[prost(oneof = "request::Req", tags = "1, 2, 3, 4")]
	pub req: Option<request::Req>,
}

pub mod request {
	#[derive(Clone, PartialEq, ::prost::Oneof)]
	pub enum Req {
		#[prost(message, tag = "1")]
		InitiateChat(super::InitiateChat),
		#[prost(message, tag = "2")]
		ListRooms(super::ListRooms),
		#[prost(message, tag = "3")]
		GetHistory(super::GetHistory),
		#[prost(message, tag = "4")]
		MarkRead(super::MarkRead),
	}
}

/// Open (or look up) the room between the calling recruiter and a candidate.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitiateChat {
	#[prost(int64, tag = "1")]
	pub candidate_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListRooms {}

/// Fetch a room's ordered history; implicitly marks it read for the caller.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetHistory {
	#[prost(int64, tag = "1")]
	pub chat_room_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MarkRead {
	#[prost(int64, tag = "1")]
	pub chat_room_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Response {
	#[prost(enumeration = "OpStatus", tag = "1")]
	pub status: i32,
	#[prost(string, tag = "2")]
	pub detail: String,

	#[prost(oneof = "response::Body", tags = "10, 11, 12")]
	pub body: Option<response::Body>,
}

pub mod response {
	#[derive(Clone, PartialEq, ::prost::Oneof)]
	pub enum Body {
		#[prost(message, tag = "10")]
		Room(super::RoomSummary),
		#[prost(message, tag = "11")]
		Rooms(super::RoomList),
		#[prost(message, tag = "12")]
		History(super::MessageList),
	}
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoomSummary {
	#[prost(int64, tag = "1")]
	pub id: i64,
	#[prost(int64, tag = "2")]
	pub recruiter_id: i64,
	#[prost(string, tag = "3")]
	pub recruiter_name: String,
	#[prost(int64, tag = "4")]
	pub candidate_id: i64,
	#[prost(string, tag = "5")]
	pub candidate_name: String,
	#[prost(string, optional, tag = "6")]
	pub last_message: Option<String>,
	#[prost(int64, optional, tag = "7")]
	pub last_message_unix_ms: Option<i64>,
	#[prost(int64, tag = "8")]
	pub unread_count: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RoomList {
	#[prost(message, repeated, tag = "1")]
	pub rooms: Vec<RoomSummary>,
	/// Unread messages across all of the viewer's rooms (badge count).
	#[prost(int64, tag = "2")]
	pub total_unread: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChatMessage {
	#[prost(int64, tag = "1")]
	pub id: i64,
	#[prost(int64, tag = "2")]
	pub chat_room_id: i64,
	#[prost(int64, tag = "3")]
	pub sender_id: i64,
	#[prost(string, tag = "4")]
	pub content: String,
	#[prost(int64, tag = "5")]
	pub timestamp_unix_ms: i64,
	#[prost(bool, tag = "6")]
	pub is_read: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageList {
	#[prost(message, repeated, tag = "1")]
	pub messages: Vec<ChatMessage>,
}

/// Broadcast frame on the events stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Event {
	#[prost(string, tag = "1")]
	pub channel: String,
	#[prost(int64, tag = "2")]
	pub server_time_unix_ms: i64,

	#[prost(oneof = "event::Kind", tags = "10, 11, 12")]
	pub kind: Option<event::Kind>,
}

pub mod event {
	#[derive(Clone, PartialEq, ::prost::Oneof)]
	pub enum Kind {
		#[prost(message, tag = "10")]
		ChatMessage(super::ChatMessage),
		#[prost(message, tag = "11")]
		RoomCreated(super::RoomSummary),
		#[prost(message, tag = "12")]
		Lagged(super::LaggedEvent),
	}
}

/// The subscriber's bounded queue overflowed and events were dropped.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LaggedEvent {
	#[prost(uint64, tag = "1")]
	pub dropped: u64,
	#[prost(string, tag = "2")]
	pub detail: String,
}

/// Protocol-level error frame.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Error {
	#[prost(string, tag = "1")]
	pub code: String,
	#[prost(string, tag = "2")]
	pub message: String,
	#[prost(string, tag = "3")]
	pub channel: String,
	#[prost(string, tag = "4")]
	pub request_id: String,
}

/// Result status for send and request/response operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum OpStatus {
	Unspecified = 0,
	Ok = 1,
	Unauthorized = 2,
	NotFound = 3,
	ConversationNotStarted = 4,
	InvalidRequest = 5,
	Conflict = 6,
	InternalError = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SubscribeStatus {
	Unspecified = 0,
	Ok = 1,
	Unauthorized = 2,
	InvalidChannel = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum UnsubscribeStatus {
	Unspecified = 0,
	Ok = 1,
	NotSubscribed = 2,
	InvalidChannel = 3,
}
