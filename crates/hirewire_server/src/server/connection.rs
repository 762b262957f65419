#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, anyhow};
use hirewire_domain::{ChatError, Identity, RoomId, SecretString};
use hirewire_protocol::framing::{DEFAULT_MAX_FRAME_SIZE, encode_frame};
use hirewire_protocol::pb;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::server::auth::{identity_from_claims, token_from_hello, verify_hmac_token};
use crate::server::chat::ChatService;
use crate::server::hub::{ChannelHub, HubItem};
use crate::util::time::unix_ms_now;

/// v1 protocol version written into `pb::Envelope.version`.
pub const PROTOCOL_VERSION: u32 = hirewire_protocol::version::PROTOCOL_MAJOR;

/// Per-connection server settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
	pub max_frame_bytes: u32,

	pub fan_in_channel_capacity: usize,

	/// Stable id for this server process, echoed in `Welcome`.
	pub server_instance_id: String,

	pub auth_hmac_secret: Option<SecretString>,

	pub send_rate_limit_per_conn_burst: u32,
	pub send_rate_limit_per_conn_per_minute: u32,
	pub send_rate_limit_per_room_burst: u32,
	pub send_rate_limit_per_room_per_minute: u32,
}

impl Default for ConnectionSettings {
	fn default() -> Self {
		Self {
			max_frame_bytes: DEFAULT_MAX_FRAME_SIZE as u32,
			fan_in_channel_capacity: 1024,
			server_instance_id: uuid::Uuid::new_v4().to_string(),
			auth_hmac_secret: None,
			send_rate_limit_per_conn_burst: 0,
			send_rate_limit_per_conn_per_minute: 0,
			send_rate_limit_per_room_burst: 0,
			send_rate_limit_per_room_per_minute: 0,
		}
	}
}

#[derive(Debug, Clone)]
struct TokenBucket {
	capacity: f64,
	tokens: f64,
	refill_per_sec: f64,
	last: Instant,
}

impl TokenBucket {
	fn new(capacity: u32, refill_per_minute: u32) -> Option<Self> {
		if capacity == 0 || refill_per_minute == 0 {
			return None;
		}
		Some(Self {
			capacity: capacity as f64,
			tokens: capacity as f64,
			refill_per_sec: refill_per_minute as f64 / 60.0,
			last: Instant::now(),
		})
	}

	fn allow(&mut self) -> bool {
		let now = Instant::now();
		let elapsed = now.duration_since(self.last).as_secs_f64();
		if elapsed > 0.0 {
			self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
			self.last = now;
		}
		if self.tokens >= 1.0 {
			self.tokens -= 1.0;
			true
		} else {
			false
		}
	}
}

#[derive(Debug)]
struct SendRateLimiter {
	per_connection: Option<TokenBucket>,
	per_room: HashMap<RoomId, TokenBucket>,
	per_room_burst: u32,
	per_room_per_minute: u32,
	max_rooms: usize,
}

impl SendRateLimiter {
	fn new(settings: &ConnectionSettings) -> Self {
		Self {
			per_connection: TokenBucket::new(
				settings.send_rate_limit_per_conn_burst,
				settings.send_rate_limit_per_conn_per_minute,
			),
			per_room: HashMap::new(),
			per_room_burst: settings.send_rate_limit_per_room_burst,
			per_room_per_minute: settings.send_rate_limit_per_room_per_minute,
			max_rooms: 1024,
		}
	}

	fn allow_connection(&mut self) -> bool {
		match self.per_connection.as_mut() {
			Some(bucket) => bucket.allow(),
			None => true,
		}
	}

	fn allow_room(&mut self, room_id: RoomId) -> bool {
		let Some(bucket) = TokenBucket::new(self.per_room_burst, self.per_room_per_minute) else {
			return true;
		};

		if self.per_room.len() >= self.max_rooms {
			self.per_room.clear();
		}

		let entry = self.per_room.entry(room_id).or_insert(bucket);
		entry.allow()
	}
}

pub async fn handle_connection(
	conn_id: u64,
	connection: quinn::Connection,
	chat: ChatService,
	hub: ChannelHub,
	settings: ConnectionSettings,
) -> anyhow::Result<()> {
	struct ConnectionGaugeGuard;
	impl Drop for ConnectionGaugeGuard {
		fn drop(&mut self) {
			metrics::gauge!("hirewire_server_active_connections").decrement(1.0);
		}
	}

	metrics::gauge!("hirewire_server_active_connections").increment(1.0);
	let _conn_guard = ConnectionGaugeGuard;

	let (mut control_send, mut control_recv) =
		connection.accept_bi().await.context("accept control bidirectional stream")?;

	let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<pb::Envelope>();
	let mut rate_limiter = SendRateLimiter::new(&settings);
	let reader_task = tokio::spawn(async move {
		let mut buf = Vec::<u8>::with_capacity(16 * 1024);
		let mut tmp = [0u8; 8192];

		loop {
			let n = match control_recv.read(&mut tmp).await {
				Ok(Some(n)) => n,
				Ok(None) => return Ok::<(), anyhow::Error>(()),
				Err(e) => return Err(anyhow!(e).context("control stream read failed")),
			};

			metrics::counter!("hirewire_server_control_bytes_in_total").increment(n as u64);

			buf.extend_from_slice(&tmp[..n]);

			loop {
				match hirewire_protocol::decode_frame::<pb::Envelope>(&buf, DEFAULT_MAX_FRAME_SIZE) {
					Ok((msg, used)) => {
						buf.drain(0..used);
						metrics::counter!("hirewire_server_envelopes_in_total").increment(1);

						if ctrl_tx.send(msg).is_err() {
							return Ok(());
						}
					}
					Err(hirewire_protocol::FramingError::InsufficientData { .. }) => break,
					Err(e) => {
						metrics::counter!("hirewire_server_control_decode_errors_total").increment(1);
						return Err(anyhow!(e).context("failed to decode control frame"));
					}
				}
			}
		}
	});

	let hello = wait_for_hello(&mut ctrl_rx).await?;
	let client_instance_id = if hello.client_instance_id.trim().is_empty() {
		format!("conn-{conn_id}")
	} else {
		hello.client_instance_id.clone()
	};

	info!(
		conn_id,
		client_name = %hello.client_name,
		client_instance_id = %client_instance_id,
		"received Hello"
	);
	metrics::counter!("hirewire_server_hello_total").increment(1);

	// Verify the token when one is offered. A missing or invalid token
	// leaves the connection anonymous; individual operations reject it.
	let mut identity: Option<Identity> = None;
	if let Some(secret) = settings.auth_hmac_secret.as_ref()
		&& let Some(token) = token_from_hello(&hello)
	{
		match verify_hmac_token(token, secret.expose()).and_then(|claims| identity_from_claims(&claims)) {
			Ok(verified) => {
				metrics::counter!("hirewire_server_authenticated_connections_total").increment(1);
				info!(conn_id, subject = verified.id, role = verified.role.as_str(), "token verified");
				identity = Some(verified);
			}
			Err(e) => {
				metrics::counter!("hirewire_server_auth_rejections_total").increment(1);
				warn!(conn_id, error = %e, "auth token rejected; connection stays anonymous");
			}
		}
	}

	if let Some(id) = identity.as_ref() {
		let (first, last) = match id.name.split_once(' ') {
			Some((first, last)) => (first, last),
			None => (id.name.as_str(), ""),
		};
		if let Err(e) = chat
			.store()
			.upsert_user(id.id, first, last, id.role.as_str(), unix_ms_now())
			.await
		{
			warn!(conn_id, error = %format!("{e:#}"), "failed to upsert user profile from claims");
		}
	}

	let welcome = pb::Welcome {
		server_name: format!("hirewire-server/{}", env!("CARGO_PKG_VERSION")),
		server_instance_id: settings.server_instance_id.clone(),
		server_time_unix_ms: unix_ms_now(),
		max_frame_bytes: settings.max_frame_bytes,
		authenticated: identity.is_some(),
		subject: identity.as_ref().map(|id| id.id).unwrap_or(0),
	};

	send_envelope(
		&mut control_send,
		pb::Envelope {
			version: PROTOCOL_VERSION,
			request_id: String::new(),
			msg: Some(pb::envelope::Msg::Welcome(welcome)),
		},
	)
	.await
	.context("send Welcome")?;

	let events_send: Arc<Mutex<Option<quinn::SendStream>>> = Arc::new(Mutex::new(None));
	let subscriptions: Arc<RwLock<HashSet<String>>> = Arc::new(RwLock::new(HashSet::new()));

	let hub_for_events = hub.clone();
	let events_send_for_task = Arc::clone(&events_send);
	let subscriptions_for_task = Arc::clone(&subscriptions);

	let events_task = tokio::spawn(async move {
		let (fan_in_tx, mut fan_in_rx) = mpsc::channel::<(String, HubItem)>(settings.fan_in_channel_capacity);

		let mut channel_tasks: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();

		async fn ensure_channel_task(
			channel: &str,
			hub: &ChannelHub,
			fan_in_tx: &mpsc::Sender<(String, HubItem)>,
			channel_tasks: &mut HashMap<String, tokio::task::JoinHandle<()>>,
		) {
			if channel_tasks.contains_key(channel) {
				return;
			}

			let mut rx = hub.subscribe(channel).await;

			let channel_s = channel.to_string();
			let tx = fan_in_tx.clone();

			let handle = tokio::spawn(async move {
				while let Some(item) = rx.recv().await {
					if tx.send((channel_s.clone(), item)).await.is_err() {
						break;
					}
				}
			});

			channel_tasks.insert(channel.to_string(), handle);
		}

		async fn reconcile_channel_tasks(
			subscriptions: &Arc<RwLock<HashSet<String>>>,
			hub: &ChannelHub,
			fan_in_tx: &mpsc::Sender<(String, HubItem)>,
			channel_tasks: &mut HashMap<String, tokio::task::JoinHandle<()>>,
		) -> HashSet<String> {
			let channels: HashSet<String> = subscriptions.read().await.clone();

			for channel in channels.iter() {
				ensure_channel_task(channel, hub, fan_in_tx, channel_tasks).await;
			}

			channel_tasks.retain(|channel, handle| {
				if channels.contains(channel) {
					true
				} else {
					handle.abort();
					false
				}
			});

			channels
		}

		let mut current_channels =
			reconcile_channel_tasks(&subscriptions_for_task, &hub_for_events, &fan_in_tx, &mut channel_tasks).await;

		loop {
			if current_channels.is_empty() {
				tokio::time::sleep(std::time::Duration::from_millis(25)).await;
				current_channels =
					reconcile_channel_tasks(&subscriptions_for_task, &hub_for_events, &fan_in_tx, &mut channel_tasks)
						.await;
				continue;
			}

			let (channel, item) = match fan_in_rx.recv().await {
				Some(v) => v,
				None => return Ok::<(), anyhow::Error>(()),
			};

			if !current_channels.contains(&channel) {
				continue;
			}

			let mut guard = events_send_for_task.lock().await;
			let Some(events_send) = guard.as_mut() else {
				// Events stream not open yet; live fan-out has nothing to
				// deliver to. History covers what the client missed.
				continue;
			};

			let kind = match item {
				HubItem::Chat(message) => pb::event::Kind::ChatMessage(pb::ChatMessage {
					id: message.id,
					chat_room_id: message.chat_room_id,
					sender_id: message.sender_id,
					content: message.content,
					timestamp_unix_ms: message.created_at_unix_ms,
					is_read: message.is_read,
				}),
				HubItem::RoomCreated(summary) => pb::event::Kind::RoomCreated(pb::RoomSummary {
					id: summary.id,
					recruiter_id: summary.recruiter_id,
					recruiter_name: summary.recruiter_name,
					candidate_id: summary.candidate_id,
					candidate_name: summary.candidate_name,
					last_message: summary.last_message,
					last_message_unix_ms: summary.last_message_unix_ms,
					unread_count: summary.unread_count,
				}),
				HubItem::Lagged { dropped } => {
					warn!(
						conn_id,
						channel = %channel,
						dropped,
						"channel subscription lagged; events were dropped"
					);
					metrics::counter!("hirewire_server_events_lagged_total").increment(dropped);
					pb::event::Kind::Lagged(pb::LaggedEvent {
						dropped,
						detail: "channel subscriber queue full".to_string(),
					})
				}
			};

			let event = pb::Event {
				channel: channel.clone(),
				server_time_unix_ms: unix_ms_now(),
				kind: Some(kind),
			};

			let frame = match encode_frame(
				&pb::Envelope {
					version: PROTOCOL_VERSION,
					request_id: String::new(),
					msg: Some(pb::envelope::Msg::Event(event)),
				},
				DEFAULT_MAX_FRAME_SIZE,
			) {
				Ok(f) => f,
				Err(e) => {
					error!(conn_id, error = %e, "failed to encode event frame");
					return Err::<(), anyhow::Error>(anyhow!(e));
				}
			};

			metrics::counter!("hirewire_server_events_out_total").increment(1);
			debug!(conn_id, channel = %channel, frame_len = frame.len(), "writing event frame to events stream");

			if let Err(e) = events_send.write_all(&frame).await {
				return Err(anyhow!(e).context("events stream write failed"));
			}

			current_channels =
				reconcile_channel_tasks(&subscriptions_for_task, &hub_for_events, &fan_in_tx, &mut channel_tasks).await;
		}
	});

	let loop_result = async {
		while let Some(env) = ctrl_rx.recv().await {
			let Some(msg) = env.msg else {
				metrics::counter!("hirewire_server_protocol_errors_total").increment(1);
				send_envelope(
					&mut control_send,
					error_envelope(env.request_id, "INVALID_REQUEST", "envelope carries no message"),
				)
				.await?;
				continue;
			};

			match msg {
				pb::envelope::Msg::Ping(ping) => {
					let pong = pb::Pong {
						client_time_unix_ms: ping.client_time_unix_ms,
						server_time_unix_ms: unix_ms_now(),
					};

					send_envelope(
						&mut control_send,
						pb::Envelope {
							version: PROTOCOL_VERSION,
							request_id: env.request_id,
							msg: Some(pb::envelope::Msg::Pong(pong)),
						},
					)
					.await?;
				}

				pb::envelope::Msg::Subscribe(sub) => {
					metrics::counter!("hirewire_server_subscribe_requests_total").increment(1);
					metrics::counter!("hirewire_server_subscribe_channels_total").increment(sub.channels.len() as u64);
					debug!(conn_id, channels = ?sub.channels, "received Subscribe");

					let mut results = Vec::with_capacity(sub.channels.len());
					let mut granted = Vec::new();
					for channel in &sub.channels {
						match chat.authorize_subscription(identity.as_ref(), channel).await {
							Ok(_) => {
								granted.push(channel.clone());
								results.push(pb::SubscriptionResult {
									channel: channel.clone(),
									status: pb::SubscribeStatus::Ok as i32,
									detail: String::new(),
								});
							}
							Err(e) => {
								metrics::counter!("hirewire_server_subscribe_rejected_total").increment(1);
								results.push(pb::SubscriptionResult {
									channel: channel.clone(),
									status: subscribe_status(&e) as i32,
									detail: e.to_string(),
								});
							}
						}
					}

					let any_granted = !granted.is_empty();
					if any_granted {
						let mut subs = subscriptions.write().await;
						subs.extend(granted);
					}

					send_envelope(
						&mut control_send,
						pb::Envelope {
							version: PROTOCOL_VERSION,
							request_id: env.request_id,
							msg: Some(pb::envelope::Msg::Subscribed(pb::Subscribed { results })),
						},
					)
					.await?;

					// Only wait for the client-opened events stream once a
					// channel was actually granted; a fully denied Subscribe
					// must not stall the control loop.
					let mut guard = events_send.lock().await;
					if any_granted && guard.is_none() {
						info!(
							conn_id,
							"waiting to accept events bidirectional stream (client-opened; after Subscribed)"
						);
						let (send, _recv) = connection.accept_bi().await.context("accept events bidirectional stream")?;
						info!(conn_id, "accepted events bidirectional stream (server will only write)");
						*guard = Some(send);
					}
				}

				pb::envelope::Msg::Unsubscribe(unsub) => {
					metrics::counter!("hirewire_server_unsubscribe_requests_total").increment(1);

					let mut results = Vec::with_capacity(unsub.channels.len());
					{
						let mut subs = subscriptions.write().await;
						for channel in &unsub.channels {
							let status = if subs.remove(channel) {
								pb::UnsubscribeStatus::Ok
							} else if channel.parse::<hirewire_domain::Destination>().is_err() {
								pb::UnsubscribeStatus::InvalidChannel
							} else {
								pb::UnsubscribeStatus::NotSubscribed
							};
							results.push(pb::UnsubscribeResult {
								channel: channel.clone(),
								status: status as i32,
								detail: String::new(),
							});
						}
					}

					send_envelope(
						&mut control_send,
						pb::Envelope {
							version: PROTOCOL_VERSION,
							request_id: env.request_id,
							msg: Some(pb::envelope::Msg::Unsubscribed(pb::Unsubscribed { results })),
						},
					)
					.await?;
				}

				pb::envelope::Msg::SendChat(send_chat) => {
					let result = handle_send_chat(conn_id, identity.as_ref(), &chat, &mut rate_limiter, &send_chat).await;
					send_envelope(
						&mut control_send,
						pb::Envelope {
							version: PROTOCOL_VERSION,
							request_id: env.request_id,
							msg: Some(pb::envelope::Msg::SendChatResult(result)),
						},
					)
					.await?;
				}

				pb::envelope::Msg::Request(req) => {
					let response = handle_request(conn_id, identity.as_ref(), &chat, req).await;
					send_envelope(
						&mut control_send,
						pb::Envelope {
							version: PROTOCOL_VERSION,
							request_id: env.request_id,
							msg: Some(pb::envelope::Msg::Response(response)),
						},
					)
					.await?;
				}

				pb::envelope::Msg::Hello(_) => {
					debug!(conn_id, "ignoring duplicate Hello");
				}

				other => {
					warn!(conn_id, "unexpected control message: {:?}", other);
					metrics::counter!("hirewire_server_protocol_errors_total").increment(1);
					send_envelope(
						&mut control_send,
						error_envelope(env.request_id, "INVALID_REQUEST", "unexpected control message"),
					)
					.await?;
				}
			}
		}
		Ok::<(), anyhow::Error>(())
	}
	.await;

	{
		let mut subs = subscriptions.write().await;
		if !subs.is_empty() {
			debug!(conn_id, channels = ?subs.iter().collect::<Vec<_>>(), "connection closing, removing subscriptions");
		}
		subs.clear();
	}

	events_task.abort();
	let _ = reader_task.await;
	let _ = events_task.await;

	loop_result
}

async fn wait_for_hello(ctrl_rx: &mut mpsc::UnboundedReceiver<pb::Envelope>) -> anyhow::Result<pb::Hello> {
	while let Some(env) = ctrl_rx.recv().await {
		let Some(msg) = env.msg else { continue };
		if let pb::envelope::Msg::Hello(h) = msg {
			return Ok(h);
		}
	}
	Err(anyhow!("connection closed before Hello"))
}

async fn handle_send_chat(
	conn_id: u64,
	identity: Option<&Identity>,
	chat: &ChatService,
	rate_limiter: &mut SendRateLimiter,
	send_chat: &pb::SendChat,
) -> pb::SendChatResult {
	// Authentication is checked before the limiter so an anonymous send is
	// reported as unauthenticated, not rate limited.
	if identity.is_none() {
		metrics::counter!("hirewire_server_sends_rejected_total").increment(1);
		return pb::SendChatResult {
			status: op_status(&ChatError::Unauthenticated) as i32,
			detail: ChatError::Unauthenticated.to_string(),
			message: None,
		};
	}

	if !rate_limiter.allow_connection() {
		metrics::counter!("hirewire_server_sends_rate_limited_total").increment(1);
		metrics::counter!("hirewire_server_sends_rate_limited_connection_total").increment(1);
		return pb::SendChatResult {
			status: pb::OpStatus::Unauthorized as i32,
			detail: "rate limited".to_string(),
			message: None,
		};
	}

	if !rate_limiter.allow_room(send_chat.chat_room_id) {
		metrics::counter!("hirewire_server_sends_rate_limited_total").increment(1);
		metrics::counter!("hirewire_server_sends_rate_limited_room_total").increment(1);
		return pb::SendChatResult {
			status: pb::OpStatus::Unauthorized as i32,
			detail: "rate limited".to_string(),
			message: None,
		};
	}

	metrics::counter!("hirewire_server_sends_total").increment(1);

	match chat.send_message(identity, send_chat.chat_room_id, &send_chat.content).await {
		Ok(message) => {
			debug!(conn_id, room_id = message.chat_room_id, message_id = message.id, "message sent");
			pb::SendChatResult {
				status: pb::OpStatus::Ok as i32,
				detail: String::new(),
				message: Some(pb::ChatMessage {
					id: message.id,
					chat_room_id: message.chat_room_id,
					sender_id: message.sender_id,
					content: message.content,
					timestamp_unix_ms: message.created_at_unix_ms,
					is_read: message.is_read,
				}),
			}
		}
		Err(e) => {
			metrics::counter!("hirewire_server_sends_rejected_total").increment(1);
			pb::SendChatResult {
				status: op_status(&e) as i32,
				detail: e.to_string(),
				message: None,
			}
		}
	}
}

async fn handle_request(conn_id: u64, identity: Option<&Identity>, chat: &ChatService, req: pb::Request) -> pb::Response {
	metrics::counter!("hirewire_server_requests_total").increment(1);

	let Some(req) = req.req else {
		metrics::counter!("hirewire_server_requests_invalid_payload_total").increment(1);
		return pb::Response {
			status: pb::OpStatus::InvalidRequest as i32,
			detail: "missing request payload".to_string(),
			body: None,
		};
	};

	let result = match req {
		pb::request::Req::InitiateChat(r) => {
			debug!(conn_id, candidate_id = r.candidate_id, "received InitiateChat");
			chat.initiate_chat(identity, r.candidate_id).await.map(|summary| pb::Response {
				status: pb::OpStatus::Ok as i32,
				detail: String::new(),
				body: Some(pb::response::Body::Room(room_summary_to_pb(summary))),
			})
		}
		pb::request::Req::ListRooms(_) => chat.list_rooms(identity).await.map(|overview| pb::Response {
			status: pb::OpStatus::Ok as i32,
			detail: String::new(),
			body: Some(pb::response::Body::Rooms(pb::RoomList {
				rooms: overview.rooms.into_iter().map(room_summary_to_pb).collect(),
				total_unread: overview.total_unread,
			})),
		}),
		pb::request::Req::GetHistory(r) => {
			debug!(conn_id, room_id = r.chat_room_id, "received GetHistory");
			chat.history(identity, r.chat_room_id).await.map(|messages| pb::Response {
				status: pb::OpStatus::Ok as i32,
				detail: String::new(),
				body: Some(pb::response::Body::History(pb::MessageList {
					messages: messages
						.into_iter()
						.map(|m| pb::ChatMessage {
							id: m.id,
							chat_room_id: m.chat_room_id,
							sender_id: m.sender_id,
							content: m.content,
							timestamp_unix_ms: m.created_at_unix_ms,
							is_read: m.is_read,
						})
						.collect(),
				})),
			})
		}
		pb::request::Req::MarkRead(r) => chat.mark_read(identity, r.chat_room_id).await.map(|flipped| pb::Response {
			status: pb::OpStatus::Ok as i32,
			detail: format!("marked {flipped} messages read"),
			body: None,
		}),
	};

	match result {
		Ok(response) => response,
		Err(e) => {
			metrics::counter!("hirewire_server_requests_rejected_total").increment(1);
			pb::Response {
				status: op_status(&e) as i32,
				detail: e.to_string(),
				body: None,
			}
		}
	}
}

fn room_summary_to_pb(summary: hirewire_domain::RoomSummary) -> pb::RoomSummary {
	pb::RoomSummary {
		id: summary.id,
		recruiter_id: summary.recruiter_id,
		recruiter_name: summary.recruiter_name,
		candidate_id: summary.candidate_id,
		candidate_name: summary.candidate_name,
		last_message: summary.last_message,
		last_message_unix_ms: summary.last_message_unix_ms,
		unread_count: summary.unread_count,
	}
}

fn error_envelope(request_id: String, code: &str, message: &str) -> pb::Envelope {
	pb::Envelope {
		version: PROTOCOL_VERSION,
		request_id: request_id.clone(),
		msg: Some(pb::envelope::Msg::Error(pb::Error {
			code: code.to_string(),
			message: message.to_string(),
			channel: String::new(),
			request_id,
		})),
	}
}

fn op_status(e: &ChatError) -> pb::OpStatus {
	match e {
		ChatError::Unauthenticated | ChatError::Unauthorized(_) => pb::OpStatus::Unauthorized,
		ChatError::NotFound(_) => pb::OpStatus::NotFound,
		ChatError::ConversationNotStarted => pb::OpStatus::ConversationNotStarted,
		ChatError::InvalidRequest(_) => pb::OpStatus::InvalidRequest,
		ChatError::Conflict(_) => pb::OpStatus::Conflict,
		ChatError::Internal(_) => pb::OpStatus::InternalError,
	}
}

fn subscribe_status(e: &ChatError) -> pb::SubscribeStatus {
	match e {
		ChatError::InvalidRequest(_) => pb::SubscribeStatus::InvalidChannel,
		_ => pb::SubscribeStatus::Unauthorized,
	}
}

async fn send_envelope(send: &mut quinn::SendStream, env: pb::Envelope) -> anyhow::Result<()> {
	let frame = encode_frame(&env, DEFAULT_MAX_FRAME_SIZE).map_err(|e| anyhow!(e))?;
	metrics::counter!("hirewire_server_envelopes_out_total").increment(1);
	metrics::counter!("hirewire_server_control_bytes_out_total").increment(frame.len() as u64);

	send.write_all(&frame).await.context("stream write")?;
	Ok(())
}
