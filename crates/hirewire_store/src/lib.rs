#![forbid(unsafe_code)]

//! Persistence layer for chat rooms, messages, and user snapshots.
//!
//! Backed by sqlx with sqlite and postgres backends selected by URL scheme.
//! Timestamps are unix milliseconds stored as 64-bit integers so ordering is
//! identical across backends.

use anyhow::{Context, anyhow};
use hirewire_domain::{ChatMessage, ChatRoom, RoomId, UserId};
use tracing::info;

/// A stored user snapshot, refreshed from verified token claims on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
	pub id: UserId,
	pub first_name: String,
	pub last_name: String,
	pub role: String,
}

impl UserRow {
	pub fn full_name(&self) -> String {
		match (self.first_name.is_empty(), self.last_name.is_empty()) {
			(true, true) => String::new(),
			(false, true) => self.first_name.clone(),
			(true, false) => self.last_name.clone(),
			(false, false) => format!("{} {}", self.first_name, self.last_name),
		}
	}
}

#[derive(Clone)]
enum Backend {
	Sqlite(sqlx::SqlitePool),
	Postgres(sqlx::PgPool),
}

/// Handle to the chat database. Cheap to clone.
#[derive(Clone)]
pub struct ChatStore {
	backend: Backend,
}

impl ChatStore {
	pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
		if database_url.starts_with("sqlite:") {
			let pool = sqlx::sqlite::SqlitePoolOptions::new()
				.max_connections(1)
				.idle_timeout(None)
				.max_lifetime(None)
				.connect(database_url)
				.await
				.context("connect sqlite")?;
			sqlx::migrate!("migrations/sqlite")
				.run(&pool)
				.await
				.context("run sqlite migrations")?;
			info!("sqlite migrations applied");

			Ok(Self {
				backend: Backend::Sqlite(pool),
			})
		} else if database_url.starts_with("postgres:") || database_url.starts_with("postgresql:") {
			let pool = sqlx::PgPool::connect(database_url).await.context("connect postgres")?;
			sqlx::migrate!("migrations/postgres")
				.run(&pool)
				.await
				.context("run postgres migrations")?;
			info!("postgres migrations applied");

			Ok(Self {
				backend: Backend::Postgres(pool),
			})
		} else {
			Err(anyhow!("unsupported database_url (use sqlite: or postgres:)"))
		}
	}

	/// Private sqlite database for tests and local scratch runs.
	pub async fn in_memory() -> anyhow::Result<Self> {
		Self::connect("sqlite::memory:").await
	}

	pub async fn upsert_user(&self, id: UserId, first_name: &str, last_name: &str, role: &str, now_unix_ms: i64) -> anyhow::Result<()> {
		match &self.backend {
			Backend::Sqlite(pool) => {
				sqlx::query(
					"INSERT INTO users (id, first_name, last_name, role, updated_at) VALUES (?, ?, ?, ?, ?) \
					ON CONFLICT(id) DO UPDATE SET first_name = excluded.first_name, last_name = excluded.last_name, \
					role = excluded.role, updated_at = excluded.updated_at",
				)
				.bind(id)
				.bind(first_name)
				.bind(last_name)
				.bind(role)
				.bind(now_unix_ms)
				.execute(pool)
				.await
				.context("upsert user (sqlite)")?;
			}
			Backend::Postgres(pool) => {
				sqlx::query(
					"INSERT INTO users (id, first_name, last_name, role, updated_at) VALUES ($1, $2, $3, $4, $5) \
					ON CONFLICT (id) DO UPDATE SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name, \
					role = EXCLUDED.role, updated_at = EXCLUDED.updated_at",
				)
				.bind(id)
				.bind(first_name)
				.bind(last_name)
				.bind(role)
				.bind(now_unix_ms)
				.execute(pool)
				.await
				.context("upsert user (postgres)")?;
			}
		}
		Ok(())
	}

	pub async fn user_by_id(&self, id: UserId) -> anyhow::Result<Option<UserRow>> {
		let row: Option<(i64, String, String, String)> = match &self.backend {
			Backend::Sqlite(pool) => {
				sqlx::query_as("SELECT id, first_name, last_name, role FROM users WHERE id = ?")
					.bind(id)
					.fetch_optional(pool)
					.await
					.context("select user (sqlite)")?
			}
			Backend::Postgres(pool) => {
				sqlx::query_as("SELECT id, first_name, last_name, role FROM users WHERE id = $1")
					.bind(id)
					.fetch_optional(pool)
					.await
					.context("select user (postgres)")?
			}
		};

		Ok(row.map(|(id, first_name, last_name, role)| UserRow {
			id,
			first_name,
			last_name,
			role,
		}))
	}

	/// Find the room for a (recruiter, candidate) pair, creating it if absent.
	///
	/// Returns the room plus whether this call created it. Uniqueness is
	/// enforced by the constraint, so concurrent callers converge on one row.
	pub async fn find_or_create_room(
		&self,
		recruiter_id: UserId,
		candidate_id: UserId,
		now_unix_ms: i64,
	) -> anyhow::Result<(ChatRoom, bool)> {
		let created = match &self.backend {
			Backend::Sqlite(pool) => {
				let res = sqlx::query(
					"INSERT INTO chat_rooms (recruiter_id, candidate_id, created_at) VALUES (?, ?, ?) \
					ON CONFLICT(recruiter_id, candidate_id) DO NOTHING",
				)
				.bind(recruiter_id)
				.bind(candidate_id)
				.bind(now_unix_ms)
				.execute(pool)
				.await
				.context("insert room (sqlite)")?;
				res.rows_affected() == 1
			}
			Backend::Postgres(pool) => {
				let res = sqlx::query(
					"INSERT INTO chat_rooms (recruiter_id, candidate_id, created_at) VALUES ($1, $2, $3) \
					ON CONFLICT (recruiter_id, candidate_id) DO NOTHING",
				)
				.bind(recruiter_id)
				.bind(candidate_id)
				.bind(now_unix_ms)
				.execute(pool)
				.await
				.context("insert room (postgres)")?;
				res.rows_affected() == 1
			}
		};

		let row: (i64, i64, i64, i64) = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query_as(
				"SELECT id, recruiter_id, candidate_id, created_at FROM chat_rooms \
				WHERE recruiter_id = ? AND candidate_id = ?",
			)
			.bind(recruiter_id)
			.bind(candidate_id)
			.fetch_one(pool)
			.await
			.context("select room (sqlite)")?,
			Backend::Postgres(pool) => sqlx::query_as(
				"SELECT id, recruiter_id, candidate_id, created_at FROM chat_rooms \
				WHERE recruiter_id = $1 AND candidate_id = $2",
			)
			.bind(recruiter_id)
			.bind(candidate_id)
			.fetch_one(pool)
			.await
			.context("select room (postgres)")?,
		};

		Ok((room_from_row(row), created))
	}

	pub async fn room_by_id(&self, id: RoomId) -> anyhow::Result<Option<ChatRoom>> {
		let row: Option<(i64, i64, i64, i64)> = match &self.backend {
			Backend::Sqlite(pool) => {
				sqlx::query_as("SELECT id, recruiter_id, candidate_id, created_at FROM chat_rooms WHERE id = ?")
					.bind(id)
					.fetch_optional(pool)
					.await
					.context("select room by id (sqlite)")?
			}
			Backend::Postgres(pool) => {
				sqlx::query_as("SELECT id, recruiter_id, candidate_id, created_at FROM chat_rooms WHERE id = $1")
					.bind(id)
					.fetch_optional(pool)
					.await
					.context("select room by id (postgres)")?
			}
		};

		Ok(row.map(room_from_row))
	}

	/// Rooms where the user is either side, newest first.
	pub async fn rooms_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<ChatRoom>> {
		let rows: Vec<(i64, i64, i64, i64)> = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query_as(
				"SELECT id, recruiter_id, candidate_id, created_at FROM chat_rooms \
				WHERE recruiter_id = ? OR candidate_id = ? ORDER BY created_at DESC, id DESC",
			)
			.bind(user_id)
			.bind(user_id)
			.fetch_all(pool)
			.await
			.context("select rooms for user (sqlite)")?,
			Backend::Postgres(pool) => sqlx::query_as(
				"SELECT id, recruiter_id, candidate_id, created_at FROM chat_rooms \
				WHERE recruiter_id = $1 OR candidate_id = $1 ORDER BY created_at DESC, id DESC",
			)
			.bind(user_id)
			.fetch_all(pool)
			.await
			.context("select rooms for user (postgres)")?,
		};

		Ok(rows.into_iter().map(room_from_row).collect())
	}

	pub async fn insert_message(
		&self,
		chat_room_id: RoomId,
		sender_id: UserId,
		content: &str,
		now_unix_ms: i64,
	) -> anyhow::Result<ChatMessage> {
		let (id,): (i64,) = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query_as(
				"INSERT INTO chat_messages (chat_room_id, sender_id, content, created_at, is_read) \
				VALUES (?, ?, ?, ?, 0) RETURNING id",
			)
			.bind(chat_room_id)
			.bind(sender_id)
			.bind(content)
			.bind(now_unix_ms)
			.fetch_one(pool)
			.await
			.context("insert message (sqlite)")?,
			Backend::Postgres(pool) => sqlx::query_as(
				"INSERT INTO chat_messages (chat_room_id, sender_id, content, created_at, is_read) \
				VALUES ($1, $2, $3, $4, FALSE) RETURNING id",
			)
			.bind(chat_room_id)
			.bind(sender_id)
			.bind(content)
			.bind(now_unix_ms)
			.fetch_one(pool)
			.await
			.context("insert message (postgres)")?,
		};

		Ok(ChatMessage {
			id,
			chat_room_id,
			sender_id,
			content: content.to_string(),
			created_at_unix_ms: now_unix_ms,
			is_read: false,
		})
	}

	/// Full history of a room in send order. Ties on timestamp break by row id
	/// so the order is total and stable.
	pub async fn history(&self, chat_room_id: RoomId) -> anyhow::Result<Vec<ChatMessage>> {
		let rows: Vec<(i64, i64, i64, String, i64, bool)> = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query_as(
				"SELECT id, chat_room_id, sender_id, content, created_at, is_read FROM chat_messages \
				WHERE chat_room_id = ? ORDER BY created_at ASC, id ASC",
			)
			.bind(chat_room_id)
			.fetch_all(pool)
			.await
			.context("select history (sqlite)")?,
			Backend::Postgres(pool) => sqlx::query_as(
				"SELECT id, chat_room_id, sender_id, content, created_at, is_read FROM chat_messages \
				WHERE chat_room_id = $1 ORDER BY created_at ASC, id ASC",
			)
			.bind(chat_room_id)
			.fetch_all(pool)
			.await
			.context("select history (postgres)")?,
		};

		Ok(rows.into_iter().map(message_from_row).collect())
	}

	/// Whether the recruiter has ever sent a message in this room. Gates
	/// candidate participation until the recruiter opens the conversation.
	pub async fn recruiter_has_messaged(&self, chat_room_id: RoomId, recruiter_id: UserId) -> anyhow::Result<bool> {
		let (exists,): (bool,) = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query_as(
				"SELECT EXISTS (SELECT 1 FROM chat_messages WHERE chat_room_id = ? AND sender_id = ?)",
			)
			.bind(chat_room_id)
			.bind(recruiter_id)
			.fetch_one(pool)
			.await
			.context("select recruiter messaged (sqlite)")?,
			Backend::Postgres(pool) => sqlx::query_as(
				"SELECT EXISTS (SELECT 1 FROM chat_messages WHERE chat_room_id = $1 AND sender_id = $2)",
			)
			.bind(chat_room_id)
			.bind(recruiter_id)
			.fetch_one(pool)
			.await
			.context("select recruiter messaged (postgres)")?,
		};

		Ok(exists)
	}

	/// Mark everything the counterpart sent in this room as read. Returns the
	/// number of rows flipped. Idempotent.
	pub async fn mark_read(&self, chat_room_id: RoomId, viewer_id: UserId) -> anyhow::Result<u64> {
		let res = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query(
				"UPDATE chat_messages SET is_read = 1 \
				WHERE chat_room_id = ? AND sender_id <> ? AND is_read = 0",
			)
			.bind(chat_room_id)
			.bind(viewer_id)
			.execute(pool)
			.await
			.context("mark read (sqlite)")?
			.rows_affected(),
			Backend::Postgres(pool) => sqlx::query(
				"UPDATE chat_messages SET is_read = TRUE \
				WHERE chat_room_id = $1 AND sender_id <> $2 AND is_read = FALSE",
			)
			.bind(chat_room_id)
			.bind(viewer_id)
			.execute(pool)
			.await
			.context("mark read (postgres)")?
			.rows_affected(),
		};

		Ok(res)
	}

	/// Unread messages in one room from the viewer's perspective. Messages the
	/// viewer sent never count.
	pub async fn unread_count_in_room(&self, chat_room_id: RoomId, viewer_id: UserId) -> anyhow::Result<i64> {
		let (count,): (i64,) = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query_as(
				"SELECT COUNT(*) FROM chat_messages \
				WHERE chat_room_id = ? AND sender_id <> ? AND is_read = 0",
			)
			.bind(chat_room_id)
			.bind(viewer_id)
			.fetch_one(pool)
			.await
			.context("unread count in room (sqlite)")?,
			Backend::Postgres(pool) => sqlx::query_as(
				"SELECT COUNT(*) FROM chat_messages \
				WHERE chat_room_id = $1 AND sender_id <> $2 AND is_read = FALSE",
			)
			.bind(chat_room_id)
			.bind(viewer_id)
			.fetch_one(pool)
			.await
			.context("unread count in room (postgres)")?,
		};

		Ok(count)
	}

	/// Total unread across every room the user belongs to.
	pub async fn unread_count_for_user(&self, user_id: UserId) -> anyhow::Result<i64> {
		let (count,): (i64,) = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query_as(
				"SELECT COUNT(*) FROM chat_messages m \
				JOIN chat_rooms r ON r.id = m.chat_room_id \
				WHERE (r.recruiter_id = ? OR r.candidate_id = ?) \
				AND m.sender_id <> ? AND m.is_read = 0",
			)
			.bind(user_id)
			.bind(user_id)
			.bind(user_id)
			.fetch_one(pool)
			.await
			.context("unread count for user (sqlite)")?,
			Backend::Postgres(pool) => sqlx::query_as(
				"SELECT COUNT(*) FROM chat_messages m \
				JOIN chat_rooms r ON r.id = m.chat_room_id \
				WHERE (r.recruiter_id = $1 OR r.candidate_id = $1) \
				AND m.sender_id <> $1 AND m.is_read = FALSE",
			)
			.bind(user_id)
			.fetch_one(pool)
			.await
			.context("unread count for user (postgres)")?,
		};

		Ok(count)
	}

	/// Most recent message in a room, if any, as (content, created_at).
	pub async fn last_message(&self, chat_room_id: RoomId) -> anyhow::Result<Option<(String, i64)>> {
		let row: Option<(String, i64)> = match &self.backend {
			Backend::Sqlite(pool) => sqlx::query_as(
				"SELECT content, created_at FROM chat_messages \
				WHERE chat_room_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
			)
			.bind(chat_room_id)
			.fetch_optional(pool)
			.await
			.context("select last message (sqlite)")?,
			Backend::Postgres(pool) => sqlx::query_as(
				"SELECT content, created_at FROM chat_messages \
				WHERE chat_room_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
			)
			.bind(chat_room_id)
			.fetch_optional(pool)
			.await
			.context("select last message (postgres)")?,
		};

		Ok(row)
	}
}

fn room_from_row((id, recruiter_id, candidate_id, created_at_unix_ms): (i64, i64, i64, i64)) -> ChatRoom {
	ChatRoom {
		id,
		recruiter_id,
		candidate_id,
		created_at_unix_ms,
	}
}

fn message_from_row(
	(id, chat_room_id, sender_id, content, created_at_unix_ms, is_read): (i64, i64, i64, String, i64, bool),
) -> ChatMessage {
	ChatMessage {
		id,
		chat_room_id,
		sender_id,
		content,
		created_at_unix_ms,
		is_read,
	}
}
