use hirewire_store::ChatStore;

const RECRUITER: i64 = 100;
const CANDIDATE: i64 = 200;

#[tokio::test]
async fn upsert_user_inserts_then_updates() {
	let store = ChatStore::in_memory().await.expect("store");

	store.upsert_user(RECRUITER, "Ada", "Lovelace", "RECRUITER", 1_000).await.expect("insert");
	let row = store.user_by_id(RECRUITER).await.expect("select").expect("some");
	assert_eq!(row.role, "RECRUITER");
	assert_eq!(row.full_name(), "Ada Lovelace");

	store.upsert_user(RECRUITER, "Ada", "King", "RECRUITER", 2_000).await.expect("update");
	let row = store.user_by_id(RECRUITER).await.expect("select").expect("some");
	assert_eq!(row.full_name(), "Ada King");

	assert!(store.user_by_id(999).await.expect("select").is_none());
}

#[tokio::test]
async fn find_or_create_room_converges_on_one_row() {
	let store = ChatStore::in_memory().await.expect("store");

	let (room, created) = store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await.expect("create");
	assert!(created);
	assert_eq!(room.recruiter_id, RECRUITER);
	assert_eq!(room.candidate_id, CANDIDATE);

	let (again, created) = store.find_or_create_room(RECRUITER, CANDIDATE, 9_999).await.expect("lookup");
	assert!(!created);
	assert_eq!(again.id, room.id);
	assert_eq!(again.created_at_unix_ms, 1_000);

	let (other, created) = store.find_or_create_room(RECRUITER, CANDIDATE + 1, 1_500).await.expect("create other");
	assert!(created);
	assert_ne!(other.id, room.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_find_or_create_converges_on_one_room() {
	let path = std::env::temp_dir().join(format!(
		"hirewire-store-race-{}-{}.db",
		std::process::id(),
		std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|d| d.as_nanos())
			.unwrap_or_default()
	));
	let url = format!("sqlite://{}?mode=rwc", path.display());

	// Two stores, two pools, two sqlite connections to the same file, so the
	// inserts genuinely race instead of serializing through one pool.
	let store_a = ChatStore::connect(&url).await.expect("store a");
	let store_b = ChatStore::connect(&url).await.expect("store b");

	let a = tokio::spawn({
		let store = store_a.clone();
		async move { store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await }
	});
	let b = tokio::spawn({
		let store = store_b.clone();
		async move { store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await }
	});

	let (room_a, created_a) = a.await.expect("join a").expect("initiate a");
	let (room_b, created_b) = b.await.expect("join b").expect("initiate b");

	assert_eq!(room_a.id, room_b.id);
	assert!(created_a ^ created_b, "exactly one insert may win (a={created_a}, b={created_b})");

	let rooms = store_a.rooms_for_user(CANDIDATE).await.expect("rooms");
	assert_eq!(rooms.len(), 1);

	drop(store_a);
	drop(store_b);
	for suffix in ["", "-wal", "-shm", "-journal"] {
		let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
	}
}

#[tokio::test]
async fn rooms_for_user_covers_both_sides() {
	let store = ChatStore::in_memory().await.expect("store");

	let (a, _) = store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await.expect("a");
	let (b, _) = store.find_or_create_room(RECRUITER + 1, CANDIDATE, 2_000).await.expect("b");

	let recruiter_rooms = store.rooms_for_user(RECRUITER).await.expect("recruiter rooms");
	assert_eq!(recruiter_rooms.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a.id]);

	// Newest first.
	let candidate_rooms = store.rooms_for_user(CANDIDATE).await.expect("candidate rooms");
	assert_eq!(candidate_rooms.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id, a.id]);
}

#[tokio::test]
async fn history_is_ordered_with_id_tiebreak() {
	let store = ChatStore::in_memory().await.expect("store");
	let (room, _) = store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await.expect("room");

	let m1 = store.insert_message(room.id, RECRUITER, "first", 5_000).await.expect("m1");
	// Same timestamp as m1, so row id must break the tie.
	let m2 = store.insert_message(room.id, CANDIDATE, "second", 5_000).await.expect("m2");
	let m3 = store.insert_message(room.id, RECRUITER, "third", 6_000).await.expect("m3");

	let history = store.history(room.id).await.expect("history");
	assert_eq!(history.iter().map(|m| m.id).collect::<Vec<_>>(), vec![m1.id, m2.id, m3.id]);
	assert_eq!(history[0].content, "first");
	assert!(!history[0].is_read);

	assert!(store.history(room.id + 1).await.expect("empty").is_empty());
}

#[tokio::test]
async fn recruiter_has_messaged_gates_on_actual_sends() {
	let store = ChatStore::in_memory().await.expect("store");
	let (room, _) = store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await.expect("room");

	assert!(!store.recruiter_has_messaged(room.id, RECRUITER).await.expect("before"));

	store.insert_message(room.id, RECRUITER, "hello", 2_000).await.expect("send");
	assert!(store.recruiter_has_messaged(room.id, RECRUITER).await.expect("after"));
}

#[tokio::test]
async fn mark_read_flips_only_counterpart_messages() {
	let store = ChatStore::in_memory().await.expect("store");
	let (room, _) = store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await.expect("room");

	store.insert_message(room.id, RECRUITER, "a", 2_000).await.expect("a");
	store.insert_message(room.id, RECRUITER, "b", 3_000).await.expect("b");
	store.insert_message(room.id, CANDIDATE, "c", 4_000).await.expect("c");

	assert_eq!(store.unread_count_in_room(room.id, CANDIDATE).await.expect("count"), 2);

	let flipped = store.mark_read(room.id, CANDIDATE).await.expect("mark");
	assert_eq!(flipped, 2);
	assert_eq!(store.unread_count_in_room(room.id, CANDIDATE).await.expect("count"), 0);

	// Candidate's own message is still unread from the recruiter's side.
	assert_eq!(store.unread_count_in_room(room.id, RECRUITER).await.expect("count"), 1);

	// Idempotent.
	assert_eq!(store.mark_read(room.id, CANDIDATE).await.expect("mark again"), 0);
}

#[tokio::test]
async fn unread_count_for_user_spans_rooms() {
	let store = ChatStore::in_memory().await.expect("store");
	let (a, _) = store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await.expect("a");
	let (b, _) = store.find_or_create_room(RECRUITER + 1, CANDIDATE, 1_000).await.expect("b");

	store.insert_message(a.id, RECRUITER, "one", 2_000).await.expect("one");
	store.insert_message(b.id, RECRUITER + 1, "two", 2_000).await.expect("two");
	store.insert_message(a.id, CANDIDATE, "reply", 3_000).await.expect("reply");

	assert_eq!(store.unread_count_for_user(CANDIDATE).await.expect("candidate"), 2);
	assert_eq!(store.unread_count_for_user(RECRUITER).await.expect("recruiter"), 1);
	assert_eq!(store.unread_count_for_user(999).await.expect("stranger"), 0);
}

#[tokio::test]
async fn last_message_tracks_newest() {
	let store = ChatStore::in_memory().await.expect("store");
	let (room, _) = store.find_or_create_room(RECRUITER, CANDIDATE, 1_000).await.expect("room");

	assert!(store.last_message(room.id).await.expect("empty").is_none());

	store.insert_message(room.id, RECRUITER, "old", 2_000).await.expect("old");
	store.insert_message(room.id, CANDIDATE, "new", 3_000).await.expect("new");

	let (content, at) = store.last_message(room.id).await.expect("some").expect("row");
	assert_eq!(content, "new");
	assert_eq!(at, 3_000);
}
