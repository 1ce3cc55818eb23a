use hydrate_core::db::open_db_in_memory;
use hydrate_core::{
    ClientHint, MemoryNotificationRepository, MemoryReactionStore, NewNotification,
    Notification, NotificationDelivery, NotificationError, NotificationId, NotificationKind,
    NotificationListQuery, NotificationRepository, NotificationResult, Post, ReactionEngine,
    ReactionError, ReactionKind, ReactionState, ReactionStore, SqliteNotificationRepository,
    SqliteReactionStore, Transition, UserId,
};

fn user(value: &str) -> UserId {
    UserId::parse(value).unwrap()
}

fn seed_post<S: ReactionStore, N: NotificationRepository>(
    engine: &ReactionEngine<S, N>,
    author: &UserId,
) -> Post {
    let post = Post::new(author.clone(), "Bebedouro novo no parque").unwrap();
    engine.store().create_post(&post).unwrap();
    post
}

fn author_inbox<S: ReactionStore, N: NotificationRepository>(
    engine: &ReactionEngine<S, N>,
    author: &UserId,
) -> Vec<Notification> {
    engine
        .notifications()
        .list_for_target(author, &NotificationListQuery::default())
        .unwrap()
}

fn like_dislike_dislike_scenario<S: ReactionStore, N: NotificationRepository>(
    engine: &ReactionEngine<S, N>,
) {
    let author = user("author");
    let alice = user("alice");
    let post = seed_post(engine, &author);

    let liked = engine
        .toggle_reaction(post.id, &alice, ReactionKind::Like)
        .unwrap();
    assert_eq!((liked.like_count, liked.dislike_count), (1, 0));
    assert_eq!(liked.user_state, ReactionState::Liked);
    assert!(matches!(
        liked.notification,
        NotificationDelivery::Delivered { .. }
    ));
    let inbox = author_inbox(engine, &author);
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Like);
    assert_eq!(inbox[0].post_id, Some(post.id));
    assert_eq!(inbox[0].actor_id.as_ref(), Some(&alice));
    assert!(!inbox[0].message.contains(alice.as_str()));

    let switched = engine
        .toggle_reaction(post.id, &alice, ReactionKind::Dislike)
        .unwrap();
    assert_eq!((switched.like_count, switched.dislike_count), (0, 1));
    assert_eq!(switched.transition, Transition::SwitchLikeToDislike);
    assert_eq!(switched.notification, NotificationDelivery::NotRequired);
    let stored = engine.store().get_post(post.id).unwrap().unwrap();
    assert!(stored.liked_by.is_empty());
    assert!(stored.disliked_by.contains(&alice));

    let cleared = engine
        .toggle_reaction(post.id, &alice, ReactionKind::Dislike)
        .unwrap();
    assert_eq!((cleared.like_count, cleared.dislike_count), (0, 0));
    assert_eq!(cleared.user_state, ReactionState::Neutral);
    assert_eq!(author_inbox(engine, &author).len(), 1);
}

#[test]
fn scenario_like_then_dislike_then_dislike_in_memory() {
    let engine = ReactionEngine::new(
        MemoryReactionStore::new(),
        MemoryNotificationRepository::new(),
    );
    like_dislike_dislike_scenario(&engine);
}

#[test]
fn scenario_like_then_dislike_then_dislike_sqlite() {
    let conn = open_db_in_memory().unwrap();
    let engine = ReactionEngine::new(
        SqliteReactionStore::new(&conn),
        SqliteNotificationRepository::new(&conn),
    );
    like_dislike_dislike_scenario(&engine);
}

#[test]
fn second_like_press_unlikes_silently() {
    let conn = open_db_in_memory().unwrap();
    let engine = ReactionEngine::new(
        SqliteReactionStore::new(&conn),
        SqliteNotificationRepository::new(&conn),
    );
    let author = user("author");
    let bob = user("bob");
    let post = seed_post(&engine, &author);

    engine
        .toggle_reaction(post.id, &bob, ReactionKind::Like)
        .unwrap();
    let second = engine
        .toggle_reaction(post.id, &bob, ReactionKind::Like)
        .unwrap();

    assert_eq!(second.transition, Transition::RemoveLike);
    assert_eq!(second.user_state, ReactionState::Neutral);
    assert_eq!(second.like_count, 0);
    assert_eq!(second.notification, NotificationDelivery::NotRequired);
    assert_eq!(author_inbox(&engine, &author).len(), 1);
}

#[test]
fn switch_from_dislike_to_like_notifies_and_moves_both_counts() {
    let conn = open_db_in_memory().unwrap();
    let engine = ReactionEngine::new(
        SqliteReactionStore::new(&conn),
        SqliteNotificationRepository::new(&conn),
    );
    let author = user("author");
    let carol = user("carol");
    let post = seed_post(&engine, &author);

    let disliked = engine
        .toggle_reaction(post.id, &carol, ReactionKind::Dislike)
        .unwrap();
    assert_eq!(disliked.notification, NotificationDelivery::NotRequired);
    assert!(author_inbox(&engine, &author).is_empty());

    let liked = engine
        .toggle_reaction(post.id, &carol, ReactionKind::Like)
        .unwrap();
    assert_eq!(liked.transition, Transition::SwitchDislikeToLike);
    assert_eq!(
        (liked.like_count, liked.dislike_count),
        (disliked.like_count + 1, disliked.dislike_count - 1)
    );
    assert!(matches!(
        liked.notification,
        NotificationDelivery::Delivered { .. }
    ));
    assert_eq!(author_inbox(&engine, &author).len(), 1);
}

#[test]
fn reacting_to_own_post_never_notifies() {
    let engine = ReactionEngine::new(
        MemoryReactionStore::new(),
        MemoryNotificationRepository::new(),
    );
    let author = user("author");
    let post = seed_post(&engine, &author);

    for kind in [
        ReactionKind::Like,
        ReactionKind::Dislike,
        ReactionKind::Like,
        ReactionKind::Like,
        ReactionKind::Dislike,
    ] {
        let outcome = engine.toggle_reaction(post.id, &author, kind).unwrap();
        assert_eq!(outcome.notification, NotificationDelivery::NotRequired);
    }
    assert!(author_inbox(&engine, &author).is_empty());
}

#[test]
fn every_press_sequence_keeps_membership_disjoint_and_counts_exact() {
    let conn = open_db_in_memory().unwrap();
    let engine = ReactionEngine::new(
        SqliteReactionStore::new(&conn),
        SqliteNotificationRepository::new(&conn),
    );
    let author = user("author");
    let dana = user("dana");
    let eve = user("eve");

    for mask in 0u32..(1 << 5) {
        let post = seed_post(&engine, &author);
        engine
            .toggle_reaction(post.id, &eve, ReactionKind::Dislike)
            .unwrap();

        for step in 0..5 {
            let kind = if mask & (1 << step) == 0 {
                ReactionKind::Like
            } else {
                ReactionKind::Dislike
            };
            let before = engine.user_state(post.id, &dana).unwrap();
            let outcome = engine.toggle_reaction(post.id, &dana, kind).unwrap();
            assert_eq!(outcome.user_state, before.press(kind).target());

            let stored = engine.store().get_post(post.id).unwrap().unwrap();
            stored.validate().unwrap();
            assert!(!(stored.liked_by.contains(&dana) && stored.disliked_by.contains(&dana)));
            assert_eq!(stored.like_count, outcome.like_count);
            assert_eq!(stored.dislike_count, outcome.dislike_count);
            assert!(stored.disliked_by.contains(&eve));
        }
    }
}

#[test]
fn missing_post_fails_without_mutation_or_notification() {
    let conn = open_db_in_memory().unwrap();
    let engine = ReactionEngine::new(
        SqliteReactionStore::new(&conn),
        SqliteNotificationRepository::new(&conn),
    );
    let author = user("author");
    let post = seed_post(&engine, &author);
    engine.store().delete_post(post.id).unwrap();

    let err = engine
        .toggle_reaction(post.id, &user("frank"), ReactionKind::Like)
        .unwrap_err();
    assert!(matches!(err, ReactionError::NotFound(id) if id == post.id));
    assert_eq!(err.client_hint(), ClientHint::RefreshFeed);
    assert!(author_inbox(&engine, &author).is_empty());

    let reaction_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM post_reactions WHERE post_uuid = ?1;",
            [post.id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(reaction_rows, 0);
}

struct OfflineNotifications;

impl NotificationRepository for OfflineNotifications {
    fn append(&self, _event: &NewNotification) -> NotificationResult<Notification> {
        Err(NotificationError::Unavailable("notification backend offline"))
    }

    fn get(&self, _id: NotificationId) -> NotificationResult<Option<Notification>> {
        Ok(None)
    }

    fn list_for_target(
        &self,
        _target: &UserId,
        _query: &NotificationListQuery,
    ) -> NotificationResult<Vec<Notification>> {
        Ok(Vec::new())
    }

    fn delete(&self, id: NotificationId) -> NotificationResult<()> {
        Err(NotificationError::NotFound(id))
    }
}

#[test]
fn failed_notification_keeps_reaction_committed() {
    let conn = open_db_in_memory().unwrap();
    let engine = ReactionEngine::new(SqliteReactionStore::new(&conn), OfflineNotifications);
    let author = user("author");
    let grace = user("grace");
    let post = seed_post(&engine, &author);

    let outcome = engine
        .toggle_reaction(post.id, &grace, ReactionKind::Like)
        .unwrap();
    let failure = outcome
        .delivery_failure()
        .expect("delivery failure should be reported");
    assert_eq!(failure.target_user_id, author);
    assert!(failure.reason.contains("offline"));

    assert_eq!(outcome.like_count, 1);
    assert_eq!(
        engine.user_state(post.id, &grace).unwrap(),
        ReactionState::Liked
    );
}

#[test]
fn dislike_failure_path_is_never_reached_when_notification_backend_is_down() {
    let engine = ReactionEngine::new(MemoryReactionStore::new(), OfflineNotifications);
    let author = user("author");
    let post = seed_post(&engine, &author);

    let outcome = engine
        .toggle_reaction(post.id, &user("heidi"), ReactionKind::Dislike)
        .unwrap();
    assert_eq!(outcome.notification, NotificationDelivery::NotRequired);
    assert!(outcome.delivery_failure().is_none());
}
