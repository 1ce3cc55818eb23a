use hydrate_core::db::{open_db, open_db_in_memory};
use hydrate_core::{
    MemoryNotificationRepository, NotificationError, NotificationKind, NotificationListQuery,
    NotificationRepository, NotificationService, NotificationServiceError,
    SqliteNotificationRepository, UserId,
};
use std::collections::HashSet;
use std::thread;
use uuid::Uuid;

fn user(value: &str) -> UserId {
    UserId::parse(value).unwrap()
}

fn page(limit: u32) -> NotificationListQuery {
    NotificationListQuery {
        before: None,
        limit: Some(limit),
    }
}

#[test]
fn listing_is_newest_first_and_scoped_to_target() {
    let conn = open_db_in_memory().unwrap();
    let service = NotificationService::new(SqliteNotificationRepository::new(&conn));
    let ana = user("ana");
    let bia = user("bia");

    let first = service.remind(&ana, "Beba água").unwrap();
    let second = service.remind(&ana, "Hora de reabastecer").unwrap();
    service.remind(&bia, "Não esqueça a garrafa").unwrap();

    let listed = service
        .list_notifications(&ana, &NotificationListQuery::default())
        .unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(listed.iter().all(|item| item.target_user_id == ana));
    assert!(listed.iter().all(|item| item.kind == NotificationKind::Reminder));
    assert!(listed[0].cursor() > listed[1].cursor());
}

#[test]
fn cursor_pages_stay_stable_when_new_records_arrive() {
    let conn = open_db_in_memory().unwrap();
    let service = NotificationService::new(SqliteNotificationRepository::new(&conn));
    let ana = user("ana");
    for index in 0..5 {
        service.remind(&ana, &format!("lembrete {index}")).unwrap();
    }

    let head = service.list_notifications(&ana, &page(2)).unwrap();
    assert_eq!(head.len(), 2);
    assert_eq!(head[0].message, "lembrete 4");

    service.remind(&ana, "chegou agora").unwrap();

    let rest = service
        .list_notifications(
            &ana,
            &NotificationListQuery {
                before: Some(head[1].cursor()),
                limit: Some(10),
            },
        )
        .unwrap();
    let messages: Vec<&str> = rest.iter().map(|item| item.message.as_str()).collect();
    assert_eq!(messages, vec!["lembrete 2", "lembrete 1", "lembrete 0"]);
}

#[test]
fn only_the_target_user_can_delete() {
    let conn = open_db_in_memory().unwrap();
    let service = NotificationService::new(SqliteNotificationRepository::new(&conn));
    let ana = user("ana");
    let stored = service.remind(&ana, "Beba água").unwrap();

    let denied = service
        .delete_notification(stored.id, &user("intruder"))
        .unwrap_err();
    assert!(matches!(
        denied,
        NotificationServiceError::PermissionDenied(id) if id == stored.id
    ));

    service.delete_notification(stored.id, &ana).unwrap();
    assert!(service
        .list_notifications(&ana, &NotificationListQuery::default())
        .unwrap()
        .is_empty());

    let missing = service.delete_notification(stored.id, &ana).unwrap_err();
    assert!(matches!(
        missing,
        NotificationServiceError::NotFound(id) if id == stored.id
    ));
}

#[test]
fn unknown_id_is_not_found_on_both_backends() {
    let conn = open_db_in_memory().unwrap();
    let ghost = Uuid::new_v4();

    let sqlite = NotificationService::new(SqliteNotificationRepository::new(&conn));
    assert!(matches!(
        sqlite.delete_notification(ghost, &user("ana")),
        Err(NotificationServiceError::NotFound(id)) if id == ghost
    ));

    let memory = NotificationService::new(MemoryNotificationRepository::new());
    assert!(matches!(
        memory.delete_notification(ghost, &user("ana")),
        Err(NotificationServiceError::NotFound(id)) if id == ghost
    ));
}

#[test]
fn blank_reminder_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = NotificationService::new(SqliteNotificationRepository::new(&conn));

    let err = service.remind(&user("ana"), "   ").unwrap_err();
    assert!(matches!(
        err,
        NotificationServiceError::Repo(NotificationError::InvalidMessage(_))
    ));
}

#[test]
fn concurrent_appends_to_one_target_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hydrate.sqlite3");
    let conn = open_db(&db_path).unwrap();
    let ana = user("ana");

    thread::scope(|scope| {
        for worker in 0..4 {
            let db_path = &db_path;
            let ana = &ana;
            scope.spawn(move || {
                let conn = open_db(db_path).unwrap();
                let service = NotificationService::new(SqliteNotificationRepository::new(&conn));
                for index in 0..10 {
                    service
                        .remind(ana, &format!("worker {worker} lembrete {index}"))
                        .unwrap();
                }
            });
        }
    });

    let listed = SqliteNotificationRepository::new(&conn)
        .list_for_target(&ana, &page(100))
        .unwrap();
    assert_eq!(listed.len(), 40);
    let ids: HashSet<Uuid> = listed.iter().map(|item| item.id).collect();
    assert_eq!(ids.len(), 40);
    assert!(listed
        .windows(2)
        .all(|pair| pair[0].cursor() > pair[1].cursor()));
}
