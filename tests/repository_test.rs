//! Relationship consistency checks run directly against the repository
//! layer on a real database file.

use chrono::{Duration, Utc};
use tempfile::TempDir;

use agora::db::models::{AssociationInput, EventInput, PostInput};
use agora::db::{self, transaction};
use agora::ids::ObjectId;
use agora::repo::{associations, cascade, events, posts, users};
use agora::state::DbPool;

fn create_test_db() -> (TempDir, DbPool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
    db::run_migrations(&pool).unwrap();
    (temp_dir, pool)
}

fn association(pool: &DbPool, name: &str) -> ObjectId {
    let conn = pool.get().unwrap();
    associations::create(
        &conn,
        &AssociationInput {
            name: name.into(),
            ..Default::default()
        },
    )
    .unwrap()
    .id
}

fn event(pool: &DbPool, association: &ObjectId, name: &str) -> ObjectId {
    let start = Utc::now() + Duration::days(1);
    transaction(pool, |conn| {
        events::create(
            conn,
            &EventInput {
                name: name.into(),
                association: association.clone(),
                description: String::new(),
                status: String::new(),
                palette: vec![],
                selected_color: 0,
                date_start: start,
                date_end: start + Duration::hours(2),
                image: String::new(),
                bg_color: String::new(),
                fg_color: String::new(),
            },
        )
    })
    .unwrap()
    .id
}

fn post(pool: &DbPool, association: &ObjectId, title: &str) -> ObjectId {
    transaction(pool, |conn| {
        posts::create(
            conn,
            &PostInput {
                title: title.into(),
                association: association.clone(),
                description: String::new(),
                image: String::new(),
                image_size: serde_json::json!({ "width": 640, "height": 480 }),
            },
            Utc::now(),
        )
    })
    .unwrap()
    .id
}

/// Every event and post points at an association whose sets list it, and
/// those sets list nothing else.
fn assert_ownership_consistent(pool: &DbPool) {
    let conn = pool.get().unwrap();
    for asso in associations::list(&conn).unwrap() {
        for id in &asso.events {
            assert_eq!(events::get(&conn, id).unwrap().association, asso.id);
        }
        for id in &asso.posts {
            assert_eq!(posts::get(&conn, id).unwrap().association, asso.id);
        }
    }
    let mut stmt = conn.prepare("SELECT id, association_id FROM events").unwrap();
    let rows: Vec<(ObjectId, ObjectId)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    for (event, owner) in rows {
        assert!(associations::get(&conn, &owner).unwrap().events.contains(&event));
    }
}

/// Participant and like edges agree from both sides.
fn assert_edges_symmetric(pool: &DbPool) {
    let conn = pool.get().unwrap();
    for user in users::list(&conn).unwrap() {
        for id in &user.events {
            assert!(events::get(&conn, id).unwrap().participants.contains(&user.id));
        }
        for id in &user.posts_liked {
            assert!(posts::get(&conn, id).unwrap().likes.contains(&user.id));
        }
    }
    for e in events::list_future(&conn, Utc::now() - Duration::days(365)).unwrap() {
        for u in &e.participants {
            assert!(users::get(&conn, u).unwrap().events.contains(&e.id));
        }
    }
}

#[test]
fn add_event_to_association_is_idempotent() {
    let (_tmp, pool) = create_test_db();
    let asso = association(&pool, "BDE");
    let gala = event(&pool, &asso, "Gala");

    let conn = pool.get().unwrap();
    let once = associations::add_event(&conn, &asso, &gala).unwrap();
    let twice = associations::add_event(&conn, &asso, &gala).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.events, vec![gala]);
}

#[test]
fn interleaved_edges_stay_consistent() {
    let (_tmp, pool) = create_test_db();
    let chess = association(&pool, "Chess");
    let drama = association(&pool, "Drama");
    let evs = [
        event(&pool, &chess, "Open"),
        event(&pool, &chess, "Blitz"),
        event(&pool, &drama, "Premiere"),
    ];
    let pts = [post(&pool, &chess, "Results"), post(&pool, &drama, "Casting")];
    let people: Vec<ObjectId> = {
        let conn = pool.get().unwrap();
        ["ada", "grace", "linus"]
            .iter()
            .map(|name| users::create(&conn, name).unwrap().id)
            .collect()
    };

    for (i, user) in people.iter().enumerate() {
        for (j, ev) in evs.iter().enumerate() {
            if (i + j) % 2 == 0 {
                transaction(&pool, |conn| events::add_participant(conn, ev, user)).unwrap();
            }
        }
        for p in &pts {
            transaction(&pool, |conn| posts::like(conn, p, user)).unwrap();
        }
    }
    transaction(&pool, |conn| events::remove_participant(conn, &evs[0], &people[0])).unwrap();
    transaction(&pool, |conn| posts::dislike(conn, &pts[1], &people[2])).unwrap();

    assert_ownership_consistent(&pool);
    assert_edges_symmetric(&pool);

    cascade::delete_event(&pool, &evs[2]).unwrap();
    cascade::delete_user(&pool, &people[1]).unwrap();
    cascade::delete_association(&pool, &chess).unwrap();

    assert_ownership_consistent(&pool);
    assert_edges_symmetric(&pool);

    let conn = pool.get().unwrap();
    for user in users::list(&conn).unwrap() {
        assert!(user.events.iter().all(|e| !evs.contains(e)));
        assert!(!user.posts_liked.contains(&pts[0]));
    }
}

#[test]
fn failed_edge_write_leaves_both_sides_untouched() {
    let (_tmp, pool) = create_test_db();
    let asso = association(&pool, "BDE");
    let gala = event(&pool, &asso, "Gala");
    let ada = {
        let conn = pool.get().unwrap();
        users::create(&conn, "ada").unwrap().id
    };

    let result = transaction(&pool, |conn| {
        events::add_participant(conn, &gala, &ada)?;
        Err::<(), _>(agora::error::AppError::Internal("boom".into()))
    });
    assert!(result.is_err());

    let conn = pool.get().unwrap();
    assert!(events::get(&conn, &gala).unwrap().participants.is_empty());
    assert!(users::get(&conn, &ada).unwrap().events.is_empty());
}
