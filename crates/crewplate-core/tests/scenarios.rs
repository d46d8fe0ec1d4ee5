use std::path::PathBuf;
use std::sync::Mutex;

use crewplate_core::CoreError;
use crewplate_core::accounts::Accounts;
use crewplate_core::codes::{AccessCodeDirectory, CodeSource};
use crewplate_core::feed::FeedAggregator;
use crewplate_core::membership::MembershipGraph;
use crewplate_core::notifications::NotificationChannel;
use crewplate_core::posts::PostCatalog;
use crewplate_db::Database;
use crewplate_types::models::{ImageRef, KickOutcome, LeaveOutcome, NewPost};
use uuid::Uuid;

fn temp_db() -> Database {
    let path: PathBuf =
        std::env::temp_dir().join(format!("crewplate_scenario_{}.db", Uuid::new_v4()));
    Database::open(&path).unwrap()
}

fn register(db: &Database, name: &str) -> Uuid {
    Accounts::new(db)
        .register(&format!("{}@example.com", name), "pw", name)
        .unwrap()
        .id
}

struct FixedCode(Mutex<Option<String>>);

impl CodeSource for FixedCode {
    fn next_code(&self) -> String {
        self.0
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "ZZZZZZ".to_string())
    }
}

fn meal(image: &str) -> NewPost {
    NewPost {
        image_ref: Some(ImageRef::new(image)),
        cook_for: "Friends".into(),
        cost: "$10-15".into(),
        time_estimate: "30-45 min".into(),
        meal: "Dinner".into(),
        tags: ["Comfort Food"].into_iter().collect(),
    }
}

#[test]
fn dinner_club_lifecycle() {
    let db = temp_db();
    let u1 = register(&db, "u1");
    let u2 = register(&db, "u2");

    let source = FixedCode(Mutex::new(Some("K3F9QZ".into())));
    let graph = MembershipGraph::with_code_source(&db, &source);
    let crew = graph.create_crew("Dinner Club", None, u1).unwrap();
    assert_eq!(crew.access_code.as_str(), "K3F9QZ");

    graph.join("k3f9qz", u2).unwrap();
    assert_eq!(graph.member_count(crew.id).unwrap(), 2);

    assert_eq!(graph.kick(crew.id, u1, u2).unwrap(), KickOutcome::Removed);
    let members: Vec<Uuid> = graph
        .list_members(crew.id)
        .unwrap()
        .into_iter()
        .map(|m| m.member_id)
        .collect();
    assert_eq!(members, vec![u1]);

    assert_eq!(graph.leave(crew.id, u1).unwrap(), LeaveOutcome::CrewDeleted);
    assert!(matches!(
        AccessCodeDirectory::new(&db).resolve_code("K3F9QZ"),
        Err(CoreError::NotFound("crew"))
    ));
    assert!(matches!(graph.get_crew(crew.id), Err(CoreError::NotFound("crew"))));

    // The freed code can be handed out again
    let again = graph.create_crew("Dinner Club II", None, u2).unwrap();
    assert_eq!(again.access_code.as_str(), "K3F9QZ");
}

#[test]
fn poke_reaches_the_post_creator() {
    let db = temp_db();
    let u1 = register(&db, "u1");
    let u2 = register(&db, "u2");

    let graph = MembershipGraph::new(&db);
    let crew = graph.create_crew("Crew C", None, u1).unwrap();
    graph.join(crew.access_code.as_str(), u2).unwrap();

    let post = PostCatalog::new(&db)
        .create_post(u1, meal("https://img.example/p.jpg"))
        .unwrap();

    let feed = FeedAggregator::new(&db).get_feed(u2, None).unwrap();
    assert_eq!(feed.posts[0].post.id, post.id);

    let channel = NotificationChannel::new(&db);
    channel.poke(post.id, u2).unwrap();

    let notifications = channel.list_notifications(u1).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].poke.post_id, post.id);
    assert_eq!(notifications[0].poker.id, u2);
    assert_eq!(notifications[0].age_label, "just now");
}

#[test]
fn feed_never_leaks_across_disjoint_crews() {
    let db = temp_db();
    let alice = register(&db, "alice");
    let bob = register(&db, "bob");
    let carol = register(&db, "carol");
    let dave = register(&db, "dave");

    let graph = MembershipGraph::new(&db);
    let left = graph.create_crew("Left", None, alice).unwrap();
    graph.join(left.access_code.as_str(), bob).unwrap();
    let right = graph.create_crew("Right", None, carol).unwrap();
    graph.join(right.access_code.as_str(), dave).unwrap();

    let catalog = PostCatalog::new(&db);
    for (who, img) in [(alice, "a"), (bob, "b"), (carol, "c"), (dave, "d")] {
        catalog.create_post(who, meal(img)).unwrap();
    }

    let creators = |viewer: Uuid| -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = FeedAggregator::new(&db)
            .get_feed(viewer, None)
            .unwrap()
            .posts
            .into_iter()
            .map(|p| p.post.creator_id)
            .collect();
        ids.sort();
        ids
    };

    let mut left_side = vec![alice, bob];
    left_side.sort();
    assert_eq!(creators(alice), left_side);
    assert_eq!(creators(bob), left_side);

    let mut right_side = vec![carol, dave];
    right_side.sort();
    assert_eq!(creators(dave), right_side);

    // A loner sees nothing, not a global feed
    let loner = register(&db, "loner");
    assert!(creators(loner).is_empty());
}

#[test]
fn racing_leaves_delete_the_crew_exactly_once() {
    let db = temp_db();
    let u1 = register(&db, "u1");
    let u2 = register(&db, "u2");
    let graph = MembershipGraph::new(&db);
    let crew = graph.create_crew("Pair", None, u1).unwrap();
    graph.join(crew.access_code.as_str(), u2).unwrap();

    let outcomes: Vec<LeaveOutcome> = std::thread::scope(|s| {
        let a = s.spawn(|| MembershipGraph::new(&db).leave(crew.id, u1).unwrap());
        let b = s.spawn(|| MembershipGraph::new(&db).leave(crew.id, u2).unwrap());
        vec![a.join().unwrap(), b.join().unwrap()]
    });

    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == LeaveOutcome::CrewDeleted)
            .count(),
        1
    );
    assert!(matches!(graph.get_crew(crew.id), Err(CoreError::NotFound("crew"))));
}

#[test]
fn concurrent_duplicate_joins_collapse() {
    let db = temp_db();
    let u1 = register(&db, "u1");
    let u2 = register(&db, "u2");
    let crew = MembershipGraph::new(&db)
        .create_crew("Busy", None, u1)
        .unwrap();
    let code = crew.access_code.as_str().to_string();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| MembershipGraph::new(&db).join(&code, u2).unwrap());
        }
    });

    assert_eq!(MembershipGraph::new(&db).member_count(crew.id).unwrap(), 2);
}
