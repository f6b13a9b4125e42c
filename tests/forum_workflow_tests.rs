//! End-to-end tests for the forum storage engine.
//!
//! These tests drive the public API the way a forum service would: creating
//! users, forums, threads and reply batches, voting, listing, and resetting,
//! including concurrent callers sharing one store.

use forumdb::forum::{
    CreateOutcome, ForumStorage, NewForum, NewPost, NewThread, NewVote, Post, PostQuery, PostSort,
    PostUpdate, Profile, ProfileUpdate, Related, Stats, ThreadQuery, ThreadRef, UserQuery,
};
use forumdb::ForumError;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

/// Helper to create a store in a fresh temporary directory.
fn create_test_storage() -> (ForumStorage, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage =
        ForumStorage::new(temp_dir.path().join("forum_data")).expect("Failed to create storage");
    (storage, temp_dir)
}

fn profile(nickname: &str) -> Profile {
    Profile {
        nickname: nickname.to_string(),
        about: format!("I am {}", nickname),
        email: format!("{}@example.org", nickname),
        fullname: format!("{} Example", nickname),
    }
}

fn new_forum(slug: &str, owner: &str) -> NewForum {
    NewForum {
        slug: slug.to_string(),
        title: format!("{} forum", slug),
        user: owner.to_string(),
    }
}

fn new_thread(author: &str, slug: Option<&str>) -> NewThread {
    NewThread {
        author: author.to_string(),
        title: "A thread".to_string(),
        message: "Opening message".to_string(),
        slug: slug.map(str::to_string),
        created: None,
    }
}

fn reply(author: &str, parent: Option<u64>) -> NewPost {
    NewPost {
        author: author.to_string(),
        message: format!("reply by {}", author),
        parent,
        created: None,
    }
}

fn ids(posts: &[Post]) -> Vec<u64> {
    posts.iter().map(|post| post.id).collect()
}

// =============================================================================
// Workflow Tests
// =============================================================================

/// Complete workflow: users -> forum -> thread -> replies -> votes -> listings
#[test]
fn test_complete_forum_workflow() {
    let (storage, _temp_dir) = create_test_storage();

    for nickname in ["alice", "bob", "carol"] {
        assert!(storage.create_profile(profile(nickname)).unwrap().is_created());
    }

    let forum = storage
        .create_forum(new_forum("rust", "Alice"))
        .unwrap()
        .created()
        .expect("forum should be new");
    assert_eq!(forum.user, "alice");

    let thread = storage
        .create_thread("RUST", new_thread("bob", Some("ownership")))
        .unwrap()
        .created()
        .expect("thread should be new");
    assert_eq!(thread.forum, "rust");

    let by_slug = ThreadRef::parse("ownership");
    let roots = storage
        .create_posts(&by_slug, vec![reply("alice", None), reply("carol", None)])
        .unwrap();
    let replies = storage
        .create_posts(
            &ThreadRef::from(thread.id),
            vec![reply("bob", Some(roots[0].id)), reply("carol", Some(roots[1].id))],
        )
        .unwrap();
    assert_eq!(replies[0].parent, Some(roots[0].id));

    let tree = storage
        .thread_posts(
            &by_slug,
            &PostQuery {
                sort: PostSort::Tree,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        ids(&tree),
        vec![roots[0].id, replies[0].id, roots[1].id, replies[1].id]
    );

    storage
        .cast_vote(&by_slug, &NewVote { nickname: "alice".to_string(), voice: 1 })
        .unwrap();
    let voted = storage
        .cast_vote(&by_slug, &NewVote { nickname: "carol".to_string(), voice: 1 })
        .unwrap();
    assert_eq!(voted.votes, 2);

    let users = storage.forum_users("rust", &UserQuery::default()).unwrap();
    let nicknames: Vec<_> = users.iter().map(|p| p.nickname.as_str()).collect();
    assert_eq!(nicknames, vec!["alice", "bob", "carol"]);

    let threads = storage.forum_threads("rust", &ThreadQuery::default()).unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].votes, 2);

    let forum = storage.get_forum("rust").unwrap().unwrap();
    assert_eq!((forum.threads, forum.posts), (1, 4));
    assert_eq!(
        storage.stats().unwrap(),
        Stats {
            forum: 1,
            post: 4,
            thread: 1,
            user: 3,
        }
    );

    let details = storage
        .post_details(
            replies[0].id,
            Related {
                user: true,
                forum: true,
                thread: true,
            },
        )
        .unwrap();
    assert_eq!(details.author.unwrap().nickname, "bob");
    assert_eq!(details.thread.unwrap().votes, 2);

    storage.reset().unwrap();
    assert_eq!(storage.stats().unwrap(), Stats::default());
}

/// Non-ASCII and spaced identities are stored, folded, and listed like any other
#[test]
fn test_unicode_identities_round_trip() {
    let (storage, _temp_dir) = create_test_storage();

    let jorg = storage.create_profile(profile("Jörg")).unwrap();
    assert!(jorg.is_created());
    assert!(storage
        .create_profile(Profile {
            email: "ivan.petrov@example.org".to_string(),
            ..profile("ivan petrov")
        })
        .unwrap()
        .is_created());

    let loaded = storage.get_profile("jÖrg").unwrap().unwrap();
    assert_eq!(loaded.nickname, "Jörg");
    assert!(storage.create_profile(profile("JÖRG")).unwrap().is_conflict());

    let forum = storage
        .create_forum(new_forum("форум", "JÖRG"))
        .unwrap()
        .created()
        .unwrap();
    assert_eq!(forum.user, "Jörg");
    assert_eq!(storage.get_forum("ФОРУМ").unwrap().unwrap().slug, "форум");

    storage
        .create_thread("форум", new_thread("Ivan Petrov", Some("привет")))
        .unwrap();
    storage
        .create_posts(
            &ThreadRef::Slug("ПРИВЕТ".to_string()),
            vec![reply("jörg", None)],
        )
        .unwrap();

    let users = storage
        .forum_users("ФОРУМ", &UserQuery::default())
        .unwrap();
    let nicknames: Vec<&str> = users.iter().map(|user| user.nickname.as_str()).collect();
    assert_eq!(nicknames, vec!["Jörg", "ivan petrov"]);
}

#[test]
fn test_duplicate_forum_returns_existing_with_counters() {
    let (storage, _temp_dir) = create_test_storage();
    storage.create_profile(profile("alice")).unwrap();
    storage.create_forum(new_forum("news", "alice")).unwrap();
    storage
        .create_thread("news", new_thread("alice", None))
        .unwrap();

    match storage.create_forum(new_forum("NEWS", "alice")).unwrap() {
        CreateOutcome::Conflict(existing) => {
            assert_eq!(existing.slug, "news");
            assert_eq!(existing.threads, 1);
        }
        CreateOutcome::Created(_) => panic!("duplicate forum was created"),
    }
    assert_eq!(storage.stats().unwrap().forum, 1);
}

#[test]
fn test_failed_batch_leaves_no_trace() {
    let (storage, _temp_dir) = create_test_storage();
    storage.create_profile(profile("alice")).unwrap();
    storage.create_forum(new_forum("f", "alice")).unwrap();
    storage.create_thread("f", new_thread("alice", None)).unwrap();
    let thread = ThreadRef::Id(1);

    let root = storage
        .create_posts(&thread, vec![reply("alice", None)])
        .unwrap();

    let err = storage
        .create_posts(
            &thread,
            vec![reply("alice", Some(root[0].id)), reply("alice", Some(999_999))],
        )
        .unwrap_err();
    assert!(matches!(err, ForumError::Conflict { .. }));

    let err = storage
        .create_posts(
            &thread,
            vec![reply("alice", Some(root[0].id)), reply("nobody", None)],
        )
        .unwrap_err();
    assert!(matches!(err, ForumError::NotFound { .. }));

    let flat = storage.thread_posts(&thread, &PostQuery::default()).unwrap();
    assert_eq!(ids(&flat), vec![root[0].id]);
    assert_eq!(storage.get_forum("f").unwrap().unwrap().posts, 1);
    assert_eq!(storage.stats().unwrap().post, 1);
}

#[test]
fn test_flat_desc_since_is_strictly_before() {
    let (storage, _temp_dir) = create_test_storage();
    storage.create_profile(profile("alice")).unwrap();
    storage.create_forum(new_forum("f", "alice")).unwrap();
    storage.create_thread("f", new_thread("alice", None)).unwrap();
    let thread = ThreadRef::Id(1);

    // Two batches share one timestamp each, so ordering falls back to ids
    let mut all = storage
        .create_posts(&thread, (0..3).map(|_| reply("alice", None)).collect())
        .unwrap();
    all.extend(
        storage
            .create_posts(&thread, (0..3).map(|_| reply("alice", None)).collect())
            .unwrap(),
    );
    let pivot = &all[3];

    let before = storage
        .thread_posts(
            &thread,
            &PostQuery {
                since: Some(pivot.id),
                desc: true,
                ..Default::default()
            },
        )
        .unwrap();

    assert!(before
        .iter()
        .all(|post| (post.created, post.id) < (pivot.created, pivot.id)));
    let mut expected: Vec<u64> = all[..3].iter().map(|p| p.id).collect();
    expected.reverse();
    assert_eq!(ids(&before), expected);
}

#[test]
fn test_profile_maintenance() {
    let (storage, _temp_dir) = create_test_storage();
    storage.create_profile(profile("alice")).unwrap();
    storage.create_profile(profile("bob")).unwrap();

    let err = storage
        .update_profile(
            "alice",
            ProfileUpdate {
                email: Some("BOB@example.org".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(err.is_conflict());

    let updated = storage
        .update_profile(
            "alice",
            ProfileUpdate {
                about: Some("updated".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.about, "updated");
    assert_eq!(storage.get_profile("ALICE").unwrap().unwrap(), updated);

    // A freed email can be taken by a new profile
    storage
        .update_profile(
            "bob",
            ProfileUpdate {
                email: Some("bob2@example.org".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    let carol = Profile {
        email: "bob@example.org".to_string(),
        ..profile("carol")
    };
    assert!(storage.create_profile(carol).unwrap().is_created());
}

#[test]
fn test_post_edit_flag() {
    let (storage, _temp_dir) = create_test_storage();
    storage.create_profile(profile("alice")).unwrap();
    storage.create_forum(new_forum("f", "alice")).unwrap();
    storage.create_thread("f", new_thread("alice", None)).unwrap();
    let post = storage
        .create_posts(&ThreadRef::Id(1), vec![reply("alice", None)])
        .unwrap()
        .remove(0);

    let same = storage
        .update_post(
            post.id,
            PostUpdate {
                message: Some(post.message.clone()),
            },
        )
        .unwrap();
    assert!(!same.is_edited);

    let edited = storage
        .update_post(
            post.id,
            PostUpdate {
                message: Some("edited".to_string()),
            },
        )
        .unwrap();
    assert!(edited.is_edited);
    assert_eq!(storage.get_post(post.id).unwrap().unwrap(), edited);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_duplicate_forum_creates() {
    let (storage, _temp_dir) = create_test_storage();
    storage.create_profile(profile("alice")).unwrap();
    let storage = Arc::new(storage);

    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let storage = Arc::clone(&storage);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                storage.create_forum(new_forum("race", "alice")).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let created = outcomes.iter().filter(|o| o.is_created()).count();
    assert_eq!(created, 1);

    let winner = outcomes
        .iter()
        .find(|o| o.is_created())
        .cloned()
        .unwrap()
        .into_inner();
    for outcome in outcomes {
        assert_eq!(outcome.into_inner(), winner);
    }
    assert_eq!(storage.stats().unwrap().forum, 1);
}

#[test]
fn test_concurrent_votes_keep_consistent_tally() {
    let (storage, _temp_dir) = create_test_storage();
    let voters: Vec<String> = (0..6).map(|i| format!("voter{}", i)).collect();
    for nickname in &voters {
        storage.create_profile(profile(nickname)).unwrap();
    }
    storage.create_forum(new_forum("f", "voter0")).unwrap();
    storage.create_thread("f", new_thread("voter0", Some("poll"))).unwrap();
    let storage = Arc::new(storage);

    let handles: Vec<_> = voters
        .iter()
        .enumerate()
        .map(|(i, nickname)| {
            let storage = Arc::clone(&storage);
            let nickname = nickname.clone();
            thread::spawn(move || {
                let thread = ThreadRef::Slug("poll".to_string());
                // Every voter flips a few times and ends on +1 (even) or -1 (odd)
                for round in 0..5 {
                    let voice = if (round + i) % 2 == 0 { 1 } else { -1 };
                    storage
                        .cast_vote(
                            &thread,
                            &NewVote {
                                nickname: nickname.clone(),
                                voice,
                            },
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // round 4: voice is +1 when i is even, -1 when odd -> three of each
    let thread = storage
        .get_thread(&ThreadRef::Slug("poll".to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(thread.votes, 0);
}

#[test]
fn test_concurrent_reply_batches_get_unique_ids() {
    let (storage, _temp_dir) = create_test_storage();
    storage.create_profile(profile("alice")).unwrap();
    storage.create_forum(new_forum("f", "alice")).unwrap();
    storage.create_thread("f", new_thread("alice", None)).unwrap();
    let root = storage
        .create_posts(&ThreadRef::Id(1), vec![reply("alice", None)])
        .unwrap()
        .remove(0);
    let storage = Arc::new(storage);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                storage
                    .create_posts(
                        &ThreadRef::Id(1),
                        (0..10).map(|_| reply("alice", Some(root.id))).collect(),
                    )
                    .unwrap()
            })
        })
        .collect();

    let mut created: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .map(|post| post.id)
        .collect();
    created.sort_unstable();
    created.dedup();
    assert_eq!(created.len(), 40);

    let forum = storage.get_forum("f").unwrap().unwrap();
    assert_eq!(forum.posts, 41);

    let tree = storage
        .thread_posts(
            &ThreadRef::Id(1),
            &PostQuery {
                sort: PostSort::Tree,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(tree.len(), 41);
    assert!(tree[1..].iter().all(|post| post.parent == Some(root.id)));
}
