//! Randomized property tests for post trees and pagination.
//!
//! Each test builds random reply trees and checks that the listing invariants
//! hold for every generated shape.

use forumdb::forum::{
    ForumStorage, NewForum, NewPost, NewThread, Post, PostQuery, PostSort, Profile, ThreadRef,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use tempfile::TempDir;

fn create_test_storage() -> (ForumStorage, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage =
        ForumStorage::new(temp_dir.path().join("forum_data")).expect("Failed to create storage");
    (storage, temp_dir)
}

/// Builds one thread with `batches` random reply batches and returns every post.
fn random_thread(storage: &ForumStorage, rng: &mut StdRng, batches: usize) -> Vec<Post> {
    storage
        .create_profile(Profile {
            nickname: "poster".to_string(),
            about: String::new(),
            email: "poster@example.org".to_string(),
            fullname: String::new(),
        })
        .unwrap();
    storage
        .create_forum(NewForum {
            slug: "prop".to_string(),
            title: "Properties".to_string(),
            user: "poster".to_string(),
        })
        .unwrap();
    storage
        .create_thread(
            "prop",
            NewThread {
                author: "poster".to_string(),
                title: "t".to_string(),
                message: "m".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

    let mut posts: Vec<Post> = Vec::new();
    for _ in 0..batches {
        let size = rng.gen_range(1..8);
        let batch: Vec<NewPost> = (0..size)
            .map(|_| {
                let parent = if posts.is_empty() || rng.gen_bool(0.25) {
                    None
                } else {
                    Some(posts[rng.gen_range(0..posts.len())].id)
                };
                NewPost {
                    author: "poster".to_string(),
                    message: "random".to_string(),
                    parent,
                    created: None,
                }
            })
            .collect();
        posts.extend(storage.create_posts(&ThreadRef::Id(1), batch).unwrap());
    }
    posts
}

fn list(storage: &ForumStorage, query: &PostQuery) -> Vec<Post> {
    storage.thread_posts(&ThreadRef::Id(1), query).unwrap()
}

/// Pages through a listing with `since = last id` until an empty page.
fn paginate(storage: &ForumStorage, sort: PostSort, limit: usize, desc: bool) -> Vec<Vec<Post>> {
    let mut pages = Vec::new();
    let mut since = None;
    loop {
        let page = list(
            storage,
            &PostQuery {
                sort,
                limit: Some(limit),
                since,
                desc,
            },
        );
        if page.is_empty() {
            break;
        }
        since = page.last().map(|post| post.id);
        pages.push(page);
    }
    pages
}

/// Property: path(P) == path(parent(P)) + [id(P)], roots have path [id]
#[test]
fn property_path_extends_parent_path() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..5 {
        let (storage, _temp_dir) = create_test_storage();
        let posts = random_thread(&storage, &mut rng, 10);
        let by_id: HashMap<u64, &Post> = posts.iter().map(|post| (post.id, post)).collect();

        for post in &posts {
            match post.parent {
                None => assert_eq!(post.path, vec![post.id]),
                Some(parent) => {
                    let mut expected = by_id[&parent].path.clone();
                    expected.push(post.id);
                    assert_eq!(post.path, expected, "path of post {}", post.id);
                }
            }
        }
    }
}

/// Property: paginated tree listings partition the full listing exactly
#[test]
fn property_tree_pagination_partitions() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..5 {
        let (storage, _temp_dir) = create_test_storage();
        let posts = random_thread(&storage, &mut rng, 8);

        for desc in [false, true] {
            let full = list(
                &storage,
                &PostQuery {
                    sort: PostSort::Tree,
                    desc,
                    ..Default::default()
                },
            );
            assert_eq!(full.len(), posts.len());

            let limit = rng.gen_range(1..6);
            let paged: Vec<u64> = paginate(&storage, PostSort::Tree, limit, desc)
                .into_iter()
                .flatten()
                .map(|post| post.id)
                .collect();
            let expected: Vec<u64> = full.iter().map(|post| post.id).collect();
            assert_eq!(paged, expected, "limit {} desc {}", limit, desc);

            // Tree order is path order
            let paths: Vec<&Vec<u64>> = full.iter().map(|post| &post.path).collect();
            let mut sorted = paths.clone();
            sorted.sort();
            if desc {
                sorted.reverse();
            }
            assert_eq!(paths, sorted);
        }
    }
}

/// Property: flat pagination partitions the (created, id) order
#[test]
fn property_flat_pagination_partitions() {
    let mut rng = StdRng::seed_from_u64(13);
    let (storage, _temp_dir) = create_test_storage();
    random_thread(&storage, &mut rng, 12);

    for desc in [false, true] {
        let full = list(
            &storage,
            &PostQuery {
                desc,
                ..Default::default()
            },
        );
        let keys: Vec<_> = full.iter().map(|post| (post.created, post.id)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        if desc {
            sorted.reverse();
        }
        assert_eq!(keys, sorted);

        let paged: Vec<u64> = paginate(&storage, PostSort::Flat, 4, desc)
            .into_iter()
            .flatten()
            .map(|post| post.id)
            .collect();
        assert_eq!(paged, full.iter().map(|post| post.id).collect::<Vec<_>>());
    }
}

/// Property: parent_tree pages are whole root groups covering every root once
#[test]
fn property_parent_tree_returns_whole_groups() {
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..5 {
        let (storage, _temp_dir) = create_test_storage();
        let posts = random_thread(&storage, &mut rng, 10);

        let mut group_sizes: HashMap<u64, usize> = HashMap::new();
        for post in &posts {
            *group_sizes.entry(post.path[0]).or_default() += 1;
        }
        let roots: Vec<u64> = posts
            .iter()
            .filter(|post| post.parent.is_none())
            .map(|post| post.id)
            .collect();

        for desc in [false, true] {
            let limit = rng.gen_range(1..4);
            let pages = paginate(&storage, PostSort::ParentTree, limit, desc);

            let mut seen_roots = Vec::new();
            for page in &pages {
                let mut page_roots = Vec::new();
                for post in page {
                    let root = post.path[0];
                    if page_roots.last() != Some(&root) {
                        page_roots.push(root);
                    }
                }
                assert!(page_roots.len() <= limit);

                for root in &page_roots {
                    let in_page = page.iter().filter(|post| post.path[0] == *root).count();
                    assert_eq!(in_page, group_sizes[root], "group {} is incomplete", root);
                }

                // Within a group, posts follow path order
                for pair in page.windows(2) {
                    if pair[0].path[0] == pair[1].path[0] {
                        assert!(pair[0].path < pair[1].path);
                    }
                }
                seen_roots.extend(page_roots);
            }

            let distinct: HashSet<u64> = seen_roots.iter().copied().collect();
            assert_eq!(distinct.len(), seen_roots.len(), "a root repeated across pages");

            let mut expected = roots.clone();
            expected.sort_unstable();
            if desc {
                expected.reverse();
            }
            assert_eq!(seen_roots, expected);
        }
    }
}
