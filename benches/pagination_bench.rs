//! Benchmarks for post creation and paginated thread listings.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use forumdb::forum::{
    ForumStorage, NewForum, NewPost, NewThread, PostQuery, PostSort, Profile, ThreadRef,
};
use tempfile::TempDir;

/// Roots in the benchmark thread, each with a chain of replies.
const ROOTS: u64 = 200;
const REPLIES_PER_ROOT: u64 = 9;

fn setup_storage() -> (ForumStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = ForumStorage::new(temp_dir.path().join("bench_data")).unwrap();

    storage
        .create_profile(Profile {
            nickname: "bench".to_string(),
            about: String::new(),
            email: "bench@example.org".to_string(),
            fullname: String::new(),
        })
        .unwrap();
    storage
        .create_forum(NewForum {
            slug: "bench".to_string(),
            title: "Bench".to_string(),
            user: "bench".to_string(),
        })
        .unwrap();
    storage
        .create_thread(
            "bench",
            NewThread {
                author: "bench".to_string(),
                title: "t".to_string(),
                message: "m".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    (storage, temp_dir)
}

fn post(parent: Option<u64>) -> NewPost {
    NewPost {
        author: "bench".to_string(),
        message: "benchmark post body".to_string(),
        parent,
        created: None,
    }
}

/// Fills thread 1 with `ROOTS` root groups of `REPLIES_PER_ROOT` nested replies.
fn populate(storage: &ForumStorage) {
    for _ in 0..ROOTS {
        let root = storage
            .create_posts(&ThreadRef::Id(1), vec![post(None)])
            .unwrap()
            .remove(0);
        let mut parent = root.id;
        let mut batch = Vec::new();
        for offset in 1..=REPLIES_PER_ROOT {
            batch.push(post(Some(parent)));
            parent = root.id + offset;
        }
        storage.create_posts(&ThreadRef::Id(1), batch).unwrap();
    }
}

fn bench_create_posts(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_posts");

    for batch_size in [1usize, 10, 100] {
        let (storage, _temp_dir) = setup_storage();
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &size| {
                b.iter(|| {
                    storage
                        .create_posts(
                            black_box(&ThreadRef::Id(1)),
                            (0..size).map(|_| post(None)).collect(),
                        )
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

fn bench_thread_posts(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_posts");
    let (storage, _temp_dir) = setup_storage();
    populate(&storage);

    // A cursor in the middle of the thread
    let since = Some(ROOTS / 2 * (REPLIES_PER_ROOT + 1));

    for sort in [PostSort::Flat, PostSort::Tree, PostSort::ParentTree] {
        let limit = if sort == PostSort::ParentTree { 5 } else { 50 };
        for desc in [false, true] {
            let query = PostQuery {
                sort,
                limit: Some(limit),
                since,
                desc,
            };
            let name = format!("{}_{}", sort, if desc { "desc" } else { "asc" });
            group.bench_function(name, |b| {
                b.iter(|| {
                    storage
                        .thread_posts(black_box(&ThreadRef::Id(1)), black_box(&query))
                        .unwrap()
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_create_posts, bench_thread_posts);
criterion_main!(benches);
