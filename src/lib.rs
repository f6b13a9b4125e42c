//! # forumdb
//!
//! Embedded storage engine for a threaded discussion forum.
//!
//! The crate persists users, forums, threads, nested posts, and thread votes in
//! RocksDB and serves the ordered, cursor-paginated listings a forum API needs.
//!
//! ## Features
//!
//! - **Threaded posts**: unbounded reply trees stored with materialized paths
//! - **Three post orders**: flat, tree, and root-grouped parent tree, each with
//!   `since`/`limit`/`desc` cursors
//! - **Get-or-create**: idempotent creation that reports the existing record
//! - **Vote tallies**: per-user vote upserts with an incrementally kept total
//!
//! ## Example
//!
//! ```rust,no_run
//! use forumdb::forum::{ForumStorage, NewForum, NewPost, NewThread, Profile, PostQuery, PostSort};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = ForumStorage::new("forum_data")?;
//!
//! storage.create_profile(Profile {
//!     nickname: "alice".into(),
//!     about: String::new(),
//!     email: "alice@example.org".into(),
//!     fullname: "Alice".into(),
//! })?;
//! storage.create_forum(NewForum {
//!     slug: "rust".into(),
//!     title: "Rust".into(),
//!     user: "alice".into(),
//! })?;
//! let thread = storage
//!     .create_thread("rust", NewThread {
//!         author: "alice".into(),
//!         title: "Hello".into(),
//!         message: "First thread".into(),
//!         ..Default::default()
//!     })?
//!     .into_inner();
//!
//! storage.create_posts(&thread.id.into(), vec![NewPost {
//!     author: "alice".into(),
//!     message: "First reply".into(),
//!     ..Default::default()
//! }])?;
//!
//! let query = PostQuery { sort: PostSort::Tree, limit: Some(20), ..Default::default() };
//! for post in storage.thread_posts(&thread.id.into(), &query)? {
//!     println!("{} {}", post.id, post.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod forum;
pub mod storage;

pub use error::{ForumError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
