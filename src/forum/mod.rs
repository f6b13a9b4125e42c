//! Threaded discussion forum storage.
//!
//! This module implements the forum data model: profiles, forums, threads,
//! nested posts, and per-profile thread votes, all persisted in RocksDB by
//! [`ForumStorage`].
//!
//! ## Hierarchy
//!
//! ```text
//! Forum
//!     └── Thread
//!             └── Post (root)
//!                     └── Post (reply)
//! ```
//!
//! Replies form an unbounded tree per thread. Each post stores its
//! materialized path (the ids from its root down to itself), which drives all
//! three post orderings:
//!
//! - `flat`: by creation time, ties broken by id
//! - `tree`: depth-first by path
//! - `parent_tree`: whole root groups, paginated by root post
//!
//! Creates are get-or-create: a duplicate key returns the existing record as
//! [`CreateOutcome::Conflict`] instead of failing.

pub mod constants;
mod creation;
mod details;
mod pagination;
mod path;
pub mod storage;
mod types;
pub mod validation;
mod votes;

pub use creation::CreateOutcome;
pub use path::PostPath;
pub use storage::ForumStorage;
pub use types::{
    now_micros, timestamp_key, truncate_to_micros, Forum, NewForum, NewPost, NewProfile,
    NewThread, NewVote, Post, PostDetails, PostQuery, PostSort, PostUpdate, Profile,
    ProfileUpdate, Related, Stats, Thread, ThreadQuery, ThreadRef, ThreadUpdate, UserQuery,
};
