//! Forum records and request/query types.
//!
//! The record types serialize with the JSON field names the forum API uses
//! (`user`, `author`, `isEdited`, ...), so callers can emit them directly.

use crate::error::{ForumError, Result};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub nickname: String,
    #[serde(default)]
    pub about: String,
    pub email: String,
    #[serde(default)]
    pub fullname: String,
}

/// Request to create a profile; every field is caller supplied.
pub type NewProfile = Profile;

/// A forum with its denormalized thread and post counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    pub slug: String,
    pub title: String,
    /// Nickname of the owning profile.
    pub user: String,
    pub threads: u64,
    pub posts: u64,
}

/// Request to create a forum.
#[derive(Debug, Clone, Deserialize)]
pub struct NewForum {
    pub slug: String,
    pub title: String,
    /// Nickname of the owner.
    pub user: String,
}

/// A discussion thread inside a forum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: u64,
    pub author: String,
    pub created: DateTime<Utc>,
    pub forum: String,
    pub message: String,
    pub slug: Option<String>,
    pub title: String,
    /// Running tally of all votes cast on this thread.
    pub votes: i64,
}

/// Request to create a thread.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewThread {
    pub author: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// A post (reply) inside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub author: String,
    pub created: DateTime<Utc>,
    pub forum: String,
    #[serde(rename = "isEdited")]
    pub is_edited: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
    pub thread: u64,
    /// Ids from the root post down to this post, inclusive.
    #[serde(skip_serializing, default)]
    pub path: Vec<u64>,
}

/// One entry of a post batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    pub author: String,
    pub message: String,
    /// Parent post id; absent or `0` makes a root post.
    #[serde(default)]
    pub parent: Option<u64>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// A vote request. `voice` must be `-1` or `1`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVote {
    pub nickname: String,
    pub voice: i32,
}

/// Partial profile update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub about: Option<String>,
    pub email: Option<String>,
    pub fullname: Option<String>,
}

/// Partial thread update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadUpdate {
    pub title: Option<String>,
    pub message: Option<String>,
}

/// Post message update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    pub message: Option<String>,
}

/// A post together with the related records a caller asked for.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetails {
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forum: Option<Forum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
}

/// Which related records to resolve alongside a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Related {
    pub user: bool,
    pub forum: bool,
    pub thread: bool,
}

impl Related {
    /// Parses a comma separated list such as `user,thread`. Unknown names are ignored.
    pub fn parse(list: &str) -> Self {
        let mut related = Self::default();
        for name in list.split(',').map(str::trim) {
            match name {
                "user" => related.user = true,
                "forum" => related.forum = true,
                "thread" => related.thread = true,
                _ => {}
            }
        }
        related
    }
}

/// Row counts across the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub forum: u64,
    pub post: u64,
    pub thread: u64,
    pub user: u64,
}

/// Reference to a thread by numeric id or by slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadRef {
    Id(i64),
    Slug(String),
}

impl ThreadRef {
    /// Integers are ids, everything else is a slug.
    pub fn parse(slug_or_id: &str) -> Self {
        match slug_or_id.parse::<i64>() {
            Ok(id) => ThreadRef::Id(id),
            Err(_) => ThreadRef::Slug(slug_or_id.to_string()),
        }
    }
}

impl From<u64> for ThreadRef {
    fn from(id: u64) -> Self {
        ThreadRef::Id(id as i64)
    }
}

impl From<&str> for ThreadRef {
    fn from(slug_or_id: &str) -> Self {
        ThreadRef::parse(slug_or_id)
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadRef::Id(id) => write!(f, "{}", id),
            ThreadRef::Slug(slug) => write!(f, "{}", slug),
        }
    }
}

/// Post listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    /// By `(created, id)`.
    #[default]
    Flat,
    /// Depth-first by materialized path.
    Tree,
    /// Whole root groups, paginated by root post.
    ParentTree,
}

impl FromStr for PostSort {
    type Err = ForumError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flat" => Ok(PostSort::Flat),
            "tree" => Ok(PostSort::Tree),
            "parent_tree" => Ok(PostSort::ParentTree),
            other => Err(ForumError::validation(
                "sort",
                format!("unknown sort mode '{}'", other),
            )),
        }
    }
}

impl fmt::Display for PostSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostSort::Flat => write!(f, "flat"),
            PostSort::Tree => write!(f, "tree"),
            PostSort::ParentTree => write!(f, "parent_tree"),
        }
    }
}

/// Parameters for listing a thread's posts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub sort: PostSort,
    /// Maximum posts (flat, tree) or root groups (parent_tree). `None` is unbounded.
    pub limit: Option<usize>,
    /// Exclusive cursor: a post id.
    pub since: Option<u64>,
    pub desc: bool,
}

/// Parameters for listing a forum's threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadQuery {
    pub limit: Option<usize>,
    /// Inclusive creation-time bound.
    pub since: Option<DateTime<Utc>>,
    pub desc: bool,
}

/// Parameters for listing a forum's users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub limit: Option<usize>,
    /// Exclusive nickname cursor, compared byte-wise.
    pub since: Option<String>,
    pub desc: bool,
}

/// Truncates a timestamp to microsecond precision, the resolution of stored sort keys.
pub fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.nanosecond();
    ts.with_nanosecond(nanos - nanos % 1_000).unwrap_or(ts)
}

/// Current time at stored precision.
pub fn now_micros() -> DateTime<Utc> {
    truncate_to_micros(Utc::now())
}

/// Encodes a timestamp so that byte order equals chronological order.
pub fn timestamp_key(ts: &DateTime<Utc>) -> [u8; 8] {
    ((ts.timestamp_micros() as u64) ^ (1 << 63)).to_be_bytes()
}
