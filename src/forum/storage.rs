//! Forum data persistence using RocksDB.
//!
//! This module owns every persisted forum record and the sorted indexes the
//! listing operations read.
//!
//! ## Storage Layout
//!
//! Identity keys (nicknames, emails, slugs) are stored lowercased so that
//! lookups and uniqueness are case-insensitive; the records keep the spelling
//! they were created with.
//!
//! - `profiles`: `lower(nickname)` -> Profile
//! - `profile_emails`: `lower(email)` -> `lower(nickname)`
//! - `forums`: `lower(slug)` -> Forum (with counters)
//! - `threads`: `id` -> Thread (with vote tally)
//! - `thread_slugs`: `lower(slug)` -> `id`
//! - `posts`: `id` -> PostRecord (with materialized path)
//! - `votes`: `thread_id:lower(nickname)` -> voice
//! - `meta`: id sequences and global counters
//!
//! Index column families (values are empty unless noted):
//!
//! - `idx_forum_threads`: `lower(forum) 0x00 created id`
//! - `idx_forum_users`: `lower(forum) 0x00 nickname`
//! - `idx_posts_flat`: `thread created id`
//! - `idx_posts_tree`: `thread path...` -> post id
//! - `idx_post_roots`: `thread root_id`
//!
//! All integers are big-endian and timestamps use [`timestamp_key`], so byte
//! order is the listing order.
//!
//! ## Concurrency
//!
//! Mutations hold the write side of the store's gate and commit a single write
//! batch; reads hold the read side. A check followed by an insert can therefore
//! never interleave with another writer.

use crate::error::{Entity, ForumError, Result};
use crate::forum::constants::{DB_DIR, DEFAULT_DATA_DIR};
use crate::forum::path::PostPath;
use crate::forum::types::{
    now_micros, timestamp_key, truncate_to_micros, Forum, NewForum, NewThread, Post, Profile,
    Stats, Thread, ThreadRef,
};
use crate::storage::{composite_key, prefixed_key, RocksDbConfig, RocksDbHandle, StorageBatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Column family names.
pub(crate) const CF_PROFILES: &str = "profiles";
pub(crate) const CF_PROFILE_EMAILS: &str = "profile_emails";
pub(crate) const CF_FORUMS: &str = "forums";
pub(crate) const CF_THREADS: &str = "threads";
pub(crate) const CF_THREAD_SLUGS: &str = "thread_slugs";
pub(crate) const CF_POSTS: &str = "posts";
pub(crate) const CF_VOTES: &str = "votes";
pub(crate) const CF_META: &str = "meta";

/// Index column families for ordered listings.
pub(crate) const CF_IDX_FORUM_THREADS: &str = "idx_forum_threads"; // forum + 0x00 + created + id -> ()
pub(crate) const CF_IDX_FORUM_USERS: &str = "idx_forum_users"; // forum + 0x00 + nickname -> ()
pub(crate) const CF_IDX_POSTS_FLAT: &str = "idx_posts_flat"; // thread + created + id -> ()
pub(crate) const CF_IDX_POSTS_TREE: &str = "idx_posts_tree"; // thread + path -> id
pub(crate) const CF_IDX_POST_ROOTS: &str = "idx_post_roots"; // thread + root id -> ()

const ALL_COLUMN_FAMILIES: &[&str] = &[
    CF_PROFILES,
    CF_PROFILE_EMAILS,
    CF_FORUMS,
    CF_THREADS,
    CF_THREAD_SLUGS,
    CF_POSTS,
    CF_VOTES,
    CF_META,
    CF_IDX_FORUM_THREADS,
    CF_IDX_FORUM_USERS,
    CF_IDX_POSTS_FLAT,
    CF_IDX_POSTS_TREE,
    CF_IDX_POST_ROOTS,
];

/// Keys in the meta column family.
pub(crate) const META_SEQ_THREAD: &[u8] = b"seq:thread";
pub(crate) const META_SEQ_POST: &[u8] = b"seq:post";
pub(crate) const META_COUNT_FORUMS: &[u8] = b"count:forums";
pub(crate) const META_COUNT_POSTS: &[u8] = b"count:posts";
pub(crate) const META_COUNT_THREADS: &[u8] = b"count:threads";
pub(crate) const META_COUNT_PROFILES: &[u8] = b"count:profiles";

/// Separator between a forum slug and the rest of a forum index key.
const FORUM_KEY_SEPARATOR: u8 = 0x00;

// =============================================================================
// Key Builders
// =============================================================================

/// Case-folds an identity key.
pub(crate) fn fold(key: &str) -> String {
    key.to_lowercase()
}

/// Encodes a numeric id as a sortable key.
pub(crate) fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decodes an 8-byte big-endian id from an index key or value.
pub(crate) fn decode_id(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| ForumError::storage(format!("Malformed id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// Vote key: `thread_id:lower(nickname)`.
pub(crate) fn vote_key(thread_id: u64, nickname: &str) -> Vec<u8> {
    composite_key(&id_key(thread_id), fold(nickname).as_bytes())
}

/// Prefix shared by every forum index entry of one forum.
pub(crate) fn forum_prefix(forum_slug: &str) -> Vec<u8> {
    prefixed_key(fold(forum_slug).as_bytes(), FORUM_KEY_SEPARATOR, &[])
}

/// Forum thread index key: `lower(forum) 0x00 created id`.
pub(crate) fn forum_thread_key(forum_slug: &str, created: &DateTime<Utc>, id: u64) -> Vec<u8> {
    let mut suffix = Vec::with_capacity(16);
    suffix.extend_from_slice(&timestamp_key(created));
    suffix.extend_from_slice(&id_key(id));
    prefixed_key(fold(forum_slug).as_bytes(), FORUM_KEY_SEPARATOR, &suffix)
}

/// Forum user index key: `lower(forum) 0x00 nickname`, nickname in its stored spelling.
pub(crate) fn forum_user_key(forum_slug: &str, nickname: &str) -> Vec<u8> {
    prefixed_key(
        fold(forum_slug).as_bytes(),
        FORUM_KEY_SEPARATOR,
        nickname.as_bytes(),
    )
}

/// Flat post index key: `thread created id` (24 bytes).
pub(crate) fn flat_key(thread_id: u64, created: &DateTime<Utc>, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(&id_key(thread_id));
    key.extend_from_slice(&timestamp_key(created));
    key.extend_from_slice(&id_key(id));
    key
}

/// Root group index key: `thread root_id` (16 bytes).
pub(crate) fn root_key(thread_id: u64, root_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&id_key(thread_id));
    key.extend_from_slice(&id_key(root_id));
    key
}

// =============================================================================
// Stored Records
// =============================================================================

/// A post as persisted, including its materialized path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PostRecord {
    pub id: u64,
    pub thread: u64,
    pub forum: String,
    pub author: String,
    pub created: DateTime<Utc>,
    pub message: String,
    pub is_edited: bool,
    pub path: PostPath,
}

impl PostRecord {
    /// Converts the record into its public form.
    pub fn to_post(&self) -> Post {
        Post {
            id: self.id,
            author: self.author.clone(),
            created: self.created,
            forum: self.forum.clone(),
            is_edited: self.is_edited,
            message: self.message.clone(),
            parent: self.path.parent_id(),
            thread: self.thread,
            path: self.path.ids().to_vec(),
        }
    }
}

// =============================================================================
// Forum Storage
// =============================================================================

/// RocksDB-backed forum storage.
#[derive(Debug)]
pub struct ForumStorage {
    db: RocksDbHandle,
    gate: RwLock<()>,
}

impl ForumStorage {
    /// Creates a new storage manager with the default data directory.
    pub fn new_default() -> Result<Self> {
        Self::new(DEFAULT_DATA_DIR)
    }

    /// Creates a new storage manager with a custom data directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(data_dir, &RocksDbConfig::default())
    }

    /// Creates a new storage manager with an explicit RocksDB configuration.
    pub fn with_config(data_dir: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let db_path = data_dir.as_ref().join(DB_DIR);
        let db = RocksDbHandle::open(&db_path, config, ALL_COLUMN_FAMILIES)?;
        info!("Opened forum RocksDB at {:?}", db_path);

        Ok(Self {
            db,
            gate: RwLock::new(()),
        })
    }

    pub(crate) fn db(&self) -> &RocksDbHandle {
        &self.db
    }

    /// Acquires the read side of the gate, recovering from poisoning.
    pub(crate) fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Acquires the write side of the gate, recovering from poisoning.
    pub(crate) fn write_gate(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Reads a u64 counter from the meta column family (0 when unset).
    pub(crate) fn read_counter(&self, key: &[u8]) -> Result<u64> {
        match self.db.get_raw(CF_META, key)? {
            Some(bytes) => decode_id(&bytes),
            None => Ok(0),
        }
    }

    /// Stages a counter value in a batch.
    pub(crate) fn stage_counter(batch: &mut StorageBatch<'_>, key: &[u8], value: u64) -> Result<()> {
        batch.put_raw(CF_META, key, &value.to_be_bytes())
    }

    // =========================================================================
    // Loaders (callers hold the gate)
    // =========================================================================

    pub(crate) fn load_profile(&self, nickname: &str) -> Result<Option<Profile>> {
        self.db.get(CF_PROFILES, fold(nickname).as_bytes())
    }

    pub(crate) fn load_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        match self.db.get_raw(CF_PROFILE_EMAILS, fold(email).as_bytes())? {
            Some(owner) => self.db.get(CF_PROFILES, &owner),
            None => Ok(None),
        }
    }

    pub(crate) fn require_profile(&self, nickname: &str) -> Result<Profile> {
        self.load_profile(nickname)?
            .ok_or_else(|| ForumError::not_found(Entity::Profile, nickname))
    }

    pub(crate) fn load_forum(&self, slug: &str) -> Result<Option<Forum>> {
        self.db.get(CF_FORUMS, fold(slug).as_bytes())
    }

    pub(crate) fn require_forum(&self, slug: &str) -> Result<Forum> {
        self.load_forum(slug)?
            .ok_or_else(|| ForumError::not_found(Entity::Forum, slug))
    }

    pub(crate) fn load_thread(&self, id: u64) -> Result<Option<Thread>> {
        self.db.get(CF_THREADS, &id_key(id))
    }

    /// Resolves a thread reference. Non-positive ids never exist.
    pub(crate) fn resolve_thread(&self, thread_ref: &ThreadRef) -> Result<Option<Thread>> {
        match thread_ref {
            ThreadRef::Id(id) if *id > 0 => self.load_thread(*id as u64),
            ThreadRef::Id(_) => Ok(None),
            ThreadRef::Slug(slug) => {
                match self.db.get_raw(CF_THREAD_SLUGS, fold(slug).as_bytes())? {
                    Some(id) => self.load_thread(decode_id(&id)?),
                    None => Ok(None),
                }
            }
        }
    }

    pub(crate) fn require_thread(&self, thread_ref: &ThreadRef) -> Result<Thread> {
        self.resolve_thread(thread_ref)?
            .ok_or_else(|| ForumError::not_found(Entity::Thread, thread_ref))
    }

    pub(crate) fn load_post_record(&self, id: u64) -> Result<Option<PostRecord>> {
        self.db.get(CF_POSTS, &id_key(id))
    }

    pub(crate) fn require_post_record(&self, id: u64) -> Result<PostRecord> {
        self.load_post_record(id)?
            .ok_or_else(|| ForumError::not_found(Entity::Post, id))
    }

    // =========================================================================
    // Gated Reads
    // =========================================================================

    /// Gets a profile by nickname (case-insensitive).
    pub fn get_profile(&self, nickname: &str) -> Result<Option<Profile>> {
        let _gate = self.read_gate();
        self.load_profile(nickname)
    }

    /// Gets a forum, with its counters, by slug (case-insensitive).
    pub fn get_forum(&self, slug: &str) -> Result<Option<Forum>> {
        let _gate = self.read_gate();
        self.load_forum(slug)
    }

    /// Gets a thread by id or slug.
    pub fn get_thread(&self, thread_ref: &ThreadRef) -> Result<Option<Thread>> {
        let _gate = self.read_gate();
        self.resolve_thread(thread_ref)
    }

    /// Gets a post by id.
    pub fn get_post(&self, id: u64) -> Result<Option<Post>> {
        let _gate = self.read_gate();
        Ok(self.load_post_record(id)?.map(|record| record.to_post()))
    }

    /// Returns the global row counts.
    pub fn stats(&self) -> Result<Stats> {
        let _gate = self.read_gate();
        Ok(Stats {
            forum: self.read_counter(META_COUNT_FORUMS)?,
            post: self.read_counter(META_COUNT_POSTS)?,
            thread: self.read_counter(META_COUNT_THREADS)?,
            user: self.read_counter(META_COUNT_PROFILES)?,
        })
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    /// Inserts a new profile, failing with a conflict when the nickname or the
    /// email is already registered.
    pub(crate) fn insert_profile(&self, profile: &Profile) -> Result<Profile> {
        let _gate = self.write_gate();

        let nickname_key = fold(&profile.nickname);
        let email_key = fold(&profile.email);
        if self.db.exists(CF_PROFILES, nickname_key.as_bytes())? {
            return Err(ForumError::conflict(
                Entity::Profile,
                format!("nickname '{}' is taken", profile.nickname),
            ));
        }
        if self.db.exists(CF_PROFILE_EMAILS, email_key.as_bytes())? {
            return Err(ForumError::conflict(
                Entity::Profile,
                format!("email '{}' is taken", profile.email),
            ));
        }

        let profiles = self.read_counter(META_COUNT_PROFILES)?;
        let mut batch = self.db.batch();
        batch.put(CF_PROFILES, nickname_key.as_bytes(), profile)?;
        batch.put_raw(
            CF_PROFILE_EMAILS,
            email_key.as_bytes(),
            nickname_key.as_bytes(),
        )?;
        Self::stage_counter(&mut batch, META_COUNT_PROFILES, profiles + 1)?;
        batch.commit()?;

        info!(nickname = %profile.nickname, "Created profile");
        Ok(profile.clone())
    }

    /// Inserts a new forum owned by an existing profile.
    pub(crate) fn insert_forum(&self, new_forum: &NewForum) -> Result<Forum> {
        let _gate = self.write_gate();

        let owner = self.require_profile(&new_forum.user)?;
        let slug_key = fold(&new_forum.slug);
        if self.db.exists(CF_FORUMS, slug_key.as_bytes())? {
            return Err(ForumError::conflict(
                Entity::Forum,
                format!("slug '{}' is taken", new_forum.slug),
            ));
        }

        let forum = Forum {
            slug: new_forum.slug.clone(),
            title: new_forum.title.clone(),
            user: owner.nickname,
            threads: 0,
            posts: 0,
        };

        let forums = self.read_counter(META_COUNT_FORUMS)?;
        let mut batch = self.db.batch();
        batch.put(CF_FORUMS, slug_key.as_bytes(), &forum)?;
        Self::stage_counter(&mut batch, META_COUNT_FORUMS, forums + 1)?;
        batch.commit()?;

        info!(slug = %forum.slug, owner = %forum.user, "Created forum");
        Ok(forum)
    }

    /// Inserts a new thread into an existing forum.
    ///
    /// Checks run in the order author, forum, slug.
    pub(crate) fn insert_thread(&self, forum_slug: &str, new_thread: &NewThread) -> Result<Thread> {
        let _gate = self.write_gate();

        let author = self.require_profile(&new_thread.author)?;
        let mut forum = self.require_forum(forum_slug)?;

        let slug = new_thread.slug.clone().filter(|slug| !slug.is_empty());
        if let Some(slug) = &slug {
            if self.db.exists(CF_THREAD_SLUGS, fold(slug).as_bytes())? {
                return Err(ForumError::conflict(
                    Entity::Thread,
                    format!("slug '{}' is taken", slug),
                ));
            }
        }

        let id = self.read_counter(META_SEQ_THREAD)? + 1;
        let threads = self.read_counter(META_COUNT_THREADS)?;
        let thread = Thread {
            id,
            author: author.nickname,
            created: new_thread
                .created
                .map(truncate_to_micros)
                .unwrap_or_else(now_micros),
            forum: forum.slug.clone(),
            message: new_thread.message.clone(),
            slug,
            title: new_thread.title.clone(),
            votes: 0,
        };
        forum.threads += 1;

        let mut batch = self.db.batch();
        batch.put(CF_THREADS, &id_key(id), &thread)?;
        if let Some(slug) = &thread.slug {
            batch.put_raw(CF_THREAD_SLUGS, fold(slug).as_bytes(), &id_key(id))?;
        }
        batch.put_raw(
            CF_IDX_FORUM_THREADS,
            &forum_thread_key(&forum.slug, &thread.created, id),
            &[],
        )?;
        batch.put_raw(
            CF_IDX_FORUM_USERS,
            &forum_user_key(&forum.slug, &thread.author),
            &[],
        )?;
        batch.put(CF_FORUMS, fold(&forum.slug).as_bytes(), &forum)?;
        Self::stage_counter(&mut batch, META_SEQ_THREAD, id)?;
        Self::stage_counter(&mut batch, META_COUNT_THREADS, threads + 1)?;
        batch.commit()?;

        info!(
            id = thread.id,
            forum = %thread.forum,
            author = %thread.author,
            "Created thread"
        );
        Ok(thread)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Deletes every record, index, counter, and sequence.
    pub fn reset(&self) -> Result<()> {
        let _gate = self.write_gate();
        let cleared = self.db.clear_column_families(ALL_COLUMN_FAMILIES)?;
        info!(column_families = cleared, "Cleared forum storage");
        Ok(())
    }
}
