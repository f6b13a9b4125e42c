//! Materialized post paths and batch post creation.
//!
//! Every post stores the ids from its root ancestor down to itself. Encoded as
//! fixed-width big-endian ids, byte order of the path equals depth-first tree
//! order: element-wise comparison, with a prefix sorting before its extensions.
//! The same path key therefore serves the flat, tree, and parent-tree listings.

use crate::error::{Entity, ForumError, Result};
use crate::forum::storage::{
    flat_key, fold, forum_user_key, id_key, root_key, ForumStorage, PostRecord, CF_FORUMS,
    CF_IDX_FORUM_USERS, CF_IDX_POSTS_FLAT, CF_IDX_POSTS_TREE, CF_IDX_POST_ROOTS, CF_POSTS,
    META_COUNT_POSTS, META_SEQ_POST,
};
use crate::forum::types::{now_micros, truncate_to_micros, NewPost, Post, ThreadRef};
use crate::forum::validation::validate_new_posts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Width of one encoded path element.
const PATH_ELEMENT_SIZE: usize = 8;

/// Ids from a root post down to a post, inclusive. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostPath(Vec<u64>);

impl PostPath {
    /// Path of a root post.
    pub fn root(id: u64) -> Self {
        Self(vec![id])
    }

    /// Path of a direct reply to the post at `self`.
    pub fn child(&self, id: u64) -> Self {
        let mut ids = Vec::with_capacity(self.0.len() + 1);
        ids.extend_from_slice(&self.0);
        ids.push(id);
        Self(ids)
    }

    pub fn ids(&self) -> &[u64] {
        &self.0
    }

    /// Id of the top-level ancestor, the root-group key.
    pub fn root_id(&self) -> u64 {
        self.0.first().copied().unwrap_or_default()
    }

    /// Id of the direct parent, if any.
    pub fn parent_id(&self) -> Option<u64> {
        match self.0.len() {
            0 | 1 => None,
            len => Some(self.0[len - 2]),
        }
    }

    /// Number of ancestors, 0 for a root post.
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Encodes the path as concatenated big-endian ids.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() * PATH_ELEMENT_SIZE);
        for id in &self.0 {
            bytes.extend_from_slice(&id.to_be_bytes());
        }
        bytes
    }

    /// Decodes a path produced by [`PostPath::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() % PATH_ELEMENT_SIZE != 0 {
            return Err(ForumError::serialization(format!(
                "Invalid post path of {} bytes",
                bytes.len()
            )));
        }
        let ids = bytes
            .chunks_exact(PATH_ELEMENT_SIZE)
            .map(|chunk| {
                let mut raw = [0u8; PATH_ELEMENT_SIZE];
                raw.copy_from_slice(chunk);
                u64::from_be_bytes(raw)
            })
            .collect();
        Ok(Self(ids))
    }
}

impl From<PostPath> for Vec<u64> {
    fn from(path: PostPath) -> Self {
        path.0
    }
}

/// Tree index key: `thread path...`.
pub(crate) fn tree_key(thread_id: u64, path: &PostPath) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + path.0.len() * PATH_ELEMENT_SIZE);
    key.extend_from_slice(&id_key(thread_id));
    key.extend_from_slice(&path.to_bytes());
    key
}

/// Assigns paths to the posts of one batch.
///
/// Parents are looked up among the posts assigned earlier in the same batch
/// before falling back to committed posts.
struct PathIndexer<'a> {
    storage: &'a ForumStorage,
    thread_id: u64,
    pending: HashMap<u64, PostPath>,
}

impl<'a> PathIndexer<'a> {
    fn new(storage: &'a ForumStorage, thread_id: u64) -> Self {
        Self {
            storage,
            thread_id,
            pending: HashMap::new(),
        }
    }

    /// Computes the path of post `id` under `parent` (absent or 0 for a root).
    fn assign(&mut self, id: u64, parent: Option<u64>) -> Result<PostPath> {
        let path = match parent.filter(|parent| *parent != 0) {
            None => PostPath::root(id),
            Some(parent) => self.parent_path(parent)?.child(id),
        };
        self.pending.insert(id, path.clone());
        Ok(path)
    }

    fn parent_path(&self, parent: u64) -> Result<PostPath> {
        if let Some(path) = self.pending.get(&parent) {
            return Ok(path.clone());
        }
        match self.storage.load_post_record(parent)? {
            Some(record) if record.thread == self.thread_id => Ok(record.path),
            _ => Err(ForumError::conflict(
                Entity::Post,
                format!(
                    "parent post {} doesn't exist in thread {}",
                    parent, self.thread_id
                ),
            )),
        }
    }
}

impl ForumStorage {
    /// Creates a batch of posts in a thread.
    ///
    /// Each item is checked in order: its parent must be a post of the same
    /// thread (otherwise `Conflict`) and its author must exist (otherwise
    /// `NotFound`). The first failure aborts the batch and nothing is written.
    /// Posts without a timestamp share a single creation time.
    pub fn create_posts(&self, thread_ref: &ThreadRef, posts: Vec<NewPost>) -> Result<Vec<Post>> {
        validate_new_posts(&posts)?;
        let _gate = self.write_gate();

        let thread = self.require_thread(thread_ref)?;
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let mut forum = self.require_forum(&thread.forum)?;

        let now = now_micros();
        let mut next_id = self.read_counter(META_SEQ_POST)?;
        let mut indexer = PathIndexer::new(self, thread.id);
        let mut authors: HashMap<String, String> = HashMap::new();
        let mut records = Vec::with_capacity(posts.len());

        for new_post in posts {
            next_id += 1;
            let path = indexer.assign(next_id, new_post.parent)?;

            let author_key = fold(&new_post.author);
            let author = match authors.get(&author_key) {
                Some(nickname) => nickname.clone(),
                None => {
                    let profile = self.require_profile(&new_post.author)?;
                    authors.insert(author_key, profile.nickname.clone());
                    profile.nickname
                }
            };

            debug!(id = next_id, depth = path.depth(), "Assigned post path");
            records.push(PostRecord {
                id: next_id,
                thread: thread.id,
                forum: forum.slug.clone(),
                author,
                created: new_post.created.map(truncate_to_micros).unwrap_or(now),
                message: new_post.message,
                is_edited: false,
                path,
            });
        }

        let posts_total = self.read_counter(META_COUNT_POSTS)?;
        forum.posts += records.len() as u64;

        let mut batch = self.db().batch();
        for record in &records {
            batch.put(CF_POSTS, &id_key(record.id), record)?;
            batch.put_raw(
                CF_IDX_POSTS_FLAT,
                &flat_key(thread.id, &record.created, record.id),
                &[],
            )?;
            batch.put_raw(
                CF_IDX_POSTS_TREE,
                &tree_key(thread.id, &record.path),
                &id_key(record.id),
            )?;
            if record.path.parent_id().is_none() {
                batch.put_raw(CF_IDX_POST_ROOTS, &root_key(thread.id, record.id), &[])?;
            }
            batch.put_raw(
                CF_IDX_FORUM_USERS,
                &forum_user_key(&forum.slug, &record.author),
                &[],
            )?;
        }
        batch.put(CF_FORUMS, fold(&forum.slug).as_bytes(), &forum)?;
        Self::stage_counter(&mut batch, META_SEQ_POST, next_id)?;
        Self::stage_counter(
            &mut batch,
            META_COUNT_POSTS,
            posts_total + records.len() as u64,
        )?;
        batch.commit()?;

        info!(
            thread = thread.id,
            forum = %forum.slug,
            count = records.len(),
            "Created posts"
        );
        Ok(records.iter().map(PostRecord::to_post).collect())
    }
}
