//! Cursor-based listings over the sorted index column families.
//!
//! Every listing seeks straight to its cursor and walks the index in the
//! requested direction, so a page costs `O(limit)` reads regardless of how many
//! posts or threads precede it.

use crate::error::{ForumError, Result};
use crate::forum::path::{tree_key, PostPath};
use crate::forum::storage::{
    decode_id, flat_key, forum_prefix, forum_thread_key, forum_user_key, id_key, root_key,
    ForumStorage, PostRecord, CF_IDX_FORUM_THREADS, CF_IDX_FORUM_USERS, CF_IDX_POSTS_FLAT,
    CF_IDX_POSTS_TREE, CF_IDX_POST_ROOTS,
};
use crate::forum::types::{
    Post, PostQuery, PostSort, Profile, Thread, ThreadQuery, ThreadRef, UserQuery,
};
use tracing::debug;

/// Suffix that sorts after every id sharing the same timestamp.
const MAX_ID_SUFFIX: [u8; 8] = [0xFF; 8];

/// A raw index entry.
type IndexEntry = (Vec<u8>, Vec<u8>);

impl ForumStorage {
    /// Walks an index within `prefix`, starting at `cursor` and skipping an
    /// entry equal to it, collecting at most `limit` entries.
    ///
    /// Without a cursor the walk starts at the first (ascending) or last
    /// (descending) entry of the prefix.
    fn scan_index(
        &self,
        cf_name: &str,
        prefix: &[u8],
        cursor: Option<&[u8]>,
        desc: bool,
        limit: Option<usize>,
    ) -> Result<Vec<IndexEntry>> {
        let mut entries: Vec<IndexEntry> = Vec::new();
        if limit == Some(0) {
            return Ok(entries);
        }

        let visit = |key: &[u8], value: &[u8]| {
            if cursor == Some(key) {
                return true;
            }
            entries.push((key.to_vec(), value.to_vec()));
            limit.map_or(true, |limit| entries.len() < limit)
        };

        if desc {
            self.db().seek_iterate_reverse(cf_name, cursor, prefix, visit)?;
        } else {
            self.db()
                .seek_iterate(cf_name, cursor.unwrap_or(prefix), prefix, visit)?;
        }

        Ok(entries)
    }

    fn require_indexed_post(&self, id: u64) -> Result<PostRecord> {
        self.load_post_record(id)?
            .ok_or_else(|| ForumError::storage(format!("Index references missing post {}", id)))
    }

    /// Lists the posts of a thread in flat, tree, or parent-tree order.
    ///
    /// `since` is an exclusive post-id cursor. A cursor naming a post that does
    /// not exist yields an empty page. In parent-tree mode `limit` counts root
    /// groups, and each group is returned whole in tree order.
    pub fn thread_posts(&self, thread_ref: &ThreadRef, query: &PostQuery) -> Result<Vec<Post>> {
        let _gate = self.read_gate();

        let thread = self.require_thread(thread_ref)?;
        if query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let since = match query.since {
            Some(id) => match self.load_post_record(id)? {
                Some(record) => Some(record),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let records = match query.sort {
            PostSort::Flat => self.flat_posts(thread.id, since.as_ref(), query)?,
            PostSort::Tree => self.tree_posts(thread.id, since.as_ref(), query)?,
            PostSort::ParentTree => self.parent_tree_posts(thread.id, since.as_ref(), query)?,
        };

        debug!(
            thread = thread.id,
            sort = %query.sort,
            desc = query.desc,
            returned = records.len(),
            "Listed thread posts"
        );
        Ok(records.iter().map(PostRecord::to_post).collect())
    }

    fn flat_posts(
        &self,
        thread_id: u64,
        since: Option<&PostRecord>,
        query: &PostQuery,
    ) -> Result<Vec<PostRecord>> {
        let cursor = since.map(|record| flat_key(thread_id, &record.created, record.id));
        let entries = self.scan_index(
            CF_IDX_POSTS_FLAT,
            &id_key(thread_id),
            cursor.as_deref(),
            query.desc,
            query.limit,
        )?;

        entries
            .iter()
            .map(|(key, _)| self.require_indexed_post(decode_id(&key[16..])?))
            .collect()
    }

    fn tree_posts(
        &self,
        thread_id: u64,
        since: Option<&PostRecord>,
        query: &PostQuery,
    ) -> Result<Vec<PostRecord>> {
        let cursor = since.map(|record| tree_key(thread_id, &record.path));
        let entries = self.scan_index(
            CF_IDX_POSTS_TREE,
            &id_key(thread_id),
            cursor.as_deref(),
            query.desc,
            query.limit,
        )?;

        entries
            .iter()
            .map(|(_, value)| self.require_indexed_post(decode_id(value)?))
            .collect()
    }

    fn parent_tree_posts(
        &self,
        thread_id: u64,
        since: Option<&PostRecord>,
        query: &PostQuery,
    ) -> Result<Vec<PostRecord>> {
        let cursor = since.map(|record| root_key(thread_id, record.path.root_id()));
        let roots = self.scan_index(
            CF_IDX_POST_ROOTS,
            &id_key(thread_id),
            cursor.as_deref(),
            query.desc,
            query.limit,
        )?;

        let mut records = Vec::new();
        for (key, _) in &roots {
            let root_id = decode_id(&key[8..])?;
            let group = self.scan_index(
                CF_IDX_POSTS_TREE,
                &tree_key(thread_id, &PostPath::root(root_id)),
                None,
                false,
                None,
            )?;
            for (_, value) in &group {
                records.push(self.require_indexed_post(decode_id(value)?)?);
            }
        }
        Ok(records)
    }

    /// Lists the threads of a forum by creation time.
    ///
    /// `since` is inclusive: ascending pages start at threads created at or
    /// after it, descending pages at threads created at or before it.
    pub fn forum_threads(&self, forum_slug: &str, query: &ThreadQuery) -> Result<Vec<Thread>> {
        let _gate = self.read_gate();

        let forum = self.require_forum(forum_slug)?;
        let cursor = query.since.map(|since| {
            let mut key = forum_thread_key(&forum.slug, &since, 0);
            if query.desc {
                let tail = key.len() - MAX_ID_SUFFIX.len();
                key[tail..].copy_from_slice(&MAX_ID_SUFFIX);
            }
            key
        });

        let entries = self.scan_index(
            CF_IDX_FORUM_THREADS,
            &forum_prefix(&forum.slug),
            cursor.as_deref(),
            query.desc,
            query.limit,
        )?;

        let mut threads = Vec::with_capacity(entries.len());
        for (key, _) in &entries {
            let id = decode_id(&key[key.len() - 8..])?;
            let thread = self.load_thread(id)?.ok_or_else(|| {
                ForumError::storage(format!("Index references missing thread {}", id))
            })?;
            threads.push(thread);
        }

        debug!(
            forum = %forum.slug,
            since = ?query.since,
            returned = threads.len(),
            "Listed forum threads"
        );
        Ok(threads)
    }

    /// Lists the distinct authors of threads and posts in a forum.
    ///
    /// Users are ordered byte-wise by nickname and `since` is exclusive.
    pub fn forum_users(&self, forum_slug: &str, query: &UserQuery) -> Result<Vec<Profile>> {
        let _gate = self.read_gate();

        let forum = self.require_forum(forum_slug)?;
        let prefix = forum_prefix(&forum.slug);
        let cursor = query
            .since
            .as_deref()
            .map(|since| forum_user_key(&forum.slug, since));

        let entries = self.scan_index(
            CF_IDX_FORUM_USERS,
            &prefix,
            cursor.as_deref(),
            query.desc,
            query.limit,
        )?;

        let mut profiles = Vec::with_capacity(entries.len());
        for (key, _) in &entries {
            let nickname = std::str::from_utf8(&key[prefix.len()..]).map_err(|e| {
                ForumError::storage(format!("Malformed forum user index entry: {}", e))
            })?;
            let profile = self.load_profile(nickname)?.ok_or_else(|| {
                ForumError::storage(format!("Index references missing user {}", nickname))
            })?;
            profiles.push(profile);
        }

        debug!(forum = %forum.slug, returned = profiles.len(), "Listed forum users");
        Ok(profiles)
    }
}
