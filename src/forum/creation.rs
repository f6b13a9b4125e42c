//! Get-or-create semantics for profiles, forums, and threads.
//!
//! A create always attempts the insert first. When the store rejects it with a
//! uniqueness conflict, the conflicting committed records are read back and
//! returned as [`CreateOutcome::Conflict`]. Two concurrent creates of the same
//! key therefore produce exactly one `Created` and one `Conflict` naming the
//! winner.

use crate::error::{Entity, ForumError, Result};
use crate::forum::constants::MAX_CREATE_ATTEMPTS;
use crate::forum::storage::{fold, ForumStorage};
use crate::forum::types::{Forum, NewForum, NewThread, Profile, Thread, ThreadRef};
use crate::forum::validation::{validate_new_forum, validate_new_thread, validate_profile};
use serde::Serialize;
use tracing::warn;

/// Result of a get-or-create.
///
/// `Conflict` carries the already existing record(s); it is an expected
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CreateOutcome<T, C = T> {
    Created(T),
    Conflict(C),
}

impl<T, C> CreateOutcome<T, C> {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CreateOutcome::Conflict(_))
    }

    /// Returns the created record, if any.
    pub fn created(self) -> Option<T> {
        match self {
            CreateOutcome::Created(created) => Some(created),
            CreateOutcome::Conflict(_) => None,
        }
    }

    /// Returns the conflicting record(s), if any.
    pub fn conflict(self) -> Option<C> {
        match self {
            CreateOutcome::Created(_) => None,
            CreateOutcome::Conflict(existing) => Some(existing),
        }
    }
}

impl<T> CreateOutcome<T, T> {
    /// Returns the record whichever way the create went.
    pub fn into_inner(self) -> T {
        match self {
            CreateOutcome::Created(record) | CreateOutcome::Conflict(record) => record,
        }
    }
}

impl ForumStorage {
    /// Runs `insert`; on a conflict returns what `existing` finds instead.
    ///
    /// If the conflicting record is gone by the time it is re-read (a
    /// concurrent reset), the insert is retried a bounded number of times.
    fn get_or_create<T, C>(
        &self,
        entity: Entity,
        mut insert: impl FnMut() -> Result<T>,
        mut existing: impl FnMut() -> Result<Option<C>>,
    ) -> Result<CreateOutcome<T, C>> {
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            match insert() {
                Ok(created) => return Ok(CreateOutcome::Created(created)),
                Err(err) if err.is_conflict() => {
                    if let Some(found) = existing()? {
                        return Ok(CreateOutcome::Conflict(found));
                    }
                    warn!(
                        entity = %entity,
                        attempt,
                        "Conflicting record vanished before re-read, retrying create"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(ForumError::conflict(
            entity,
            "conflicting record kept changing during create",
        ))
    }

    /// Creates a profile, or returns every existing profile that holds its
    /// nickname or its email.
    pub fn create_profile(
        &self,
        profile: Profile,
    ) -> Result<CreateOutcome<Profile, Vec<Profile>>> {
        validate_profile(&profile)?;

        self.get_or_create(
            Entity::Profile,
            || self.insert_profile(&profile),
            || {
                let _gate = self.read_gate();
                let mut found = Vec::with_capacity(2);
                if let Some(by_nickname) = self.load_profile(&profile.nickname)? {
                    found.push(by_nickname);
                }
                if let Some(by_email) = self.load_profile_by_email(&profile.email)? {
                    let already_listed = found
                        .iter()
                        .any(|p| fold(&p.nickname) == fold(&by_email.nickname));
                    if !already_listed {
                        found.push(by_email);
                    }
                }
                Ok((!found.is_empty()).then_some(found))
            },
        )
    }

    /// Creates a forum owned by an existing profile, or returns the forum that
    /// already holds the slug.
    pub fn create_forum(&self, new_forum: NewForum) -> Result<CreateOutcome<Forum>> {
        validate_new_forum(&new_forum)?;

        self.get_or_create(
            Entity::Forum,
            || self.insert_forum(&new_forum),
            || self.get_forum(&new_forum.slug),
        )
    }

    /// Creates a thread in an existing forum, or returns the thread that
    /// already holds the slug.
    pub fn create_thread(
        &self,
        forum_slug: &str,
        new_thread: NewThread,
    ) -> Result<CreateOutcome<Thread>> {
        validate_new_thread(&new_thread)?;

        self.get_or_create(
            Entity::Thread,
            || self.insert_thread(forum_slug, &new_thread),
            || match new_thread.slug.as_deref() {
                Some(slug) if !slug.is_empty() => {
                    self.get_thread(&ThreadRef::Slug(slug.to_string()))
                }
                _ => Ok(None),
            },
        )
    }
}
