//! Detail lookups and in-place updates of existing records.

use crate::error::{Entity, ForumError, Result};
use crate::forum::storage::{
    fold, id_key, ForumStorage, CF_POSTS, CF_PROFILES, CF_PROFILE_EMAILS, CF_THREADS,
};
use crate::forum::types::{
    Post, PostDetails, PostUpdate, Profile, ProfileUpdate, Related, Thread, ThreadRef,
    ThreadUpdate,
};
use crate::forum::validation::{validate_message, validate_profile_fields, validate_title};
use tracing::info;

impl ForumStorage {
    /// Updates the mutable fields of a profile. Absent fields keep their value.
    ///
    /// Moving to an email owned by another profile is a conflict.
    pub fn update_profile(&self, nickname: &str, update: ProfileUpdate) -> Result<Profile> {
        validate_profile_fields(
            update.email.as_deref(),
            update.fullname.as_deref(),
            update.about.as_deref(),
        )?;
        let _gate = self.write_gate();

        let mut profile = self.require_profile(nickname)?;
        let nickname_key = fold(&profile.nickname);
        let old_email_key = fold(&profile.email);

        let mut batch = self.db().batch();
        if let Some(email) = update.email {
            let email_key = fold(&email);
            if email_key != old_email_key {
                if let Some(owner) = self
                    .db()
                    .get_raw(CF_PROFILE_EMAILS, email_key.as_bytes())?
                {
                    if owner != nickname_key.as_bytes() {
                        return Err(ForumError::conflict(
                            Entity::Profile,
                            format!(
                                "email is already registered by user {}",
                                String::from_utf8_lossy(&owner)
                            ),
                        ));
                    }
                }
                batch.delete(CF_PROFILE_EMAILS, old_email_key.as_bytes())?;
                batch.put_raw(
                    CF_PROFILE_EMAILS,
                    email_key.as_bytes(),
                    nickname_key.as_bytes(),
                )?;
            }
            profile.email = email;
        }
        if let Some(about) = update.about {
            profile.about = about;
        }
        if let Some(fullname) = update.fullname {
            profile.fullname = fullname;
        }

        batch.put(CF_PROFILES, nickname_key.as_bytes(), &profile)?;
        batch.commit()?;

        info!(nickname = %profile.nickname, "Updated profile");
        Ok(profile)
    }

    /// Updates a thread's title and/or message.
    pub fn update_thread(&self, thread_ref: &ThreadRef, update: ThreadUpdate) -> Result<Thread> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(message) = &update.message {
            validate_message(message)?;
        }
        let _gate = self.write_gate();

        let mut thread = self.require_thread(thread_ref)?;
        if update.title.is_none() && update.message.is_none() {
            return Ok(thread);
        }
        if let Some(title) = update.title {
            thread.title = title;
        }
        if let Some(message) = update.message {
            thread.message = message;
        }
        self.db().put(CF_THREADS, &id_key(thread.id), &thread)?;

        info!(id = thread.id, "Updated thread");
        Ok(thread)
    }

    /// Returns a post with the related records requested in `related`.
    pub fn post_details(&self, id: u64, related: Related) -> Result<PostDetails> {
        let _gate = self.read_gate();

        let record = self.require_post_record(id)?;
        let author = if related.user {
            self.load_profile(&record.author)?
        } else {
            None
        };
        let forum = if related.forum {
            self.load_forum(&record.forum)?
        } else {
            None
        };
        let thread = if related.thread {
            self.load_thread(record.thread)?
        } else {
            None
        };

        Ok(PostDetails {
            post: record.to_post(),
            author,
            forum,
            thread,
        })
    }

    /// Replaces a post's message.
    ///
    /// The post is marked edited only when the message actually changes.
    pub fn update_post(&self, id: u64, update: PostUpdate) -> Result<Post> {
        if let Some(message) = &update.message {
            validate_message(message)?;
        }
        let _gate = self.write_gate();

        let mut record = self.require_post_record(id)?;
        match update.message {
            Some(message) if message != record.message => {
                record.message = message;
                record.is_edited = true;
                self.db().put(CF_POSTS, &id_key(record.id), &record)?;
                info!(id = record.id, "Edited post");
            }
            _ => {}
        }
        Ok(record.to_post())
    }
}
