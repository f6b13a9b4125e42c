//! Input validation for forum records.
//!
//! Only what the storage layout depends on is checked. Identity keys must be
//! non-empty and free of control characters (forum index keys use `0x00` as a
//! separator), thread slugs must not look like ids, and free text is bounded in
//! size. Any other text is accepted, including spaces and non-ASCII letters.

use crate::error::{ForumError, Result};
use crate::forum::constants::{
    MAX_ABOUT_SIZE, MAX_EMAIL_SIZE, MAX_FULLNAME_SIZE, MAX_MESSAGE_SIZE, MAX_NICKNAME_SIZE,
    MAX_SLUG_SIZE, MAX_TITLE_SIZE,
};
use crate::forum::types::{NewForum, NewPost, NewThread, Profile};

fn check_size(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(ForumError::validation(
            field,
            format!("exceeds maximum size of {} bytes", max),
        ));
    }
    Ok(())
}

fn check_identifier(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() {
        return Err(ForumError::validation(field, "cannot be empty"));
    }
    check_size(field, value, max)?;
    if let Some(c) = value.chars().find(|c| c.is_control()) {
        return Err(ForumError::validation(
            field,
            format!("contains control character {:?}", c),
        ));
    }
    Ok(())
}

/// Validates a profile nickname.
pub fn validate_nickname(nickname: &str) -> Result<()> {
    check_identifier("nickname", nickname, MAX_NICKNAME_SIZE)
}

/// Validates an email address (shape only).
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(ForumError::validation("email", "cannot be empty"));
    }
    check_size("email", email, MAX_EMAIL_SIZE)?;
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ForumError::validation("email", "contains whitespace"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ForumError::validation("email", "must look like user@host")),
    }
}

/// Validates a forum slug.
pub fn validate_forum_slug(slug: &str) -> Result<()> {
    check_identifier("slug", slug, MAX_SLUG_SIZE)
}

/// Validates an optional thread slug. Purely numeric slugs would be read back as ids.
pub fn validate_thread_slug(slug: Option<&str>) -> Result<()> {
    match slug {
        None | Some("") => Ok(()),
        Some(slug) => {
            check_identifier("slug", slug, MAX_SLUG_SIZE)?;
            if slug.parse::<i64>().is_ok() {
                return Err(ForumError::validation(
                    "slug",
                    "thread slug cannot be a number",
                ));
            }
            Ok(())
        }
    }
}

/// Validates a thread or forum title.
pub fn validate_title(title: &str) -> Result<()> {
    check_size("title", title, MAX_TITLE_SIZE)
}

/// Validates a thread or post message.
pub fn validate_message(message: &str) -> Result<()> {
    check_size("message", message, MAX_MESSAGE_SIZE)
}

/// Validates a vote value.
pub fn validate_voice(voice: i32) -> Result<()> {
    match voice {
        -1 | 1 => Ok(()),
        other => Err(ForumError::validation(
            "voice",
            format!("must be -1 or 1, got {}", other),
        )),
    }
}

/// Validates a full profile for creation.
pub fn validate_profile(profile: &Profile) -> Result<()> {
    validate_nickname(&profile.nickname)?;
    validate_email(&profile.email)?;
    check_size("fullname", &profile.fullname, MAX_FULLNAME_SIZE)?;
    check_size("about", &profile.about, MAX_ABOUT_SIZE)
}

/// Validates the optional fields of a profile update.
pub fn validate_profile_fields(
    email: Option<&str>,
    fullname: Option<&str>,
    about: Option<&str>,
) -> Result<()> {
    if let Some(email) = email {
        validate_email(email)?;
    }
    if let Some(fullname) = fullname {
        check_size("fullname", fullname, MAX_FULLNAME_SIZE)?;
    }
    if let Some(about) = about {
        check_size("about", about, MAX_ABOUT_SIZE)?;
    }
    Ok(())
}

/// Validates a forum creation request.
pub fn validate_new_forum(forum: &NewForum) -> Result<()> {
    validate_forum_slug(&forum.slug)?;
    validate_title(&forum.title)?;
    validate_nickname(&forum.user)
}

/// Validates a thread creation request.
pub fn validate_new_thread(thread: &NewThread) -> Result<()> {
    validate_nickname(&thread.author)?;
    validate_title(&thread.title)?;
    validate_message(&thread.message)?;
    validate_thread_slug(thread.slug.as_deref())
}

/// Validates every entry of a post batch.
pub fn validate_new_posts(posts: &[NewPost]) -> Result<()> {
    for post in posts {
        validate_message(&post.message)?;
    }
    Ok(())
}
