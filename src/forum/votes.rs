//! Thread votes and the running tally.
//!
//! Each profile holds at most one vote per thread. Casting again replaces the
//! previous voice, and the thread's tally moves by the difference, so it always
//! equals the sum of the latest voice of every voter.

use crate::error::{ForumError, Result};
use crate::forum::storage::{id_key, vote_key, ForumStorage, CF_THREADS, CF_VOTES};
use crate::forum::types::{NewVote, Thread, ThreadRef};
use crate::forum::validation::validate_voice;
use tracing::info;

/// Decodes a stored voice byte.
fn decode_voice(bytes: &[u8]) -> Result<i64> {
    match bytes {
        [voice] => Ok(i64::from(*voice as i8)),
        _ => Err(ForumError::storage(format!(
            "Malformed vote of {} bytes",
            bytes.len()
        ))),
    }
}

impl ForumStorage {
    /// Casts or replaces a vote and returns the thread with its updated tally.
    ///
    /// The voter is resolved before the thread.
    pub fn cast_vote(&self, thread_ref: &ThreadRef, vote: &NewVote) -> Result<Thread> {
        validate_voice(vote.voice)?;
        let _gate = self.write_gate();

        let voter = self.require_profile(&vote.nickname)?;
        let mut thread = self.require_thread(thread_ref)?;

        let key = vote_key(thread.id, &voter.nickname);
        let previous = match self.db().get_raw(CF_VOTES, &key)? {
            Some(bytes) => decode_voice(&bytes)?,
            None => 0,
        };
        let voice = i64::from(vote.voice);
        thread.votes += voice - previous;

        let mut batch = self.db().batch();
        batch.put_raw(CF_VOTES, &key, &[voice as i8 as u8])?;
        batch.put(CF_THREADS, &id_key(thread.id), &thread)?;
        batch.commit()?;

        info!(
            thread = thread.id,
            voter = %voter.nickname,
            voice,
            previous,
            votes = thread.votes,
            "Cast vote"
        );
        Ok(thread)
    }
}
