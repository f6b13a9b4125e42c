//! Shared constants for forum validation and storage.

// =============================================================================
// Storage Layout
// =============================================================================

/// Default data directory name.
pub const DEFAULT_DATA_DIR: &str = "forumdb_data";

/// Database subdirectory inside the data directory.
pub const DB_DIR: &str = "forum_db";

// =============================================================================
// Content Size Limits
// =============================================================================

/// Maximum nickname size (64 bytes).
pub const MAX_NICKNAME_SIZE: usize = 64;

/// Maximum email size (254 bytes).
pub const MAX_EMAIL_SIZE: usize = 254;

/// Maximum forum/thread slug size (128 bytes).
pub const MAX_SLUG_SIZE: usize = 128;

/// Maximum forum/thread title size (512 bytes).
pub const MAX_TITLE_SIZE: usize = 512;

/// Maximum full name size (256 bytes).
pub const MAX_FULLNAME_SIZE: usize = 256;

/// Maximum profile "about" size (10KB).
pub const MAX_ABOUT_SIZE: usize = 10 * 1024;

/// Maximum thread/post message size (100KB).
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024;

// =============================================================================
// Creation Protocol
// =============================================================================

/// How many times a get-or-create retries when the conflicting record
/// disappears before it can be re-read (a concurrent reset).
pub const MAX_CREATE_ATTEMPTS: usize = 3;
