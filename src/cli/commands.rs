//! Command implementations for the forumdb CLI.

use crate::{
    cli::utils::print_json,
    forum::{ForumStorage, PostQuery, ThreadQuery, ThreadRef, UserQuery},
    storage::RocksDbConfig,
    Result,
};
use std::path::Path;
use tracing::{debug, info};

/// Opens the storage directory with the default or server RocksDB tuning.
pub fn open_storage(data_dir: &Path, server_profile: bool) -> Result<ForumStorage> {
    let config = if server_profile {
        RocksDbConfig::for_server()
    } else {
        RocksDbConfig::default()
    };
    ForumStorage::with_config(data_dir, &config)
}

/// Execute status command
pub fn status(storage: &ForumStorage) -> Result<()> {
    let stats = storage.stats()?;
    info!(
        forums = stats.forum,
        threads = stats.thread,
        posts = stats.post,
        users = stats.user,
        "Storage status"
    );
    debug!("RocksDB stats:\n{}", storage.db().stats());
    print_json(&stats)
}

/// Execute clear command
pub fn clear(storage: &ForumStorage) -> Result<()> {
    storage.reset()?;
    info!("All forum data deleted");
    Ok(())
}

/// Execute posts command
pub fn posts(storage: &ForumStorage, thread: &ThreadRef, query: &PostQuery) -> Result<()> {
    let posts = storage.thread_posts(thread, query)?;
    print_json(&posts)
}

/// Execute threads command
pub fn threads(storage: &ForumStorage, forum: &str, query: &ThreadQuery) -> Result<()> {
    let threads = storage.forum_threads(forum, query)?;
    print_json(&threads)
}

/// Execute users command
pub fn users(storage: &ForumStorage, forum: &str, query: &UserQuery) -> Result<()> {
    let users = storage.forum_users(forum, query)?;
    print_json(&users)
}
