//! Command-line argument parsing for the forumdb tool.

use crate::error::{ForumError, Result};
use crate::forum::{PostQuery, PostSort, ThreadQuery, ThreadRef, UserQuery};
use chrono::{DateTime, Utc};
use std::env;
use std::path::PathBuf;
use std::process;

/// Command-line interface commands
#[derive(Debug, PartialEq)]
pub enum Command {
    Status,
    Clear,
    Posts { thread: ThreadRef, query: PostQuery },
    Threads { forum: String, query: ThreadQuery },
    Users { forum: String, query: UserQuery },
}

/// A parsed invocation: global options plus the command to run.
#[derive(Debug, PartialEq)]
pub struct Invocation {
    /// `--data-dir`, if given.
    pub data_dir: Option<PathBuf>,
    /// `--server-profile`: open RocksDB with the server tuning.
    pub server_profile: bool,
    pub command: Command,
}

/// Parse command line arguments into an Invocation
pub fn parse_args() -> Result<Invocation> {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage();
        process::exit(1);
    }

    parse_from(&args)
}

/// Parses arguments (without the program name).
pub fn parse_from(args: &[String]) -> Result<Invocation> {
    let mut data_dir = None;
    let mut server_profile = false;
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" => data_dir = Some(PathBuf::from(flag_value(args, &mut i)?)),
            "--server-profile" => server_profile = true,
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let (name, operands) = rest
        .split_first()
        .ok_or_else(|| ForumError::validation("command", "missing command"))?;

    let command = match name.as_str() {
        "status" => Command::Status,
        "clear" => Command::Clear,
        "posts" => {
            let (thread, flags) = split_target("posts", "thread", operands)?;
            let mut query = PostQuery::default();
            let mut i = 0;
            while i < flags.len() {
                match flags[i].as_str() {
                    "--sort" => query.sort = flag_value(flags, &mut i)?.parse::<PostSort>()?,
                    "--limit" => query.limit = Some(parse_limit(flag_value(flags, &mut i)?)?),
                    "--since" => {
                        let since = flag_value(flags, &mut i)?;
                        query.since = Some(since.parse().map_err(|_| {
                            ForumError::validation("since", format!("'{}' is not a post id", since))
                        })?);
                    }
                    "--desc" => query.desc = true,
                    other => return Err(unknown_flag(other)),
                }
                i += 1;
            }
            Command::Posts {
                thread: ThreadRef::parse(thread),
                query,
            }
        }
        "threads" => {
            let (forum, flags) = split_target("threads", "forum", operands)?;
            let mut query = ThreadQuery::default();
            let mut i = 0;
            while i < flags.len() {
                match flags[i].as_str() {
                    "--limit" => query.limit = Some(parse_limit(flag_value(flags, &mut i)?)?),
                    "--since" => query.since = Some(parse_timestamp(flag_value(flags, &mut i)?)?),
                    "--desc" => query.desc = true,
                    other => return Err(unknown_flag(other)),
                }
                i += 1;
            }
            Command::Threads {
                forum: forum.to_string(),
                query,
            }
        }
        "users" => {
            let (forum, flags) = split_target("users", "forum", operands)?;
            let mut query = UserQuery::default();
            let mut i = 0;
            while i < flags.len() {
                match flags[i].as_str() {
                    "--limit" => query.limit = Some(parse_limit(flag_value(flags, &mut i)?)?),
                    "--since" => query.since = Some(flag_value(flags, &mut i)?.to_string()),
                    "--desc" => query.desc = true,
                    other => return Err(unknown_flag(other)),
                }
                i += 1;
            }
            Command::Users {
                forum: forum.to_string(),
                query,
            }
        }
        other => {
            return Err(ForumError::validation(
                "command",
                format!("unknown command '{}'", other),
            ))
        }
    };

    Ok(Invocation {
        data_dir,
        server_profile,
        command,
    })
}

/// Takes the value following the flag at `args[*i]`, advancing `i` past it.
fn flag_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| ForumError::validation("arguments", format!("{} requires a value", flag)))
}

fn split_target<'a>(
    command: &str,
    target: &str,
    operands: &'a [String],
) -> Result<(&'a str, &'a [String])> {
    match operands.split_first() {
        Some((first, flags)) if !first.starts_with("--") => Ok((first.as_str(), flags)),
        _ => Err(ForumError::validation(
            "arguments",
            format!("{} requires a {}", command, target),
        )),
    }
}

fn parse_limit(value: &str) -> Result<usize> {
    value.parse().map_err(|_| {
        ForumError::validation("limit", format!("'{}' is not a non-negative integer", value))
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ForumError::validation("since", format!("'{}': {}", value, e)))
}

fn unknown_flag(flag: &str) -> ForumError {
    ForumError::validation("arguments", format!("unknown option '{}'", flag))
}

/// Print usage information
pub fn print_usage() {
    println!("forumdb - forum storage administration");
    println!("======================================");
    println!();
    println!("Usage: forumdb [--data-dir DIR] [--server-profile] <command> [args...]");
    println!();
    println!("Commands:");
    println!("  status                                        Print row counts");
    println!("  clear                                         Delete all data");
    println!("  posts <thread> [--sort S] [--limit N] [--since ID] [--desc]");
    println!("                                                List a thread's posts");
    println!("  threads <forum> [--limit N] [--since RFC3339] [--desc]");
    println!("                                                List a forum's threads");
    println!("  users <forum> [--limit N] [--since NICK] [--desc]");
    println!("                                                List a forum's users");
    println!();
    println!("Sort modes:");
    println!("  flat         - by creation time (default)");
    println!("  tree         - depth-first by reply tree");
    println!("  parent_tree  - whole root groups, --limit counts groups");
    println!();
    println!("Environment:");
    println!("  FORUMDB_DATA_DIR   data directory when --data-dir is not given");
    println!("  RUST_LOG           log filter (default: forumdb=info)");
    println!();
    println!("Examples:");
    println!("  forumdb status");
    println!("  forumdb posts 42 --sort tree --limit 20");
    println!("  forumdb --data-dir /var/lib/forumdb threads rust --since 2024-01-01T00:00:00Z");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_global_options() {
        let invocation = parse_from(&args("--data-dir /tmp/db status --server-profile")).unwrap();
        assert_eq!(invocation.data_dir, Some(PathBuf::from("/tmp/db")));
        assert!(invocation.server_profile);
        assert_eq!(invocation.command, Command::Status);
    }

    #[test]
    fn test_parse_posts() {
        let invocation =
            parse_from(&args("posts my-thread --sort parent_tree --limit 3 --since 17 --desc"))
                .unwrap();
        assert_eq!(
            invocation.command,
            Command::Posts {
                thread: ThreadRef::Slug("my-thread".to_string()),
                query: PostQuery {
                    sort: PostSort::ParentTree,
                    limit: Some(3),
                    since: Some(17),
                    desc: true,
                },
            }
        );

        let invocation = parse_from(&args("posts 42")).unwrap();
        assert!(matches!(
            invocation.command,
            Command::Posts {
                thread: ThreadRef::Id(42),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_threads_since() {
        let invocation =
            parse_from(&args("threads rust --since 2024-01-01T00:00:00+02:00")).unwrap();
        match invocation.command {
            Command::Threads { forum, query } => {
                assert_eq!(forum, "rust");
                assert_eq!(
                    query.since.unwrap().to_rfc3339(),
                    "2023-12-31T22:00:00+00:00"
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_from(&args("")).is_err());
        assert!(parse_from(&args("frobnicate")).is_err());
        assert!(parse_from(&args("posts")).is_err());
        assert!(parse_from(&args("posts 1 --sort sideways")).is_err());
        assert!(parse_from(&args("posts 1 --limit")).is_err());
        assert!(parse_from(&args("users f --limit -1")).is_err());
        assert!(parse_from(&args("threads f --since yesterday")).is_err());
        assert!(parse_from(&args("users f --bogus")).is_err());
    }
}
