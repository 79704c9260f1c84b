//! parsing of the chat text addressed to the bot
use std::num::NonZeroU32;

use tracing::debug;

use crate::error::{LeaseError, LeaseResult};

pub const ALLOCATE_COMMAND: &str = "allocate";
pub const FREE_COMMAND: &str = "free";
/// first words taken as answers to a reclaim query
pub const YES_WORDS: &[&str] = &["y", "yes", "yep", "yeah"];
pub const NO_WORDS: &[&str] = &["n", "no", "nope"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `allocate [hours]`, `None` means use the configured default
    Allocate { hours: Option<NonZeroU32> },
    /// `free`
    Free,
    /// a `y`/`n` answer to a reclaim query
    Reply { affirmative: bool },
    /// anything else, lowercased and trimmed
    Unrecognized(String),
}

impl Command {
    /// Never fails, text that isn't a command becomes `Unrecognized`.
    /// Keywords and replies are matched on the whole first word, so `Y`,
    /// `yes, done` and `nope` are replies but `yikes` is not.
    pub fn parse(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        let mut words = text.split_whitespace();
        match words.next() {
            Some(ALLOCATE_COMMAND) => {
                let hours = words.next().and_then(|arg| match parse_hours(arg) {
                    Ok(hours) => Some(hours),
                    Err(err) => {
                        debug!(?err, "falling back to default lease time");
                        None
                    }
                });
                Command::Allocate { hours }
            }
            Some(FREE_COMMAND) => Command::Free,
            Some(word) => match word.trim_end_matches(|c: char| !c.is_alphanumeric()) {
                w if YES_WORDS.contains(&w) => Command::Reply { affirmative: true },
                w if NO_WORDS.contains(&w) => Command::Reply { affirmative: false },
                _ => Command::Unrecognized(text),
            },
            None => Command::Unrecognized(text),
        }
    }
}

/// a positive whole number of hours
pub fn parse_hours(arg: &str) -> LeaseResult<NonZeroU32> {
    arg.parse::<NonZeroU32>()
        .map_err(|_| LeaseError::MalformedDuration(arg.to_owned()))
}
