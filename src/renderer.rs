// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Plain-text exports of parsed conversations.
//!
//! Everything here turns already-parsed [`Message`]s into strings. Writing
//! those strings somewhere is left to the caller; [`Export`] pairs each
//! string with the filename it should be saved under.
//!
//! # Output Format
//!
//! Conversation text renders each message as its role label on one line and
//! the content below, with `---` between messages:
//!
//! ```text
//! User:
//! How do I print?
//!
//! ---
//!
//! Assistant:
//! Use println!.
//! ```
//!
//! Code exports put a banner above each block and two blank lines between
//! blocks:
//!
//! ```text
//! // ===== main.py (python) =====
//!
//! print("hi")
//! ```
//!
//! # Example
//!
//! ```
//! use chatfence::parser::parse_conversation;
//! use chatfence::renderer::{ExportKind, build_export, default_selection};
//!
//! let messages = parse_conversation("User: hi\nAssistant: ```sh\nls\n```");
//! let selected = default_selection(&messages);
//!
//! let export = build_export(ExportKind::RecentCode, &messages, &selected).unwrap();
//! assert_eq!(export.filename, "script.sh");
//! assert_eq!(export.content, "ls");
//! ```

use crate::codeblock::CodeBlock;
use crate::parser::{Message, Role};
use snafu::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const MESSAGE_SEPARATOR: &str = "\n\n---\n\n";
const BLOCK_SEPARATOR: &str = "\n\n\n";

/// Renders every message as conversation text.
#[must_use]
pub fn full_text(messages: &[Message]) -> String {
    render_messages(messages.iter())
}

/// Renders only the selected messages, keeping conversation order.
///
/// Selection order doesn't matter; the output follows `messages`.
#[must_use]
pub fn selected_text(messages: &[Message], selected_ids: &HashSet<String>) -> String {
    render_messages(
        messages
            .iter()
            .filter(|msg| selected_ids.contains(msg.id.as_str())),
    )
}

fn render_messages<'a>(messages: impl Iterator<Item = &'a Message>) -> String {
    messages
        .map(|msg| format!("{}:\n{}", msg.role.label(), msg.content))
        .collect::<Vec<_>>()
        .join(MESSAGE_SEPARATOR)
}

/// Collects every code block, in message order and then block order.
#[must_use]
pub fn all_code_blocks(messages: &[Message]) -> Vec<&CodeBlock> {
    messages.iter().flat_map(|msg| &msg.code_blocks).collect()
}

/// Returns the code blocks of the last assistant message.
///
/// This is the most recent *assistant* message, not the most recent
/// message: a trailing user turn is skipped over.
#[must_use]
pub fn recent_code_blocks(messages: &[Message]) -> &[CodeBlock] {
    messages
        .iter()
        .rev()
        .find(|msg| msg.role == Role::Assistant)
        .map(|msg| msg.code_blocks.as_slice())
        .unwrap_or_default()
}

/// Joins code blocks into one file, each under a filename banner.
#[must_use]
pub fn combined_code_export<'a>(blocks: impl IntoIterator<Item = &'a CodeBlock>) -> String {
    blocks
        .into_iter()
        .map(|block| {
            format!(
                "// ===== {} ({}) =====\n\n{}",
                block.filename, block.language, block.code
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// The ids of every message, which is what a fresh parse selects.
#[must_use]
pub fn default_selection(messages: &[Message]) -> HashSet<String> {
    messages.iter().map(|msg| msg.id.clone()).collect()
}

/// Error returned when an export name isn't recognized.
#[derive(Debug, Snafu)]
pub enum ExportKindError {
    /// The name matched none of the export kinds.
    #[snafu(display(
        "unknown export kind `{name}` (expected full, selected, recent-code or all-code)"
    ))]
    Unknown {
        /// The name that was given.
        name: String,
    },
}

/// The exports a conversation offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    /// The whole conversation as text.
    Full,
    /// Only the selected messages as text.
    Selected,
    /// Code from the most recent assistant message.
    RecentCode,
    /// Code from every message.
    AllCode,
}

impl ExportKind {
    /// All kinds, in the order they are usually offered.
    pub const ALL: [Self; 4] = [Self::Full, Self::Selected, Self::RecentCode, Self::AllCode];

    /// Filename used when the export is saved.
    ///
    /// [`ExportKind::RecentCode`] with exactly one block uses the block's
    /// own filename instead; see [`build_export`].
    #[must_use]
    pub const fn default_filename(self) -> &'static str {
        match self {
            Self::Full => "conversation-full.txt",
            Self::Selected => "conversation-selected.txt",
            Self::RecentCode => "recent-code.txt",
            Self::AllCode => "all-code-blocks.txt",
        }
    }

    /// Short name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Selected => "selected",
            Self::RecentCode => "recent-code",
            Self::AllCode => "all-code",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportKind {
    type Err = ExportKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .context(UnknownSnafu { name: s })
    }
}

/// Export text together with the filename it should be saved as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Suggested filename. May contain `/` when taken from a code comment.
    pub filename: String,

    /// The file content.
    pub content: String,
}

impl Export {
    /// Creates an export from a filename and its content.
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// A single code block saved under its own filename.
    #[must_use]
    pub fn from_block(block: &CodeBlock) -> Self {
        Self::new(block.filename.as_str(), block.code.as_str())
    }
}

/// Builds the export for `kind`, or `None` when there is nothing to export.
///
/// Nothing to export means no messages for [`ExportKind::Full`], an empty
/// selection for [`ExportKind::Selected`], or no code blocks for the code
/// exports.
#[must_use]
pub fn build_export(
    kind: ExportKind,
    messages: &[Message],
    selected_ids: &HashSet<String>,
) -> Option<Export> {
    match kind {
        ExportKind::Full => (!messages.is_empty())
            .then(|| Export::new(kind.default_filename(), full_text(messages))),
        ExportKind::Selected => (!selected_ids.is_empty()).then(|| {
            Export::new(
                kind.default_filename(),
                selected_text(messages, selected_ids),
            )
        }),
        ExportKind::RecentCode => match recent_code_blocks(messages) {
            [] => None,
            [only] => Some(Export::from_block(only)),
            blocks => Some(Export::new(
                kind.default_filename(),
                combined_code_export(blocks),
            )),
        },
        ExportKind::AllCode => {
            let blocks = all_code_blocks(messages);
            (!blocks.is_empty())
                .then(|| Export::new(kind.default_filename(), combined_code_export(blocks)))
        }
    }
}

/// One export per code block, each under the block's filename.
#[must_use]
pub fn block_exports<'a>(blocks: impl IntoIterator<Item = &'a CodeBlock>) -> Vec<Export> {
    blocks.into_iter().map(Export::from_block).collect()
}

/// Counts describing a parsed conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversationStats {
    /// Number of messages.
    pub messages: usize,
    /// Messages written by the user.
    pub user_messages: usize,
    /// Messages written by the assistant.
    pub assistant_messages: usize,
    /// Code blocks across all messages.
    pub code_blocks: usize,
}

impl ConversationStats {
    /// Tallies `messages`.
    #[must_use]
    pub fn from_messages(messages: &[Message]) -> Self {
        messages.iter().fold(Self::default(), |mut stats, msg| {
            stats.messages += 1;
            match msg.role {
                Role::User => stats.user_messages += 1,
                Role::Assistant => stats.assistant_messages += 1,
            }
            stats.code_blocks += msg.code_blocks.len();
            stats
        })
    }
}

impl fmt::Display for ConversationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        write!(
            f,
            "{} message{} parsed ({} user, {} assistant), {} code block{}",
            self.messages,
            plural(self.messages),
            self.user_messages,
            self.assistant_messages,
            self.code_blocks,
            plural(self.code_blocks),
        )
    }
}
