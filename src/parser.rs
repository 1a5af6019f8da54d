// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Splitting pasted chat transcripts into messages.
//!
//! Transcripts copied out of chat tools rarely share a format, so this
//! module relies on lexical cues only: a line that starts with a speaker
//! keyword followed by `:` or `-` begins a new message.
//!
//! # Recognized speakers
//!
//! | Keyword                                           | Role        |
//! |---------------------------------------------------|-------------|
//! | `User`, `Human`, `You`, `Me`                      | `user`      |
//! | `Assistant`, `AI`, `Bot`, `ChatGPT`, `Claude`, `GPT`, `System` | `assistant` |
//!
//! Keywords are case-insensitive. Text that contains no keyword at all is
//! treated as a single assistant message.
//!
//! # Example
//!
//! ```
//! use chatfence::parser::{parse_conversation, Role};
//!
//! let messages = parse_conversation("User: hi\n\nAssistant: hello");
//!
//! assert_eq!(messages.len(), 2);
//! assert_eq!(messages[0].role, Role::User);
//! assert_eq!(messages[1].content, "hello");
//! ```

use crate::codeblock::{CodeBlock, extract_code_blocks};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const ROLE_TOKENS: &str = "User|Human|You|Me|Assistant|AI|Bot|ChatGPT|Claude|GPT|System";

/// A speaker keyword at the start of any line.
static ROLE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?imR)^(?:{ROLE_TOKENS})\s*[:\-]")).expect("role line regex")
});

/// A speaker keyword at the start of a segment, with its separator and padding.
static ROLE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\A({ROLE_TOKENS})\s*[:\-]\s*")).expect("role prefix regex")
});

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person talking to the assistant.
    User,
    /// The assistant, or any non-user speaker such as `System`.
    Assistant,
}

impl Role {
    /// Classifies a speaker keyword. Anything that isn't a user alias is
    /// the assistant.
    fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "user" | "human" | "you" | "me" => Self::User,
            _ => Self::Assistant,
        }
    }

    /// The label used when writing messages back out as text.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One message of a parsed conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// `msg-<ordinal>`, where the ordinal is the message's position.
    pub id: String,

    /// Who wrote the message.
    pub role: Role,

    /// The message body without the speaker prefix, trimmed.
    ///
    /// Fenced code stays in place; [`Message::code_blocks`] is a view of it.
    pub content: String,

    /// Code blocks found in `content`, in order of appearance.
    pub code_blocks: Vec<CodeBlock>,
}

impl Message {
    fn new(ordinal: usize, role: Role, content: &str, code_source: &str) -> Self {
        Self {
            id: format!("msg-{ordinal}"),
            role,
            content: content.to_owned(),
            code_blocks: extract_code_blocks(code_source, ordinal),
        }
    }
}

/// Parses raw transcript text into messages.
///
/// Never fails. Empty or whitespace-only input gives an empty vector, and
/// input without any speaker keyword gives one assistant message holding
/// the whole text. Text before the first speaker keyword is dropped.
///
/// # Example
///
/// ```
/// use chatfence::parser::{parse_conversation, Role};
///
/// let messages = parse_conversation("Just some notes with no speakers.");
///
/// assert_eq!(messages.len(), 1);
/// assert_eq!(messages[0].id, "msg-0");
/// assert_eq!(messages[0].role, Role::Assistant);
/// ```
#[must_use]
pub fn parse_conversation(raw: &str) -> Vec<Message> {
    // Files saved by some editors start with a byte-order mark, which would
    // hide a marker on the first line.
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut messages: Vec<Message> = Vec::new();

    // Each marker starts a new segment; the text before the first one is
    // its own (usually empty) segment.
    let mut bounds: Vec<usize> = std::iter::once(0)
        .chain(ROLE_LINE_RE.find_iter(raw).map(|m| m.start()))
        .collect();

    if bounds.len() > 1 {
        bounds.push(raw.len());

        for window in bounds.windows(2) {
            let segment = raw[window[0]..window[1]].trim();
            if segment.is_empty() {
                continue;
            }

            let Some(prefix) = ROLE_PREFIX_RE.captures(segment) else {
                debug!(len = segment.len(), "skipping text without a speaker prefix");
                continue;
            };
            let token = prefix.get(1).map_or("", |m| m.as_str());
            let body_start = prefix.get(0).map_or(0, |m| m.end());
            let content = segment[body_start..].trim();

            messages.push(Message::new(
                messages.len(),
                Role::from_token(token),
                content,
                content,
            ));
        }
    }

    if messages.is_empty() {
        debug!("no speaker markers found, treating input as one assistant message");
        messages.push(Message::new(0, Role::Assistant, raw.trim(), raw));
    }

    debug!(messages = messages.len(), "parsed conversation");
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_messages() {
        assert!(parse_conversation("").is_empty());
        assert!(parse_conversation("  \n\t \n").is_empty());
    }

    #[test]
    fn parses_user_and_assistant_turns() {
        let messages = parse_conversation("User: hi\n\nAssistant: hello");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg-0");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].id, "msg-1");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn text_without_markers_is_one_assistant_message() {
        let messages = parse_conversation("\n  Here is a plan.\nStep one: think.  \n");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "msg-0");
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, "Here is a plan.\nStep one: think.");
    }

    #[test]
    fn fallback_message_still_gets_code_blocks() {
        let messages = parse_conversation("Try this:\n```rust\nfn main() {}\n```\n");

        assert_eq!(messages[0].code_blocks.len(), 1);
        assert_eq!(messages[0].code_blocks[0].filename, "main.rs");
        assert_eq!(messages[0].code_blocks[0].message_index, 0);
    }

    #[test]
    fn role_keywords_are_case_insensitive() {
        let messages = parse_conversation("HUMAN: one\nclaude: two\nchatgpt: three");

        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::Assistant]);
    }

    #[test]
    fn accepts_dash_separator_and_padding() {
        let messages = parse_conversation("Me - question\nGPT :   answer");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "question");
        assert_eq!(messages[1].content, "answer");
    }

    #[test]
    fn every_keyword_maps_to_a_role() {
        for token in ["User", "Human", "You", "Me"] {
            let messages = parse_conversation(&format!("{token}: x"));
            assert_eq!(messages[0].role, Role::User, "{token}");
        }
        for token in ["Assistant", "AI", "Bot", "ChatGPT", "Claude", "GPT", "System"] {
            let messages = parse_conversation(&format!("{token}: x"));
            assert_eq!(messages[0].role, Role::Assistant, "{token}");
        }
    }

    #[test]
    fn markers_must_start_a_line() {
        let messages = parse_conversation("I told the User: no way");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "I told the User: no way");
    }

    #[test]
    fn keyword_prefixes_of_longer_words_are_not_markers() {
        let messages = parse_conversation("Username: bob\nMessage: hello");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
    }

    #[test]
    fn preamble_before_first_marker_is_dropped() {
        let messages = parse_conversation("Exported 2024-01-01\n\nUser: hi\nAI: hey");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg-0");
        assert_eq!(messages[0].content, "hi");
    }

    #[test]
    fn multiline_bodies_stay_intact() {
        let raw = "User: first line\nsecond line\n\nAssistant: reply\n- a list item\n";
        let messages = parse_conversation(raw);

        assert_eq!(messages[0].content, "first line\nsecond line");
        assert_eq!(messages[1].content, "reply\n- a list item");
    }

    #[test]
    fn content_keeps_code_fences() {
        let raw = "User: fix it\nAssistant: Sure:\n```python\nprint(1)\n```";
        let messages = parse_conversation(raw);

        assert_eq!(messages[1].content, "Sure:\n```python\nprint(1)\n```");
        assert_eq!(messages[1].code_blocks.len(), 1);
        assert_eq!(messages[1].code_blocks[0].id, "code-1-0");
    }

    #[test]
    fn code_blocks_point_at_their_message() {
        let raw = "User: a\n```\nx\n```\nAssistant: b\n```\ny\n```\nUser: c\n```\nz\n```";
        let messages = parse_conversation(raw);

        for (ordinal, message) in messages.iter().enumerate() {
            assert_eq!(message.id, format!("msg-{ordinal}"));
            for block in &message.code_blocks {
                assert_eq!(block.message_index, ordinal);
            }
        }
    }

    #[test]
    fn filename_collisions_reset_per_message() {
        let raw = "User: ```python\na\n```\nAssistant: ```python\nb\n```";
        let messages = parse_conversation(raw);

        assert_eq!(messages[0].code_blocks[0].filename, "main.py");
        assert_eq!(messages[1].code_blocks[0].filename, "main.py");
    }

    #[test]
    fn empty_message_body_is_kept() {
        let messages = parse_conversation("User:\nAssistant: ok");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "");
        assert!(messages[0].code_blocks.is_empty());
    }

    #[test]
    fn crlf_transcripts_split_cleanly() {
        let messages = parse_conversation("User: hi\r\n\r\nAssistant: hello\r\n");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn leading_byte_order_mark_is_ignored() {
        let messages = parse_conversation("\u{feff}User: hi\n\nAssistant: hello");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "hello");

        let messages = parse_conversation("\u{feff}User: hi");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");

        let messages = parse_conversation("\u{feff}just notes");
        assert_eq!(messages[0].content, "just notes");
        assert!(parse_conversation("\u{feff}").is_empty());
    }

    #[test]
    fn parsing_is_deterministic() {
        let raw = "User: a\n```js\nx()\n```\nBot: b\n```\ny\n```";
        assert_eq!(parse_conversation(raw), parse_conversation(raw));
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let messages = parse_conversation("User: ```\nx\n```");
        let json = serde_json::to_value(&messages).unwrap();

        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["codeBlocks"][0]["messageIndex"], 0);
        assert_eq!(json[0]["codeBlocks"][0]["filename"], "output.txt");
    }

    #[test]
    fn role_labels() {
        assert_eq!(Role::User.to_string(), "User");
        assert_eq!(Role::Assistant.label(), "Assistant");
    }
}
