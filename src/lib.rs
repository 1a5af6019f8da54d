// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Split pasted AI chat transcripts into messages and named code blocks.
//!
//! This crate takes the free-form text you get when copying a conversation
//! out of a chat tool and turns it into structured data that is easy to
//! export.
//!
//! # Overview
//!
//! 1. [`parser`] splits the text into user and assistant messages using
//!    speaker prefixes like `User:` or `Claude:`
//! 2. [`codeblock`] pulls fenced code out of each message and gives every
//!    block a filename
//! 3. [`renderer`] produces export text: the whole conversation, a
//!    selection of messages, or the collected code
//!
//! All of it is pure string processing. Nothing here reads or writes files.
//!
//! # Example
//!
//! ```
//! use chatfence::{parser, renderer};
//!
//! let raw = "User: write hello world\n\nAssistant: ```python\nprint('hello')\n```";
//! let messages = parser::parse_conversation(raw);
//!
//! let code = renderer::all_code_blocks(&messages);
//! assert_eq!(code[0].filename, "main.py");
//!
//! let text = renderer::full_text(&messages);
//! assert!(text.starts_with("User:\nwrite hello world"));
//! ```
//!
//! # Modules
//!
//! - [`parser`]: message segmentation and the [`parser::Message`] type
//! - [`codeblock`]: fence extraction and filename inference
//! - [`renderer`]: text and code exports with their default filenames

#![deny(missing_docs)]

pub mod codeblock;
pub mod parser;
pub mod renderer;
