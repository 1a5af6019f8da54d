// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Fenced code block extraction.
//!
//! Scans message text for triple-backtick fences and turns each one into a
//! [`CodeBlock`] with a language tag and a filename. Filenames come from, in
//! order of preference:
//!
//! 1. An inline hint on the opening fence line (`` ```ts // src/app.ts ``)
//! 2. A comment on the first line of the body that looks like a path
//! 3. A name synthesized from the language (`main.py`, `output.txt`, ...)
//!
//! Names are unique within one extraction call. Two blocks that would both
//! be called `main.py` become `main.py` and `main-2.py`.
//!
//! # Example
//!
//! ```
//! use chatfence::codeblock::extract_code_blocks;
//!
//! let text = "Here you go:\n```python\nprint('hi')\n```";
//! let blocks = extract_code_blocks(text, 3);
//!
//! assert_eq!(blocks.len(), 1);
//! assert_eq!(blocks[0].id, "code-3-0");
//! assert_eq!(blocks[0].filename, "main.py");
//! assert_eq!(blocks[0].code, "print('hi')");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::trace;

/// Language assigned to fences without a tag.
pub const DEFAULT_LANGUAGE: &str = "text";


// Opening fence, optional tag, optional `//` or `#` hint on the same line,
// then the shortest body up to the next fence.
static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```([A-Za-z0-9_]*)(?:[ \t]*//[ \t]*(.+?))?(?:[ \t]*#[ \t]*(.+?))?\r?\n((?s:.*?))```")
        .expect("fence regex")
});

static COMMENT_FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?://|#|/\*|\{/\*)\s*(.+?)(?:\*/|\*/\})?$").expect("comment filename regex")
});

/// A fenced code block found inside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    /// `code-<message_index>-<position within the message>`.
    pub id: String,

    /// The fence's language tag, or [`DEFAULT_LANGUAGE`].
    pub language: String,

    /// Inferred filename, unique among the blocks of the same message.
    pub filename: String,

    /// The fence body with surrounding whitespace trimmed.
    pub code: String,

    /// Ordinal of the message this block belongs to.
    pub message_index: usize,
}

/// Naming rules for one fence language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageProfile {
    /// File extension without the dot. `None` for files like `Dockerfile`.
    pub extension: Option<&'static str>,

    /// Basenames handed out by block position; the last one repeats.
    pub basenames: &'static [&'static str],
}

impl LanguageProfile {
    const fn new(extension: &'static str, basenames: &'static [&'static str]) -> Self {
        Self {
            extension: Some(extension),
            basenames,
        }
    }

    const fn bare(basenames: &'static [&'static str]) -> Self {
        Self {
            extension: None,
            basenames,
        }
    }
}

/// Looks up the naming rules for a fence language tag.
///
/// Matching is ASCII case-insensitive and covers the usual aliases
/// (`py`, `sh`, `yml`, ...). Returns `None` for unknown tags.
#[must_use]
pub fn language_profile(language: &str) -> Option<LanguageProfile> {
    let profile = match language.to_ascii_lowercase().as_str() {
        "text" | "txt" | "plaintext" | "plain" => LanguageProfile::new("txt", &["output", "notes"]),
        "markdown" | "md" => LanguageProfile::new("md", &["README", "notes"]),

        "typescript" | "ts" => LanguageProfile::new("ts", &["index", "utils", "types"]),
        "tsx" => LanguageProfile::new("tsx", &["App", "Component", "Page"]),
        "javascript" | "js" => LanguageProfile::new("js", &["main", "utils", "helpers"]),
        "jsx" => LanguageProfile::new("jsx", &["App", "Component"]),
        "html" | "htm" => LanguageProfile::new("html", &["index"]),
        "css" => LanguageProfile::new("css", &["styles"]),
        "scss" => LanguageProfile::new("scss", &["styles"]),

        "python" | "py" | "python3" => LanguageProfile::new("py", &["main"]),
        "rust" | "rs" => LanguageProfile::new("rs", &["main", "lib"]),
        "go" | "golang" => LanguageProfile::new("go", &["main"]),
        "java" => LanguageProfile::new("java", &["Main"]),
        "kotlin" | "kt" => LanguageProfile::new("kt", &["Main"]),
        "c" => LanguageProfile::new("c", &["main"]),
        "cpp" | "c++" | "cxx" => LanguageProfile::new("cpp", &["main"]),
        "csharp" | "cs" => LanguageProfile::new("cs", &["Program"]),
        "ruby" | "rb" => LanguageProfile::new("rb", &["main"]),
        "php" => LanguageProfile::new("php", &["index"]),
        "swift" => LanguageProfile::new("swift", &["main"]),

        "bash" | "sh" | "shell" | "zsh" => LanguageProfile::new("sh", &["script", "setup"]),
        "powershell" | "ps1" => LanguageProfile::new("ps1", &["script"]),
        "sql" => LanguageProfile::new("sql", &["schema", "queries"]),
        "json" | "jsonc" => LanguageProfile::new("json", &["data", "config"]),
        "yaml" | "yml" => LanguageProfile::new("yml", &["config"]),
        "toml" => LanguageProfile::new("toml", &["config"]),
        "xml" => LanguageProfile::new("xml", &["data"]),
        "diff" | "patch" => LanguageProfile::new("diff", &["changes"]),

        "dockerfile" | "docker" => LanguageProfile::bare(&["Dockerfile"]),
        "makefile" | "make" => LanguageProfile::bare(&["Makefile"]),

        _ => return None,
    };
    Some(profile)
}

/// Extracts every fenced code block from `text`.
///
/// Fences are matched leftmost first and never overlap. An opening fence
/// without a closing one produces nothing. Filename uniqueness is tracked
/// per call, so each message gets a fresh namespace.
#[must_use]
pub fn extract_code_blocks(text: &str, message_index: usize) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut taken = HashSet::new();

    for (ordinal, caps) in FENCE_RE.captures_iter(text).enumerate() {
        let language = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|tag| !tag.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE);
        let code = caps.get(4).map_or("", |m| m.as_str()).trim();

        // `//` hint wins when both are present.
        let hint = [caps.get(2), caps.get(3)]
            .into_iter()
            .flatten()
            .map(|m| m.as_str().trim())
            .find(|s| !s.is_empty());

        let candidate = hint
            .or_else(|| filename_from_first_line(code))
            .map_or_else(|| synthesize_filename(language, ordinal), str::to_owned);
        let filename = disambiguate(candidate, ordinal, &taken);
        taken.insert(filename.clone());

        trace!(message_index, ordinal, language, filename, "extracted code block");

        blocks.push(CodeBlock {
            id: format!("code-{message_index}-{ordinal}"),
            language: language.to_owned(),
            filename,
            code: code.to_owned(),
            message_index,
        });
    }

    blocks
}

/// Returns the comment text of the body's first line when it looks like a path.
///
/// Recognizes `//`, `#`, `/* */` and JSX `{/* */}` comments. The text must
/// contain a `.` to count, which keeps prose comments out.
fn filename_from_first_line(code: &str) -> Option<&str> {
    let first_line = code.lines().next()?;
    let text = COMMENT_FILENAME_RE.captures(first_line)?.get(1)?.as_str();
    if !text.contains('.') {
        return None;
    }
    Some(text.trim()).filter(|name| !name.is_empty())
}

/// Builds a filename from the language table for the block at `ordinal`.
///
/// Languages missing from the table are numbered by position instead:
/// `code-<ordinal + 1>.<tag>`, or `.txt` for an empty tag.
fn synthesize_filename(language: &str, ordinal: usize) -> String {
    let Some(profile) = language_profile(language) else {
        let ext = if language.is_empty() { "txt" } else { language };
        return format!("code-{}.{ext}", ordinal + 1);
    };

    let basename = profile
        .basenames
        .get(ordinal)
        .or_else(|| profile.basenames.last())
        .copied()
        .unwrap_or("code");

    match profile.extension {
        Some(ext) => format!("{basename}.{ext}"),
        None => basename.to_owned(),
    }
}

/// Returns `candidate`, or a suffixed variant of it that is not yet taken.
///
/// The first suffix tried is `ordinal + 1`, so the third block of a message
/// that collides becomes `name-3.ext`.
fn disambiguate(candidate: String, ordinal: usize, taken: &HashSet<String>) -> String {
    if !taken.contains(&candidate) {
        return candidate;
    }

    let mut n = ordinal + 1;
    loop {
        let name = with_suffix(&candidate, n);
        if !taken.contains(&name) {
            return name;
        }
        n += 1;
    }
}

/// Inserts `-<n>` before the extension of the last path component.
///
/// Names without an extension (or dotfiles like `.env`) get the suffix at
/// the end.
///
/// ```
/// use chatfence::codeblock::with_suffix;
///
/// assert_eq!(with_suffix("src/app.ts", 2), "src/app-2.ts");
/// assert_eq!(with_suffix("Makefile", 3), "Makefile-3");
/// ```
#[must_use]
pub fn with_suffix(filename: &str, n: usize) -> String {
    let name_start = filename.rfind('/').map_or(0, |i| i + 1);
    match filename[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, ext) = filename.split_at(name_start + dot);
            format!("{stem}-{n}{ext}")
        }
        _ => format!("{filename}-{n}"),
    }
}
