// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for chatfence.
//!
//! This binary provides the `chatfence` command for turning pasted chat
//! transcripts into conversation text, selected excerpts, or code files.

use chatfence::codeblock::with_suffix;
use chatfence::parser::{self, Message};
use chatfence::renderer::{self, ConversationStats, Export, ExportKind};
use lexopt::prelude::*;
use snafu::{OptionExt, ensure, prelude::*};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Where to write the rendered output.
#[derive(Clone)]
enum OutputTarget {
    /// Write files into the specified directory.
    Directory(PathBuf),
    /// Write to stdout.
    Stdout,
}

/// What to produce from each transcript.
#[derive(Clone, Copy)]
enum Mode {
    /// One of the library's text exports.
    Export(ExportKind),
    /// Every code block as its own file.
    Files,
    /// The parsed messages as JSON.
    Json,
}

/// A transcript to read.
enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    fn display(&self) -> String {
        match self {
            Self::Stdin => "<stdin>".to_owned(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

#[allow(clippy::struct_excessive_bools)]
struct Cli {
    input: Vec<PathBuf>,
    output: OutputTarget,
    mode: Mode,
    select: Vec<String>,
    stats: bool,
    quiet: bool,
    dry_run: bool,
    force: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("at least one input file or directory is required"))]
    NoInputFiles,

    #[snafu(display("cannot output multiple transcripts to stdout"))]
    MultipleFilesToStdout,

    #[snafu(display("cannot write separate code files to stdout, use --output <DIR>"))]
    FilesToStdout,

    #[snafu(display("failed to read stdin: {source}"))]
    ReadStdin { source: std::io::Error },

    #[snafu(display("failed to read {}: {source}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to serialize {input}: {source}"))]
    Serialize {
        input: String,
        source: serde_json::Error,
    },

    #[snafu(display("invalid input filename: no file stem"))]
    InvalidFilename,

    #[snafu(display("failed to create output directory {}: {source}", path.display()))]
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Split pasted AI chat transcripts into messages and named code blocks

Usage: {name} [OPTIONS] -o <OUTPUT> <INPUT>...

Arguments:
  <INPUT>...  Transcript files, directories of .txt/.md transcripts, or - for stdin

Options:
  -o, --output <OUTPUT>   Output directory, or - for stdout
  -e, --export <KIND>     What to export (default: full):
                            full         whole conversation as text
                            selected     selected messages as text
                            recent-code  code from the last assistant message
                            all-code     every code block in one file
                            files        every code block as its own file
                            json         parsed messages as JSON
  -s, --select <ID,...>   Message ids to select (e.g. msg-0,msg-2; default: all)
      --stats             Print message and code block counts

Other options:
  -q, --quiet             Suppress progress messages
  -n, --dry-run           Show what would be written without writing
  -f, --force             Overwrite existing output files
  -h, --help              Print help
  -V, --version           Print version

Set RUST_LOG=debug to see parser diagnostics.",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_mode(name: &str) -> Result<Mode, lexopt::Error> {
    match name {
        "files" => Ok(Mode::Files),
        "json" => Ok(Mode::Json),
        other => other
            .parse()
            .map(Mode::Export)
            .map_err(|e: renderer::ExportKindError| e.to_string().into()),
    }
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input = Vec::new();
    let mut output: Option<OutputTarget> = None;
    let mut mode = Mode::Export(ExportKind::Full);
    let mut select = Vec::new();
    let mut stats = false;
    let mut quiet = false;
    let mut dry_run = false;
    let mut force = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = Some(if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::Directory(val)
                });
            }
            Short('e') | Long("export") => {
                mode = parse_mode(&parser.value()?.string()?)?;
            }
            Short('s') | Long("select") => {
                let val = parser.value()?.string()?;
                select.extend(
                    val.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_owned),
                );
            }
            Long("stats") => stats = true,
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('f') | Long("force") => force = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) => input.push(val.parse()?),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        output: output.ok_or("missing required option: --output")?,
        mode,
        select,
        stats,
        quiet,
        dry_run,
        force,
    })
}

/// Sends library diagnostics to stderr, filtered by `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .ok();
}

fn main() -> Result<(), Error> {
    init_tracing();
    let cli = parse_args().context(ParseArgsSnafu)?;

    ensure!(!cli.input.is_empty(), NoInputFilesSnafu);

    let inputs = collect_inputs(&cli.input);
    ensure!(!inputs.is_empty(), NoInputFilesSnafu);

    match &cli.output {
        OutputTarget::Stdout => {
            ensure!(inputs.len() == 1, MultipleFilesToStdoutSnafu);
            ensure!(!matches!(cli.mode, Mode::Files), FilesToStdoutSnafu);
            process_to_stdout(&inputs[0], &cli)?;
        }
        OutputTarget::Directory(dir) => {
            for input in &inputs {
                // Several transcripts would overwrite each other's exports.
                let out_dir = if inputs.len() > 1 {
                    dir.join(input_stem(input)?)
                } else {
                    dir.clone()
                };
                process_to_dir(input, &out_dir, &cli)?;
            }
        }
    }

    Ok(())
}

/// Expands directories into the transcript files they contain.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<Input> {
    let mut files = Vec::new();
    for input in inputs {
        if input == Path::new("-") {
            files.push(Input::Stdin);
        } else if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    e.path()
                        .extension()
                        .is_some_and(|ext| ext == "txt" || ext == "md")
                })
            {
                files.push(Input::File(entry.path().to_path_buf()));
            }
        } else {
            files.push(Input::File(input.clone()));
        }
    }
    files
}

fn input_stem(input: &Input) -> Result<String, Error> {
    match input {
        Input::Stdin => Ok("stdin".to_owned()),
        Input::File(path) => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .context(InvalidFilenameSnafu),
    }
}

/// Reads and parses one transcript, reporting counts when asked.
fn load(input: &Input, cli: &Cli) -> Result<Vec<Message>, Error> {
    let raw = match input {
        Input::Stdin => std::io::read_to_string(std::io::stdin()).context(ReadStdinSnafu)?,
        Input::File(path) => std::fs::read_to_string(path).context(ReadFileSnafu { path })?,
    };

    let messages = parser::parse_conversation(&raw);
    debug!(input = %input.display(), messages = messages.len(), "parsed transcript");

    if cli.stats {
        eprintln!(
            "{}: {}",
            input.display(),
            ConversationStats::from_messages(&messages)
        );
    }
    Ok(messages)
}

/// Produces the exports requested by `mode`. Empty when there is nothing to export.
fn render(
    messages: &[Message],
    mode: Mode,
    selected: &HashSet<String>,
    input: &Input,
) -> Result<Vec<Export>, Error> {
    let exports: Vec<Export> = match mode {
        Mode::Export(kind) => renderer::build_export(kind, messages, selected)
            .into_iter()
            .collect(),
        Mode::Files => messages
            .iter()
            .flat_map(|msg| {
                renderer::block_exports(&msg.code_blocks)
                    .into_iter()
                    .map(move |export| {
                        Export::new(format!("{}/{}", msg.id, export.filename), export.content)
                    })
            })
            .collect(),
        Mode::Json => {
            let json = serde_json::to_string_pretty(messages).context(SerializeSnafu {
                input: input.display(),
            })?;
            vec![Export::new("conversation.json", json)]
        }
    };
    Ok(exports)
}

fn selection(messages: &[Message], cli: &Cli) -> HashSet<String> {
    if cli.select.is_empty() {
        renderer::default_selection(messages)
    } else {
        cli.select.iter().cloned().collect()
    }
}

fn nothing_to_export(input: &Input, mode: Mode) {
    let what = match mode {
        Mode::Export(ExportKind::Selected) => "no messages selected",
        Mode::Export(ExportKind::Full) => "empty transcript",
        _ => "no code blocks found",
    };
    eprintln!("Nothing to export from {} ({what})", input.display());
}

/// Processes a single transcript and outputs to stdout.
fn process_to_stdout(input: &Input, cli: &Cli) -> Result<(), Error> {
    if cli.dry_run {
        eprintln!("Would output {}", input.display());
        return Ok(());
    }

    let messages = load(input, cli)?;
    let selected = selection(&messages, cli);
    let exports = render(&messages, cli.mode, &selected, input)?;

    if exports.is_empty() {
        nothing_to_export(input, cli.mode);
    }
    for export in &exports {
        print!("{}", export.content);
    }
    Ok(())
}

/// Processes a single transcript and writes its exports into `out_dir`.
fn process_to_dir(input: &Input, out_dir: &Path, cli: &Cli) -> Result<(), Error> {
    let messages = load(input, cli)?;
    let selected = selection(&messages, cli);
    let exports = render(&messages, cli.mode, &selected, input)?;

    if exports.is_empty() {
        nothing_to_export(input, cli.mode);
        return Ok(());
    }

    let mut written = HashSet::new();
    for export in &exports {
        let Some(relative) = safe_relative_path(&export.filename) else {
            warn!(filename = %export.filename, "refusing to write outside the output directory");
            eprintln!("Skipping {} (unsafe filename)", export.filename);
            continue;
        };
        let relative = unique_path(relative, &mut written);
        write_export(&out_dir.join(relative), &export.content, cli)?;
    }
    Ok(())
}

/// Claims `relative` in `taken`, suffixing the file name until it is free.
///
/// Names that differ only before normalization (`./a.py` and `a.py`) land
/// on the same path, so uniqueness is checked again here.
fn unique_path(relative: PathBuf, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let Some(name) = relative.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        taken.insert(relative.clone());
        return relative;
    };

    let mut path = relative.clone();
    let mut n = 2;
    while !taken.insert(path.clone()) {
        path = relative.with_file_name(with_suffix(&name, n));
        n += 1;
    }
    if path != relative {
        debug!(from = %relative.display(), to = %path.display(), "renamed colliding output");
    }
    path
}

/// Writes one file, honoring dry-run and overwrite settings.
fn write_export(path: &Path, content: &str, cli: &Cli) -> Result<(), Error> {
    // Handle dry-run mode
    if cli.dry_run {
        eprintln!("Would write {}", path.display());
        return Ok(());
    }

    // Check if output exists and handle overwrite
    if path.exists() && !cli.force {
        eprintln!(
            "Skipping {} (already exists, use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateOutputDirSnafu { path: parent })?;
    }
    std::fs::write(path, content).context(WriteFileSnafu { path })?;

    if !cli.quiet {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

/// Turns a filename taken from a transcript into a path that stays inside
/// the output directory.
///
/// Leading roots are dropped; any `..` component rejects the name.
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return None,
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}
