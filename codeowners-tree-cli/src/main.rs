use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, level_filters::LevelFilter, warn};

use codeowners_tree::{
    join_owners, parse_file, progress, spawn_build, BuildOptions, Progress, ProgressWatcher,
    Received, RuleSet, SessionId,
};

const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(250);

const DEFAULT_CODEOWNERS_PATHS: [&str; 3] = [".github/CODEOWNERS", "CODEOWNERS", "docs/CODEOWNERS"];

/// Resolve CODEOWNERS owners for the files of a repository
#[derive(Parser)]
#[command(name = "codeowners-tree", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// CODEOWNERS file (default: .github/CODEOWNERS, CODEOWNERS or
    /// docs/CODEOWNERS under the root)
    #[arg(short = 'f', long = "file", global = true)]
    codeowners_file: Option<PathBuf>,

    /// Repository root
    #[arg(short = 'C', long = "root", global = true, default_value = ".")]
    root: PathBuf,

    /// Read file paths from this file, one per line ("-" for stdin),
    /// instead of walking the root
    #[arg(long, global = true, value_name = "FILE|-")]
    paths_from: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// More logging (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the directory tree of owners
    Tree {
        /// Only keep files owned by this owner (repeatable)
        #[arg(long = "owner", value_name = "OWNER")]
        owners: Vec<String>,

        /// Only keep files with this extension, e.g. ".ts" (repeatable)
        #[arg(long = "extension", value_name = "EXT")]
        extensions: Vec<String>,

        /// Print the tree flattened into an owner to files mapping
        #[arg(long, conflicts_with = "summary")]
        export: bool,

        /// Print file count, owners and extensions instead of the tree
        #[arg(long)]
        summary: bool,

        /// Files resolved between progress updates
        #[arg(long, default_value_t = BuildOptions::default().progress_interval)]
        progress_interval: usize,
    },
    /// Print an owner to files mapping without building a tree
    Owners,
    /// Print the owner and matching rule of individual files
    File {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print the parsed rules
    Rules,
}

impl Cli {
    fn codeowners_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.codeowners_file {
            return Ok(path.clone());
        }
        DEFAULT_CODEOWNERS_PATHS
            .iter()
            .map(|candidate| self.root.join(candidate))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                anyhow!(
                    "no CODEOWNERS file found under {}, pass one with --file",
                    self.root.display()
                )
            })
    }

    fn rule_set(&self) -> Result<RuleSet> {
        let path = self.codeowners_path()?;
        debug!(path = %path.display(), "loading rules");
        RuleSet::from_path(&path).with_context(|| format!("loading {}", path.display()))
    }

    fn file_paths(&self) -> Result<Vec<String>> {
        match self.paths_from.as_deref() {
            Some("-") => {
                let source = io::read_to_string(io::stdin()).context("reading paths from stdin")?;
                Ok(parse_path_list(&source))
            }
            Some(file) => {
                let source =
                    fs::read_to_string(file).with_context(|| format!("reading paths from {}", file))?;
                Ok(parse_path_list(&source))
            }
            None => walk_files(&self.root),
        }
    }

    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();

    match &cli.command {
        Command::Tree {
            owners,
            extensions,
            export,
            summary,
            progress_interval,
        } => {
            let options = BuildOptions {
                progress_interval: *progress_interval,
            };
            let mut root = build(&cli, options)?;
            if !owners.is_empty() {
                root = root.filter_by_owners(owners);
            }
            if !extensions.is_empty() {
                root = root.filter_by_extensions(extensions);
            }

            if *export {
                print_json(&root.owner_map(), cli.pretty)
            } else if *summary {
                let summary = json!({
                    "files": root.file_count(),
                    "owners": root.all_owners(),
                    "extensions": root.all_extensions(),
                });
                print_json(&summary, cli.pretty)
            } else {
                print_json(&root, cli.pretty)
            }
        }
        Command::Owners => {
            let rule_set = cli.rule_set()?;
            let paths = cli.file_paths()?;
            print_json(&rule_set.owners_by_file(&paths), cli.pretty)
        }
        Command::File { paths } => {
            let rule_set = cli.rule_set()?;
            let results = paths
                .iter()
                .map(|path| {
                    let path = normalize_path(path);
                    let rule = rule_set.matching_rule(path);
                    json!({
                        "path": path,
                        "owner": rule.map(|rule| join_owners(&rule.owners)).unwrap_or_default(),
                        "rule": rule,
                    })
                })
                .collect::<Vec<_>>();
            print_json(&results, cli.pretty)
        }
        Command::Rules => {
            let path = cli.codeowners_path()?;
            let rules = parse_file(&path).with_context(|| format!("loading {}", path.display()))?;
            print_json(&rules, cli.pretty)
        }
    }
}

/// Run the build on its own thread and log its progress until it finishes.
fn build(cli: &Cli, options: BuildOptions) -> Result<codeowners_tree::DirectoryOwners> {
    let rule_set = cli.rule_set()?;
    let paths = cli.file_paths()?;
    info!(rules = rule_set.len(), files = paths.len(), "building owners tree");

    let (sender, mut watcher) = progress::channel();
    let session_id = SessionId::generate();
    watcher.watch(session_id.clone());
    let handle = spawn_build(paths, rule_set, session_id, sender, options)?;

    follow_progress(&mut watcher);
    let output = handle.join()?;
    if !watcher.is_current(&output.session_id) {
        warn!(session_id = %output.session_id, "discarding tree from a stale build");
        return Err(anyhow!("build {} was superseded", output.session_id));
    }
    Ok(output.tree)
}

/// Log progress until every sender is gone, returning the last update.
fn follow_progress(watcher: &mut ProgressWatcher) -> Option<Progress> {
    loop {
        match watcher.recv_timeout(PROGRESS_POLL_INTERVAL) {
            Received::Progress(progress) => info!(
                handled = progress.files_handled,
                total = progress.files_total,
                "resolving owners"
            ),
            Received::Timeout => {}
            Received::Disconnected => return watcher.latest().cloned(),
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut out, value)?;
    } else {
        serde_json::to_writer(&mut out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

fn normalize_path(path: &str) -> &str {
    let path = path.trim();
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_start_matches('/')
}

fn parse_path_list(source: &str) -> Vec<String> {
    source
        .lines()
        .map(normalize_path)
        .filter(|path| !path.is_empty())
        .map(str::to_owned)
        .collect()
}

fn walk_files(root: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    let walker = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let path = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        paths.push(path);
    }
    Ok(paths)
}
