//! Terminal front end for GTracker.
//!
//! # Responsibility
//! - Render the project table and drive add/edit/delete/check from the shell.
//! - Route every write through `ProjectStore::submit`, `delete` or
//!   `toggle_check` so validation and persistence stay in core.
//!
//! # Invariants
//! - Row numbers shown to the user are 1-based; core indices are 0-based.
//! - `delete` asks for confirmation on stdin unless `--yes` is given.
//! - Without `--data-dir`, the first run names the directory it creates.

use gtracker_core::{
    core_version, default_log_level, derive_favicon_url, init_logging, normalize_backend,
    open_store, project_rows, BackendKind, Chain, ConfigError, DynProjectStore, ProjectDraft,
    ProjectStatus, ProjectType, StoreError, SubmitOutcome, TrackerConfig,
};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage: gtracker [--data-dir DIR] [--backend memory|file|sqlite] [--log-level LEVEL] <command>

commands:
  list
  add --name NAME --type TYPE --chain CHAIN --status STATUS [--cost N] [--twitter URL] [--website URL]
  edit ROW [--name NAME] [--type TYPE] [--chain CHAIN] [--status STATUS] [--cost N] [--twitter URL] [--website URL]
  delete ROW [--yes]
  check ROW
  favicon URL
  version";

#[derive(Debug)]
enum CliError {
    Usage(String),
    Config(ConfigError),
    Store(StoreError),
    Io(std::io::Error),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}\n\n{USAGE}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{}", err.user_message()),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CliError {}

impl From<StoreError> for CliError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Default)]
struct GlobalOptions {
    data_dir: Option<PathBuf>,
    backend: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
struct DraftFlags {
    name: Option<String>,
    kind: Option<ProjectType>,
    chain: Option<Chain>,
    status: Option<ProjectStatus>,
    cost: Option<f64>,
    twitter: Option<String>,
    website: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Command {
    List,
    Add(DraftFlags),
    Edit { row: usize, flags: DraftFlags },
    Delete { row: usize, assume_yes: bool },
    Check { row: usize },
    Favicon(String),
    Version,
}

fn main() -> ExitCode {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ CliError::Usage(_)) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), CliError> {
    let (options, command) = parse_args(args)?;

    match &command {
        Command::Version => {
            println!("gtracker {}", core_version());
            return Ok(());
        }
        Command::Favicon(url) => {
            println!("{}", derive_favicon_url(url));
            return Ok(());
        }
        _ => {}
    }

    let config = resolve_config(&options)?;
    if let Some(notice) = first_use_notice(&options, &config) {
        eprintln!("{notice}");
    }
    let level = config.log_level.as_deref().unwrap_or(default_log_level());
    if let Err(err) = init_logging(level, config.log_dir()) {
        eprintln!("warning: logging disabled: {err}");
    }
    info!(
        "event=cli_start module=cli status=ok backend={}",
        config.backend.as_str()
    );

    let mut store = open_store(&config)?;
    if let Some(warning) = store.startup_warning() {
        eprintln!("warning: {}", warning.user_message());
    }

    match command {
        Command::List => print_table(&store),
        Command::Add(flags) => {
            let draft = flags.into_new_draft()?;
            if let SubmitOutcome::Added { index } = store.submit(draft, None)? {
                println!("added row {}", index + 1);
            }
        }
        Command::Edit { row, flags } => {
            let index = to_index(row);
            let current = store
                .get(index)
                .ok_or(StoreError::OutOfRange {
                    index,
                    len: store.len(),
                })?
                .to_draft();
            store.submit(flags.apply_to(current), Some(index))?;
            println!("updated row {row}");
        }
        Command::Delete { row, assume_yes } => {
            let removed = store.delete(to_index(row), |project| {
                assume_yes || confirm_delete(&project.name).unwrap_or(false)
            })?;
            match removed {
                Some(project) => println!("deleted `{}`", project.name),
                None => println!("delete cancelled"),
            }
        }
        Command::Check { row } => {
            let now = store.now_ms();
            let project = store.toggle_check(to_index(row))?;
            if project.is_checked(now) {
                println!("row {row} checked for 24 hours");
            } else {
                println!("row {row} check reset");
            }
        }
        Command::Version | Command::Favicon(_) => {}
    }
    Ok(())
}

fn resolve_config(options: &GlobalOptions) -> Result<TrackerConfig, CliError> {
    let data_dir = match &options.data_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => std::env::current_dir()?.join(dir),
        None => TrackerConfig::default().data_dir,
    };
    let mut config = TrackerConfig::load(&data_dir)?;
    if let Some(backend) = &options.backend {
        config.backend = normalize_backend(backend).map_err(CliError::Usage)?;
    }
    if let Some(level) = &options.log_level {
        config.log_level = Some(level.clone());
        config.validate()?;
    }
    Ok(config)
}

// Must run before logging or the store create the directory.
fn first_use_notice(options: &GlobalOptions, config: &TrackerConfig) -> Option<String> {
    if options.data_dir.is_some()
        || config.backend == BackendKind::Memory
        || config.data_dir.exists()
    {
        return None;
    }
    Some(format!(
        "note: storing projects in `{}`; it may be cleared by the OS, pass --data-dir DIR to choose a durable location",
        config.data_dir.display()
    ))
}

fn print_table(store: &DynProjectStore) {
    let rows = project_rows(store.get_all(), store.now_ms());
    if rows.is_empty() {
        println!("No projects available");
        return;
    }

    println!(
        "{:>3}  {:<24} {:^5} {:<8} {:<9} {:<13} {:>9}  LINKS",
        "#", "PROJECT", "CHECK", "TYPE", "CHAIN", "STATUS", "COST"
    );
    for row in rows {
        let links = [row.twitter.as_str(), row.website.as_str()]
            .into_iter()
            .filter(|link| !link.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:>3}  {:<24} {:^5} {:<8} {:<9} {:<13} {:>9}  {}",
            row.index + 1,
            row.name,
            row.check_label,
            row.kind,
            row.chain,
            row.status,
            row.cost,
            links
        );
    }
}

fn confirm_delete(name: &str) -> std::io::Result<bool> {
    print!("Are you sure you want to delete `{name}`? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

// Row 0 is never valid; map it past the end so core reports it out of range.
fn to_index(row: usize) -> usize {
    row.checked_sub(1).unwrap_or(usize::MAX)
}

impl DraftFlags {
    fn into_new_draft(self) -> Result<ProjectDraft, CliError> {
        let missing = |flag: &str| CliError::Usage(format!("add requires --{flag}"));
        let name = self.name.clone().ok_or_else(|| missing("name"))?;
        let kind = self.kind.ok_or_else(|| missing("type"))?;
        let chain = self.chain.ok_or_else(|| missing("chain"))?;
        let status = self.status.ok_or_else(|| missing("status"))?;
        if name.trim().is_empty() {
            return Err(CliError::Usage("--name cannot be empty".to_string()));
        }
        Ok(self.apply_to(ProjectDraft::new(name, kind, chain, status)))
    }

    fn apply_to(self, mut draft: ProjectDraft) -> ProjectDraft {
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(kind) = self.kind {
            draft.kind = kind;
        }
        if let Some(chain) = self.chain {
            draft.chain = chain;
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        if let Some(cost) = self.cost {
            draft.cost = cost;
        }
        if let Some(twitter) = self.twitter {
            draft.twitter = twitter;
        }
        if let Some(website) = self.website {
            draft.website = website;
        }
        draft
    }
}

fn parse_args(args: Vec<String>) -> Result<(GlobalOptions, Command), CliError> {
    let mut options = GlobalOptions::default();
    let mut rest = args.into_iter().peekable();

    while let Some(arg) = rest.next_if(|arg| arg.starts_with("--")) {
        let value = rest
            .next()
            .ok_or_else(|| CliError::Usage(format!("{arg} requires a value")))?;
        match arg.as_str() {
            "--data-dir" => options.data_dir = Some(PathBuf::from(value)),
            "--backend" => options.backend = Some(value),
            "--log-level" => options.log_level = Some(value),
            other => return Err(CliError::Usage(format!("unknown option `{other}`"))),
        }
    }

    let name = rest
        .next()
        .ok_or_else(|| CliError::Usage("missing command".to_string()))?;
    let tail = rest.collect::<Vec<_>>();

    let command = match name.as_str() {
        "list" | "ls" => {
            expect_no_args(&tail)?;
            Command::List
        }
        "add" => Command::Add(parse_draft_flags(&tail)?),
        "edit" => {
            let (row, flags) = split_row(&tail)?;
            Command::Edit {
                row,
                flags: parse_draft_flags(flags)?,
            }
        }
        "delete" | "rm" => {
            let (row, flags) = split_row(&tail)?;
            let assume_yes = match flags {
                [] => false,
                [flag] if flag == "--yes" || flag == "-y" => true,
                _ => return Err(CliError::Usage("delete accepts only --yes".to_string())),
            };
            Command::Delete { row, assume_yes }
        }
        "check" => {
            let (row, flags) = split_row(&tail)?;
            expect_no_args(flags)?;
            Command::Check { row }
        }
        "favicon" => match tail.as_slice() {
            [url] => Command::Favicon(url.clone()),
            _ => return Err(CliError::Usage("favicon takes exactly one URL".to_string())),
        },
        "version" => Command::Version,
        other => return Err(CliError::Usage(format!("unknown command `{other}`"))),
    };
    Ok((options, command))
}

fn split_row(tail: &[String]) -> Result<(usize, &[String]), CliError> {
    let (first, flags) = tail
        .split_first()
        .ok_or_else(|| CliError::Usage("missing ROW".to_string()))?;
    let row = first
        .parse::<usize>()
        .map_err(|_| CliError::Usage(format!("invalid ROW `{first}`")))?;
    Ok((row, flags))
}

fn expect_no_args(tail: &[String]) -> Result<(), CliError> {
    match tail.first() {
        None => Ok(()),
        Some(extra) => Err(CliError::Usage(format!("unexpected argument `{extra}`"))),
    }
}

fn parse_draft_flags(tail: &[String]) -> Result<DraftFlags, CliError> {
    let mut flags = DraftFlags::default();
    let mut iter = tail.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| CliError::Usage(format!("{flag} requires a value")))?;
        match flag.as_str() {
            "--name" => flags.name = Some(value.clone()),
            "--type" => {
                flags.kind = Some(ProjectType::parse(value).ok_or_else(|| {
                    CliError::Usage(format!(
                        "unknown type `{value}`; expected one of {}",
                        labels(ProjectType::ALL.map(ProjectType::label))
                    ))
                })?)
            }
            "--chain" => {
                flags.chain = Some(Chain::parse(value).ok_or_else(|| {
                    CliError::Usage(format!(
                        "unknown chain `{value}`; expected one of {}",
                        labels(Chain::ALL.map(Chain::label))
                    ))
                })?)
            }
            "--status" => {
                flags.status = Some(ProjectStatus::parse(value).ok_or_else(|| {
                    CliError::Usage(format!(
                        "unknown status `{value}`; expected one of {}",
                        labels(ProjectStatus::ALL.map(ProjectStatus::label))
                    ))
                })?)
            }
            "--cost" => {
                flags.cost = Some(
                    value
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| CliError::Usage(format!("invalid cost `{value}`")))?,
                )
            }
            "--twitter" => flags.twitter = Some(value.trim().to_string()),
            "--website" => flags.website = Some(value.trim().to_string()),
            other => return Err(CliError::Usage(format!("unknown flag `{other}`"))),
        }
    }
    Ok(flags)
}

fn labels<const N: usize>(values: [&'static str; N]) -> String {
    values.join("|")
}
