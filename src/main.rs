//! gitsnap - repository queries and snapshot archives
//!
//! This is the main entry point for the gitsnap command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gitsnap::archive::ArchiveFormat;
use gitsnap::history::WalkOptions;
use gitsnap::repo::{Repo, RepoConfig};
use gitsnap::storage::CommitInfo;

/// Query a git repository and export snapshots of it.
#[derive(Parser)]
#[command(name = "gitsnap", version)]
struct Cli {
    /// Path to the repository (default: $GITSNAP_REPO, then the current directory)
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    /// Directory archives are written under (default: $GITSNAP_STORAGE_PATH)
    #[arg(short, long, global = true)]
    storage: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List branches and the commits they point to.
    Branches,

    /// List tags, with their annotations.
    Tags,

    /// Show commit history.
    Log(LogArgs),

    /// Show one commit and the files it changed.
    Show {
        /// Branch, tag or commit sha.
        reference: String,
    },

    /// Export a snapshot archive.
    Archive(ArchiveArgs),
}

#[derive(Args)]
struct LogArgs {
    /// Where to start (default: the default branch).
    #[arg(long = "ref")]
    reference: Option<String>,

    /// Maximum number of commits, 0 for all.
    #[arg(short = 'n', long, default_value = "0")]
    limit: usize,

    /// Matching commits to skip.
    #[arg(long, default_value = "0")]
    offset: usize,

    /// Only commits touching this path prefix.
    #[arg(short, long)]
    path: Option<String>,

    /// Keep following the path across renames.
    #[arg(long)]
    follow: bool,

    /// Print commits as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ArchiveArgs {
    /// What to archive (default: the default branch).
    #[arg(long = "ref")]
    reference: Option<String>,

    /// tar, tar.gz, tar.bz2 or zip.
    #[arg(short, long, default_value = "tar.gz")]
    format: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = RepoConfig::from_env();
    if let Some(path) = cli.repo {
        config = config.path(path);
    }
    if let Some(storage) = cli.storage {
        config = config.storage_path(storage);
    }

    let repo = match Repo::open(config) {
        Ok(repo) => repo,
        Err(e) => {
            eprintln!("Error opening repository: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&repo, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(repo: &Repo, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Branches => {
            let default = repo.discover_default_branch()?;
            for branch in repo.branches()? {
                let marker = if default.as_deref() == Some(branch.name.as_str()) { "*" } else { " " };
                println!("{} {} {}", marker, branch.target.short(), branch.name);
            }
        }
        Command::Tags => {
            for tag in repo.tags()? {
                match tag.message {
                    Some(message) => println!("{} {}\t{}", tag.target.short(), tag.name, message),
                    None => println!("{} {}", tag.target.short(), tag.name),
                }
            }
        }
        Command::Log(args) => {
            let start = start_ref(repo, args.reference)?;
            let mut options = WalkOptions::new(start)
                .limit(args.limit)
                .offset(args.offset)
                .follow_renames(args.follow);
            if let Some(path) = args.path {
                options = options.path(path);
            }

            let commits = repo.log(&options)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&commits)?);
            } else {
                commits.iter().for_each(print_commit_line);
            }
        }
        Command::Show { reference } => {
            let commit = repo.commit(&reference)?;
            print_commit(&commit);

            let Some(parent) = commit.first_parent() else {
                // root commit: everything in the tree is new
                for entry in repo.snapshot(&commit.id.to_string())?.entries {
                    println!("Added\t{}", entry.path);
                }
                return Ok(());
            };
            for change in repo.diff(&parent.to_string(), &commit.id.to_string())? {
                if change.renamed {
                    println!("Renamed\t{} -> {}", change.old_path, change.new_path);
                } else {
                    println!("{:?}\t{}", change.status, change.new_path);
                }
            }
        }
        Command::Archive(args) => {
            let format: ArchiveFormat = args.format.parse()?;
            let reference = start_ref(repo, args.reference)?;
            let path = repo.archive(&reference, format)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// explicit ref, else the default branch, else HEAD
fn start_ref(repo: &Repo, explicit: Option<String>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(reference) = explicit {
        return Ok(reference);
    }
    Ok(repo.root_ref()?.unwrap_or_else(|| "HEAD".to_string()))
}

fn print_commit_line(commit: &CommitInfo) {
    println!(
        "{} {} {} {}",
        commit.id.short(),
        commit.timestamp.format("%Y-%m-%d"),
        commit.author_name,
        commit.summary()
    );
}

fn print_commit(commit: &CommitInfo) {
    println!("commit {}", commit.id);
    if commit.is_merge() {
        let parents: Vec<String> = commit.parent_ids.iter().map(|p| p.short()).collect();
        println!("Merge: {}", parents.join(" "));
    }
    println!("Author: {} <{}>", commit.author_name, commit.author_email);
    println!("Date:   {}", commit.timestamp.to_rfc2822());
    println!();
    for line in commit.message.lines() {
        println!("    {}", line);
    }
    println!();
}
