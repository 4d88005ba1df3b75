//! Command line interface and the file-discovery collaborator.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::job::{FileCategory, Job};

/// tagmill — adaptive concurrent batch engine for AI media metadata.
#[derive(Debug, Parser)]
#[command(name = "tagmill", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Worker concurrency override.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Base delay in seconds between batch windows.
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// Pin a single model instead of auto-rotation.
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process every supported file in a folder.
    Run {
        /// Folder containing the files to process.
        input: PathBuf,
    },

    /// Probe each configured credential and report which are usable.
    Check,
}

/// Enumerate supported files in a folder, non-recursively, in name order.
/// Dotfiles and unrecognized extensions are skipped.
pub fn discover_jobs(input: &Path) -> std::io::Result<Vec<Job>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .filter_map(|path| FileCategory::from_path(&path).map(|category| Job::new(path, category)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs::File;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["tagmill", "run", "./incoming"]);
        match cli.command {
            Command::Run { input } => assert_eq!(input, PathBuf::from("./incoming")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "tagmill",
            "--concurrency",
            "8",
            "--delay",
            "30",
            "--model",
            "vista-flash",
            "check",
        ]);
        assert_eq!(cli.concurrency, Some(8));
        assert_eq!(cli.delay, Some(30));
        assert_eq!(cli.model.as_deref(), Some("vista-flash"));
        assert!(matches!(cli.command, Command::Check));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn discovery_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.svg", "a.jpg", ".hidden.jpg", "notes.txt", "c.mp4"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let jobs = discover_jobs(dir.path()).unwrap();
        let names: Vec<String> = jobs.iter().map(|j| j.file_name()).collect();
        assert_eq!(names, vec!["a.jpg", "b.svg", "c.mp4"]);
        assert_eq!(jobs[0].category, FileCategory::Image);
        assert_eq!(jobs[1].category, FileCategory::Vector);
        assert_eq!(jobs[2].category, FileCategory::Video);
    }

    #[test]
    fn discovery_of_missing_folder_is_an_error() {
        assert!(discover_jobs(Path::new("/nonexistent/folder")).is_err());
    }
}
