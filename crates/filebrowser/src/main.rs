//! FileBrowser
//!
//! Command-line front end for a sandboxed media directory.

use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use filebrowser::config::{default_config_path, Config};
use filebrowser::files::storage::LocalStorage;
use filebrowser::files::{FileManager, LoggingHook};
use filebrowser::router::Router;
use protocol::messages::{ListRequest, ListResponse};
use protocol::{DateFilter, FileCategory, FilterCriteria, SortField, SortKey, SortOrder};

/// FileBrowser - browse and manage a media directory.
#[derive(Parser, Debug)]
#[command(name = "filebrowser")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the root directory
    #[arg(short, long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List a directory
    List {
        /// Directory relative to the root
        #[arg(default_value = "")]
        dir: String,

        /// Name pattern (regex, or substring when not a valid regex)
        #[arg(long, short)]
        search: Option<String>,

        /// Only entries of this category
        #[arg(long)]
        category: Option<FileCategory>,

        /// Only entries modified today, past7days, thismonth or thisyear
        #[arg(long)]
        date: Option<DateFilter>,

        /// Sort by name, date, size or category
        #[arg(long)]
        sort_by: Option<SortField>,

        /// Sort order (asc or desc)
        #[arg(long, requires = "sort_by")]
        order: Option<SortOrder>,

        /// Page number
        #[arg(long, default_value = "1")]
        page: usize,

        /// Entries per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Selection type used for the selectable count
        #[arg(long)]
        select_type: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Create a folder
    Mkdir {
        /// Parent directory relative to the root
        dir: String,
        /// Folder name
        name: String,
    },

    /// Upload a local file
    Upload {
        /// Target directory relative to the root
        dir: String,
        /// Local file to upload
        file: PathBuf,
        /// Store under this name instead of the local file name
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a file or an empty folder
    Delete {
        /// Directory relative to the root
        dir: String,
        /// Entry name
        name: String,
    },

    /// Rename a file or folder (files keep their extension)
    Rename {
        /// Directory relative to the root
        dir: String,
        /// Current name
        name: String,
        /// New name without extension
        new_name: String,
    },

    /// Print the content of a text file
    Cat {
        /// Directory relative to the root
        dir: String,
        /// File name
        name: String,
    },

    /// Replace the content of a text file
    Edit {
        /// Directory relative to the root
        dir: String,
        /// File name
        name: String,
        /// Read the new content from this file instead of stdin
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,
    },

    /// Show the versions of an image
    Versions {
        /// Directory relative to the root
        dir: String,
        /// Image name
        name: String,
    },

    /// Answer JSON request envelopes read line by line from stdin
    Request,

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    // Load configuration
    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides
    config.apply_env_overrides();
    if let Some(root) = &cli.root {
        config.storage.root = root.clone();
    }

    // Validate configuration
    config.validate()?;

    // Initialize tracing; stdout carries command output
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    tracing::debug!("Using config file: {:?}", config_path);

    match cli.command {
        Commands::List {
            dir,
            search,
            category,
            date,
            sort_by,
            order,
            page,
            page_size,
            select_type,
            json,
        } => {
            let request = ListRequest {
                dir,
                criteria: FilterCriteria {
                    category,
                    date,
                    query: search,
                },
                sort: sort_by.map(|field| SortKey::new(field, order.unwrap_or_default())),
                page,
                page_size,
                select_type,
            };
            let manager = build_manager(&config)?;
            let response = manager.browser().list(&request)?.to_protocol();
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_listing(&response);
            }
        }
        Commands::Mkdir { dir, name } => {
            let manager = build_manager(&config)?;
            let created = manager.create_dir(&dir, &name)?;
            println!("Created folder {}", created);
        }
        Commands::Upload { dir, file, name } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let raw_name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Upload source has no file name")?,
            };
            let manager = build_manager(&config)?;
            let stored = manager.upload(&dir, &raw_name, &data)?;
            println!("Uploaded {} ({} bytes)", stored, data.len());
        }
        Commands::Delete { dir, name } => {
            let manager = build_manager(&config)?;
            let entry = manager.delete(&dir, &name)?;
            println!("Deleted {}", entry.relative_path);
        }
        Commands::Rename { dir, name, new_name } => {
            let manager = build_manager(&config)?;
            let renamed = manager.rename(&dir, &name, &new_name)?;
            println!("Renamed {} to {}", name, renamed);
        }
        Commands::Cat { dir, name } => {
            let manager = build_manager(&config)?;
            let content = manager.read_text(&dir, &name)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
        Commands::Edit { dir, name, from } => {
            let content = match from {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read content from stdin")?;
                    buf
                }
            };
            let manager = build_manager(&config)?;
            manager.save_text(&dir, &name, &content)?;
            println!("Saved {}", name);
        }
        Commands::Versions { dir, name } => {
            let manager = build_manager(&config)?;
            let versions = manager.versions(&dir, &name)?;
            if versions.is_empty() {
                println!("No versions configured.");
            }
            for version in versions {
                let status = if version.exists { "present" } else { "missing" };
                println!("{:<12}  {:<8}  {}", version.version, status, version.path);
            }
        }
        Commands::Request => {
            let router = Router::new(Arc::new(build_manager(&config)?));
            serve(&router, io::stdin().lock(), io::stdout().lock())?;
        }
        Commands::Config(command) => run_config_command(&command, &config, &config_path)?,
    }

    Ok(())
}

/// Build the file manager over the local filesystem.
fn build_manager(config: &Config) -> anyhow::Result<FileManager> {
    let storage = Arc::new(LocalStorage::new().with_dir_mode(config.storage.dir_mode));
    let manager = FileManager::from_config(config, storage)?.with_hook(Box::new(LoggingHook));
    tracing::debug!(root = %manager.browser().resolver().root().display(), "File manager ready");
    Ok(manager)
}

fn run_config_command(
    command: &ConfigCommands,
    config: &Config,
    config_path: &Path,
) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    config_path.display()
                );
            }
            Config::default().save(config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
        }
    }
    Ok(())
}

/// Answer one JSON envelope per input line until EOF.
fn serve(router: &Router, input: impl BufRead, mut output: impl Write) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = router.handle_json(&line)?;
        writeln!(output, "{}", response)?;
        output.flush()?;
    }
    Ok(())
}

/// Print a listing page as an ASCII table.
fn print_listing(response: &ListResponse) {
    let info = &response.page_info;
    if response.entries.is_empty() {
        println!("No entries.");
    } else {
        let name_width = response
            .entries
            .iter()
            .map(|e| e.name.chars().count() + usize::from(e.is_directory))
            .max()
            .unwrap_or(4)
            .max(4);

        println!(
            "{:<name_width$}  {:<8}  {:>10}  {:>16}",
            "NAME",
            "TYPE",
            "SIZE",
            "MODIFIED",
            name_width = name_width
        );
        println!("{}", "-".repeat(name_width + 42));

        for entry in &response.entries {
            let name = if entry.is_directory {
                format!("{}/", entry.name)
            } else {
                entry.name.clone()
            };
            let size = if entry.is_directory {
                "-".to_string()
            } else {
                format_size(entry.size)
            };
            println!(
                "{:<name_width$}  {:<8}  {:>10}  {:>16}",
                name,
                entry.category.label(),
                size,
                format_timestamp(entry.modified),
                name_width = name_width
            );
        }
    }

    println!();
    println!(
        "Page {} of {} ({} result(s))",
        info.page, info.total_pages, info.results_total
    );
    let counts: Vec<String> = info
        .category_counts
        .iter()
        .map(|c| format!("{}: {}", c.category, c.count))
        .collect();
    if !counts.is_empty() {
        println!("{}", counts.join(", "));
    }
}

/// Format a byte count (e.g., "1.5 MB").
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Format a Unix timestamp in local time.
fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_defaults() {
        let cli = Cli::try_parse_from(["filebrowser", "list"]).unwrap();
        match cli.command {
            Commands::List {
                dir,
                search,
                sort_by,
                page,
                json,
                ..
            } => {
                assert_eq!(dir, "");
                assert!(search.is_none());
                assert!(sort_by.is_none());
                assert_eq!(page, 1);
                assert!(!json);
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_list_with_filters() {
        let cli = Cli::try_parse_from([
            "filebrowser",
            "list",
            "photos/2024",
            "--category",
            "image",
            "--date",
            "past7days",
            "--sort-by",
            "size",
            "--order",
            "desc",
            "--page",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::List {
                dir,
                category,
                date,
                sort_by,
                order,
                page,
                ..
            } => {
                assert_eq!(dir, "photos/2024");
                assert_eq!(category, Some(FileCategory::Image));
                assert_eq!(date, Some(DateFilter::Past7Days));
                assert_eq!(sort_by, Some(SortField::Size));
                assert_eq!(order, Some(SortOrder::Descending));
                assert_eq!(page, 3);
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_list_rejects_unknown_category() {
        assert!(Cli::try_parse_from(["filebrowser", "list", "--category", "spreadsheet"]).is_err());
    }

    #[test]
    fn test_order_requires_sort_by() {
        assert!(Cli::try_parse_from(["filebrowser", "list", "--order", "asc"]).is_err());
    }

    #[test]
    fn test_rename_command() {
        let cli = Cli::try_parse_from(["filebrowser", "rename", "docs", "report.pdf", "summary"])
            .unwrap();
        match cli.command {
            Commands::Rename { dir, name, new_name } => {
                assert_eq!(dir, "docs");
                assert_eq!(name, "report.pdf");
                assert_eq!(new_name, "summary");
            }
            _ => panic!("Expected Rename command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "filebrowser",
            "cat",
            "",
            "notes.txt",
            "--root",
            "/srv/media",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/srv/media")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_config_init_force() {
        let cli = Cli::try_parse_from(["filebrowser", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommands::Init { force: true })
        ));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.0 MB");
    }

    #[test]
    fn test_serve_answers_each_line() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.root = temp_dir.path().to_path_buf();
        let manager = FileManager::from_config(&config, Arc::new(LocalStorage::new())).unwrap();
        let router = Router::new(Arc::new(manager));

        let input = concat!(
            r#"{"version":1,"sequence":1,"payload":{"type":"CreateDirRequest","data":{"dir":"","name":"Scans"}}}"#,
            "\n\n",
            r#"{"version":1,"sequence":2,"payload":{"type":"ListRequest","data":{}}}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve(&router, input.as_bytes(), &mut output).unwrap();

        let lines: Vec<&str> = std::str::from_utf8(&output).unwrap().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("DirCreated"));
        assert!(lines[1].contains("ListResponse"));
        assert!(temp_dir.path().join("Scans").is_dir());
    }
}
