use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "myrkat")]
#[command(about = "myrkat - document store and notes for the Myrkat shell")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// If not specified, uses the config file value
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/myrkat/config.toml)
    #[arg(short = 'C', long, global = true, env = "MYRKAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory (overrides config file and MYRKAT_DATA_DIR)
    #[arg(short = 'd', long, global = true)]
    pub data_dir: Option<PathBuf>,
}

impl Cli {
    /// Level the subscriber starts at: flags first, then the configured level.
    pub fn log_filter(&self, configured: &str) -> LevelFilter {
        if let Some(level) = self.log_level {
            return level.into();
        }
        if self.verbose {
            return LevelFilter::DEBUG;
        }
        configured.parse().unwrap_or(LevelFilter::WARN)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the data directory
    Init,

    /// List stored collections
    Collections,

    /// Print documents matching a where-clause
    Find {
        /// Collection name
        collection: String,

        /// JSON object of field/value pairs; omit to match everything
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,
    },

    /// Insert one document (JSON object) or a batch (JSON array)
    Insert {
        /// Collection name
        collection: String,

        /// Document JSON
        data: String,
    },

    /// Merge a JSON patch into every matching document
    Update {
        /// Collection name
        collection: String,

        /// JSON object of field/value pairs
        #[arg(short = 'w', long = "where")]
        filter: String,

        /// Patch JSON object
        data: String,
    },

    /// Delete every matching document
    Delete {
        /// Collection name
        collection: String,

        /// JSON object of field/value pairs; `{}` deletes everything
        #[arg(short = 'w', long = "where")]
        filter: String,
    },

    /// Replace a collection with the documents in a JSON file
    Import {
        /// Collection name
        collection: String,

        /// File holding a JSON array of stored documents
        file: PathBuf,
    },

    /// Dump one collection, or all of them keyed by name
    Export {
        /// Collection name; omit to export everything
        collection: Option<String>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show notes as an indented hierarchy
    Tree,

    /// Note operations
    #[command(subcommand)]
    Note(NoteCommands),

    /// List registered plugins and their view contributions
    Plugins,
}

#[derive(Debug, Subcommand)]
pub enum NoteCommands {
    /// Create an untitled note
    New {
        /// Parent note id
        #[arg(short, long)]
        parent: Option<String>,

        /// Title to give the new note
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Rename a note
    Rename {
        /// Note id
        id: String,

        /// New title
        title: String,
    },

    /// Delete a note
    Rm {
        /// Note id
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_with_where_clause() {
        let cli = Cli::try_parse_from(["myrkat", "find", "notes", "--where", r#"{"title":"A"}"#])
            .unwrap();

        match cli.command {
            Commands::Find { collection, filter } => {
                assert_eq!(collection, "notes");
                assert_eq!(filter.as_deref(), Some(r#"{"title":"A"}"#));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_update_requires_where_clause() {
        assert!(Cli::try_parse_from(["myrkat", "update", "notes", "{}"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["myrkat", "tree", "--data-dir", "/tmp/x", "-v"]).unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_log_filter_precedence() {
        let cli = Cli::try_parse_from(["myrkat", "-l", "trace", "-v", "plugins"]).unwrap();
        assert_eq!(cli.log_filter("warn"), LevelFilter::TRACE);

        let cli = Cli::try_parse_from(["myrkat", "-v", "plugins"]).unwrap();
        assert_eq!(cli.log_filter("warn"), LevelFilter::DEBUG);

        let cli = Cli::try_parse_from(["myrkat", "plugins"]).unwrap();
        assert_eq!(cli.log_filter("error"), LevelFilter::ERROR);
        assert_eq!(cli.log_filter("nonsense"), LevelFilter::WARN);
    }

    #[test]
    fn test_note_subcommands() {
        let cli = Cli::try_parse_from(["myrkat", "note", "new", "--parent", "p1"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::Note(NoteCommands::New { parent: Some(ref p), title: None }) if p == "p1"
        ));
    }
}
