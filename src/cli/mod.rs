//! Command-line interface for mongo-batch-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading, overriding and validation
//! - Interactive prompts for missing connection details
//! - Subcommands (shell completion, configuration display)

pub mod completion;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, LogLevel, sanitize_uri};
use crate::error::{ConfigError, Result};

/// Resumable batch exporter for MongoDB collections
#[derive(Parser, Debug)]
#[command(
    name = "mongo-batch-export",
    version,
    about = "Export a MongoDB collection into resumable JSON batch files",
    long_about = "Reads a collection in ascending _id order, writes one JSON array file per
batch and checkpoints the last exported _id so an interrupted run resumes where
it stopped."
)]
pub struct CliArgs {
    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(value_name = "URI")]
    pub uri: Option<String>,

    /// Database to export from
    #[arg(short = 'd', long, value_name = "NAME")]
    pub database: Option<String>,

    /// Collection to export
    #[arg(short = 'C', long, value_name = "NAME")]
    pub collection: Option<String>,

    /// Records per batch file
    #[arg(long, value_name = "COUNT")]
    pub batch_size: Option<u32>,

    /// Number of parallel lanes over disjoint _id ranges
    #[arg(long, value_name = "COUNT")]
    pub lanes: Option<usize>,

    /// Directory receiving batch files
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Checkpoint file holding the last exported _id
    #[arg(long, value_name = "FILE")]
    pub checkpoint: Option<PathBuf>,

    /// Write batch files without indentation
    #[arg(long)]
    pub compact: bool,

    /// Disable the progress spinner
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Append log output to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Fail instead of prompting for missing URI, database or collection
    #[arg(long = "no-prompt")]
    pub no_prompt: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for mongo-batch-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration (file + arguments)
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build the interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// Arguments override file values, which override defaults. The merged
    /// result is validated.
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        config.validate()?;
        Ok(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_connection_args(config, args);
        Self::apply_export_args(config, args);
        Self::apply_logging_args(config, args);
    }

    fn apply_connection_args(config: &mut Config, args: &CliArgs) {
        if let Some(uri) = &args.uri {
            config.connection.uri = Some(uri.clone());
        }
        if let Some(database) = &args.database {
            config.connection.database = Some(database.clone());
        }
        if let Some(collection) = &args.collection {
            config.connection.collection = Some(collection.clone());
        }
        if let Some(timeout) = args.timeout {
            config.connection.timeout = timeout;
        }
    }

    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        if let Some(batch_size) = args.batch_size {
            config.export.batch_size = batch_size;
        }
        if let Some(lanes) = args.lanes {
            config.export.lane_count = lanes;
        }
        if let Some(dir) = &args.export_dir {
            config.export.export_dir = dir.clone();
        }
        if let Some(checkpoint) = &args.checkpoint {
            config.export.checkpoint_path = checkpoint.clone();
        }
        if args.compact {
            config.export.pretty = false;
        }
        if args.no_progress || args.quiet {
            config.export.progress = false;
        }
    }

    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };

        if let Some(path) = &args.log_file {
            config.logging.file_path = Some(path.clone());
        }
    }

    /// Ask on stdin for any missing URI, database or collection
    ///
    /// With `--no-prompt` a missing value is a configuration error instead.
    pub fn prompt_missing(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.prompt_missing_from(&mut input, &mut output)
    }

    fn prompt_missing_from(&mut self, input: &mut impl BufRead, output: &mut impl Write) -> Result<()> {
        let no_prompt = self.args.no_prompt;
        let connection = &mut self.config.connection;

        let fields = [
            (&mut connection.uri, "connection.uri", "Enter MongoDB connection string: "),
            (&mut connection.database, "connection.database", "Enter database name: "),
            (&mut connection.collection, "connection.collection", "Enter collection name: "),
        ];

        for (slot, field, question) in fields {
            if slot.as_deref().is_some_and(|v| !v.trim().is_empty()) {
                continue;
            }
            if no_prompt {
                return Err(ConfigError::MissingField(field.to_string()).into());
            }

            write!(output, "{question}")?;
            output.flush()?;

            let mut answer = String::new();
            input.read_line(&mut answer)?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Err(ConfigError::MissingField(field.to_string()).into());
            }
            *slot = Some(answer.to_string());
        }

        self.config.validate()
    }

    /// URI with credentials hidden, for log lines
    pub fn sanitized_uri(&self) -> String {
        self.config
            .connection
            .uri
            .as_deref()
            .map(sanitize_uri)
            .unwrap_or_default()
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if a subcommand was handled, false to run the export
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist, defaults apply");
            return;
        }

        match Config::load_from_file(Some(&path)) {
            Ok(config) => match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.config_path().display());
        println!();

        let mut shown = self.config.clone();
        shown.connection.uri = shown.connection.uri.as_deref().map(sanitize_uri);
        println!("{}", shown.to_toml()?);
        Ok(())
    }

    /// Configuration file path (from args or default)
    fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }
}
