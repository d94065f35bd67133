//! CLI parse: clap types for dialogforge. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dialogforge CLI - prompt-chain dialog generation jobs
#[derive(Parser)]
#[command(name = "dialogforge")]
#[command(about = "Define prompt-chain generators, run generation jobs, and review the dialogs they produce")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage generators (prompt-template chains)
    Generator {
        #[command(subcommand)]
        command: GeneratorCommands,
    },
    /// Manage generation jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Review generated dialogs
    Dialog {
        #[command(subcommand)]
        command: DialogCommands,
    },
    /// Reviewer feedback on dialogs
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum GeneratorCommands {
    /// Create a generator from an ordered list of templates
    Add {
        /// Owning project
        #[arg(long)]
        project: u64,
        /// Generator name
        #[arg(long)]
        name: String,
        /// Prompt template, in execution order (repeat for each step; `^^` is the previous output)
        #[arg(long = "template", required = true)]
        templates: Vec<String>,
    },
    /// Show one generator
    Show {
        /// Generator id
        id: u64,
    },
    /// List a project's generators
    List {
        #[arg(long)]
        project: u64,
    },
}

#[derive(Subcommand)]
pub enum JobCommands {
    /// Create a job in Waiting
    Create {
        #[arg(long)]
        project: u64,
        #[arg(long)]
        generator: u64,
        /// Number of dialogs to generate
        #[arg(long)]
        count: u64,
        /// Model name (defaults to provider.default_model)
        #[arg(long)]
        model: Option<String>,
        /// Sampling temperature (defaults to provider.default_temperature)
        #[arg(long)]
        temperature: Option<f32>,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Template variable as key=value (repeatable; value parsed as JSON when possible)
        #[arg(long = "var")]
        vars: Vec<String>,
    },
    /// Start a job and run it in the foreground until the run ends
    Start {
        id: u64,
    },
    /// Retry a stopped or failed job in the foreground
    Retry {
        id: u64,
    },
    /// Mark a job stopped
    Stop {
        id: u64,
    },
    /// List a project's jobs
    List {
        #[arg(long)]
        project: u64,
        /// all or unfinished
        #[arg(long, default_value = "all")]
        filter: String,
    },
    /// Show job detail and progress
    Show {
        id: u64,
    },
}

#[derive(Subcommand)]
pub enum DialogCommands {
    /// List dialogs of a job or a project
    List {
        #[arg(long, conflicts_with = "project", required_unless_present = "project")]
        job: Option<u64>,
        #[arg(long)]
        project: Option<u64>,
        /// Only dialogs with this review status
        #[arg(long)]
        status: Option<String>,
    },
    /// Edit a dialog's content, or one of its attributes with --field
    Edit {
        id: u64,
        /// New content (or attribute value when --field is given)
        #[arg(long)]
        content: String,
        /// Attribute to replace instead of the content
        #[arg(long)]
        field: Option<String>,
    },
    /// Set a dialog's review status (testing, candidate, canon, removed)
    Status {
        id: u64,
        status: String,
    },
}

#[derive(Subcommand)]
pub enum FeedbackCommands {
    /// Add or replace a user's feedback on a dialog
    Add {
        dialog: u64,
        #[arg(long)]
        user: u64,
        #[arg(long)]
        comment: String,
        /// Structured feedback as JSON
        #[arg(long)]
        content: Option<String>,
    },
    /// List feedback on a dialog
    List {
        dialog: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (secrets redacted)
    Show,
}
