use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Aggregate a repository into a single context document for AI assistants"
)]
pub struct Cli {
    /// Directory holding config.toml, static_files/, global_files/ and repositories/
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pick a repository and selections interactively (default)
    Interactive,

    /// Generate the context document without prompting
    Generate(GenerateArgs),

    /// Merge command-line overrides into the stored configuration
    SaveConfig(ConfigOverrides),

    /// Clone a git repository into the workspace
    #[command(name = "clone")]
    CloneRepo {
        /// Repository URL
        url: String,
        /// Directory name under repositories/
        name: String,
    },
}

/// Values layered over the stored configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Subdirectory of the repository to treat as the source root
    #[arg(long)]
    pub source_directory: Option<String>,

    /// Directory names to exclude from the tree and contents
    #[arg(long = "exclude-dir", num_args = 1..)]
    pub exclude_dirs: Option<Vec<String>>,

    /// Files whose content is embedded, relative to the source root
    #[arg(long = "important", num_args = 1..)]
    pub important_files: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Repository path, or the name of a repository under repositories/
    #[arg(long)]
    pub repo: PathBuf,

    /// Write the document here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Extra files or directories (trailing '/') to embed
    #[arg(long, num_args = 1..)]
    pub include: Vec<String>,

    /// Patterns for files or directories to keep out of the contents
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Patterns for files to show in the tree despite file type filters
    #[arg(long, num_args = 1..)]
    pub include_in_tree: Vec<String>,

    /// Patterns for files or directories to hide from the tree
    #[arg(long, num_args = 1..)]
    pub exclude_from_tree: Vec<String>,

    /// Stamp today's date into the header
    #[arg(long)]
    pub date: bool,
}
