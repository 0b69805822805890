//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use grabar::RemoteBrowser;

/// Grabador: CLI for Grabar - recorded sessions into maintainable tests
#[derive(Parser, Debug)]
#[command(name = "grabador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean a recorded session against the locator library
    Clean(CleanArgs),

    /// Generate test source and data file from a recorded session
    Generate(GenerateArgs),

    /// Detect or apply parameterization on generated source
    Params(ParamsArgs),

    /// Run a generated test to a terminal status
    Run(RunArgs),

    /// Inspect or compact the locator library
    Library(LibraryArgs),
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Recorded session capture (JSON array of capture events)
    pub session: PathBuf,

    /// Locator library to clean against
    #[arg(long, default_value = "locators.jsonl")]
    pub library: PathBuf,

    /// Write the cleaned steps here (defaults to `<session>.steps.json`)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the generate command
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Recorded session capture (JSON array of capture events)
    pub session: PathBuf,

    /// Display name of the test to generate
    #[arg(long)]
    pub name: String,

    /// Directory receiving the source and data files
    #[arg(long, default_value = "tests/generated")]
    pub out_dir: PathBuf,

    /// Clean the session against this locator library first
    #[arg(long)]
    pub library: Option<PathBuf>,
}

/// Arguments for the params command
#[derive(Parser, Debug)]
pub struct ParamsArgs {
    /// Generated test source to analyze
    pub spec: PathBuf,

    /// Rewrite the source and data file instead of listing candidates
    #[arg(long)]
    pub apply: bool,

    /// Data file to write when applying (defaults to `<spec>.data.json`)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Scenario id for the first data record
    #[arg(long, default_value = "scenario-1")]
    pub scenario_id: String,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test name to run
    pub name: String,

    /// Workspace containing the generated tests
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Directory for run history and failure artifacts
    #[arg(long, default_value = ".grabar")]
    pub artifacts: PathBuf,

    /// Locator library receiving failure feedback
    #[arg(long)]
    pub library: Option<PathBuf>,

    /// Override the runner program (defaults to cargo)
    #[arg(long)]
    pub program: Option<String>,

    /// Arguments for the overridden program; `{spec}` expands to the spec path, `{stem}` to its stem
    #[arg(long = "arg")]
    pub args: Vec<String>,

    /// Remote grid host; credentials come from the environment
    #[arg(long)]
    pub remote_host: Option<String>,

    /// Browser to request on the remote grid
    #[arg(long)]
    pub browser: Option<BrowserArg>,

    /// Platform to request on the remote grid
    #[arg(long)]
    pub platform: Option<String>,
}

/// Arguments for the library command
#[derive(Parser, Debug)]
pub struct LibraryArgs {
    /// Locator library path
    #[arg(long, default_value = "locators.jsonl")]
    pub path: PathBuf,

    /// Rewrite the store as one sorted line per key
    #[arg(long)]
    pub compact: bool,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ColorArg {
    /// Auto-detect terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

/// Browser argument for remote runs
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BrowserArg {
    /// Google Chrome
    Chrome,
    /// Mozilla Firefox
    Firefox,
    /// Microsoft Edge
    Edge,
    /// Apple Safari
    Safari,
}

impl From<BrowserArg> for RemoteBrowser {
    fn from(value: BrowserArg) -> Self {
        match value {
            BrowserArg::Chrome => Self::Chrome,
            BrowserArg::Firefox => Self::Firefox,
            BrowserArg::Edge => Self::Edge,
            BrowserArg::Safari => Self::Safari,
        }
    }
}
