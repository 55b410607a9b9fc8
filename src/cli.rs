use crate::media::{Classification, MediaKind};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Find default config path with priority:
/// 1. /etc/plexmove/config.yaml (system-wide, preferred)
/// 2. ~/.config/plexmove/config.yaml (user-specific)
/// 3. Fallback to /etc even if doesn't exist
pub fn default_config_path() -> PathBuf {
    let etc_path = PathBuf::from("/etc/plexmove/config.yaml");

    if etc_path.exists() {
        return etc_path;
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user_path = config_dir.join("plexmove/config.yaml");
        if user_path.exists() {
            return user_path;
        }
    }

    // missing file gives a clear error at load time
    etc_path
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Movie,
    Tv,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movie => Self::Movie,
            KindArg::Tv => Self::TvEpisode,
        }
    }
}

/// User corrections applied on top of what the classifier detected
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Override the detected media kind
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Override the detected title (show title for TV)
    #[arg(short, long)]
    pub title: Option<String>,

    /// Override the detected year
    #[arg(short, long)]
    pub year: Option<u32>,

    /// Season for episodes whose name has none
    #[arg(short, long)]
    pub season: Option<u32>,
}

impl Overrides {
    pub fn apply(&self, mut classification: Classification) -> Classification {
        if let Some(kind) = self.kind {
            classification.kind = kind.into();
        }
        if let Some(title) = &self.title {
            classification.title.clone_from(title);
        }
        if let Some(year) = self.year {
            classification.year = Some(year);
        }
        if let Some(season) = self.season {
            classification.season = season;
        }
        classification
    }
}

#[derive(Parser)]
#[command(name = "plexmove")]
#[command(version)]
#[command(about = "Place finished downloads into a Plex movie/TV library", long_about = None)]
pub struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how a file or directory name is classified
    Detect {
        /// File name or path
        name: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Copy a finished download into the library
    Move {
        /// Downloaded file or directory
        source: PathBuf,

        /// Path to configuration file
        #[arg(short, long, value_name = "FILE", default_value_os_t = default_config_path())]
        config: PathBuf,

        #[command(flatten)]
        overrides: Overrides,

        /// Remove copied files from the source afterwards
        #[arg(long)]
        cleanup: bool,

        /// Run the copy tool through `sudo -n`
        #[arg(long)]
        sudo: bool,

        /// Dry-run mode: show destinations without copying
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a source and everything left in it
    Purge {
        path: PathBuf,

        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}
