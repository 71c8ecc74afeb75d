use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// feedsnap - change-driven snapshots of spreadsheet-published entity lists
#[derive(Parser, Debug)]
#[command(name = "feedsnap", version, about = "Keep local snapshots of entity lists in sync with their feeds")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Directory overrides shared by all commands (fall back to FEEDSNAP_* env).
#[derive(Args, Debug, Clone, Default)]
pub struct DirArgs {
    /// Snapshot directory (env FEEDSNAP_DATA_DIR, default "data")
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Metadata log directory (env FEEDSNAP_META_DIR, default "metadata")
    #[arg(long)]
    pub meta_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Fetch every configured entity type (<ENTITY>_URL) and update changed snapshots
    Run {
        #[command(flatten)]
        dirs: DirArgs,
        /// Restrict to these entity types (repeatable). Default: FEEDSNAP_ENTITIES
        #[arg(long = "entity")]
        entities: Vec<String>,
        /// Change detection: "ordered" (row order matters) or "set"
        #[arg(long)]
        compare: Option<String>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile one entity type from a local .xlsx workbook
    Ingest {
        #[command(flatten)]
        dirs: DirArgs,
        #[arg(long)]
        entity: String,
        /// Workbook to read (same layout as the remote feed)
        #[arg(long)]
        xlsx: PathBuf,
        #[arg(long)]
        compare: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show stored snapshots and their latest update dates
    Status {
        #[command(flatten)]
        dirs: DirArgs,
        #[arg(long)]
        json: bool,
    },
}
