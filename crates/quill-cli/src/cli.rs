use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Keep a tagged journal from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to the database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Quick capture: quill "my entry here"
    #[arg(trailing_var_arg = true)]
    pub entry: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new entry
    #[command(alias = "new")]
    Add {
        /// Entry content
        content: Vec<String>,
        /// Tag to attach (repeatable)
        #[arg(short = 't', long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// List entries, newest first
    List {
        /// Only entries carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Show the oldest entries first
        #[arg(long)]
        oldest_first: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing entry
    Edit {
        /// Entry ID or unique ID prefix
        id: String,
        /// New content; opens $EDITOR when omitted
        content: Vec<String>,
        /// Replace the tags (repeatable); keeps current tags when omitted
        #[arg(short = 't', long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Remove every tag
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },
    /// Delete an entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Count entries per time period
    Archive {
        /// Period to group by
        #[arg(long, value_enum, default_value_t = Granularity::Day)]
        by: Granularity,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count entries per tag
    Tags {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print changes as they happen until interrupted
    Watch {
        /// Print every past change first
        #[arg(long)]
        replay: bool,
    },
    /// Export every entry
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for quill_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Granularity {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl Granularity {
    /// Number of archive key parts this period groups on
    pub const fn group_level(self) -> usize {
        match self {
            Self::Year => 1,
            Self::Month => 2,
            Self::Day => 3,
            Self::Hour => 4,
            Self::Minute => 5,
            Self::Second => 6,
        }
    }
}
