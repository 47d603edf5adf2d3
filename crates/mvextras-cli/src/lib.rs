//! Shared CLI definitions for mvextras.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// File format for data files (used to bypass extension-based detection).
/// When `--format` is not specified, format is auto-detected from the file extension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Parquet columnar format
    Parquet,
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Pipe-separated values
    Psv,
    /// JSON array format
    Json,
    /// JSON Lines / NDJSON (one JSON object per line)
    Jsonl,
    /// Arrow IPC / Feather
    Arrow,
    /// Host snapshot: collections, attributes, and cases in one JSON document
    Snapshot,
}

impl FileFormat {
    /// Detect file format from path. Returns None when extension is missing or unknown.
    ///
    /// A name ending in `.snapshot.json` (optionally followed by a compression
    /// extension) is a host snapshot rather than a plain JSON table.
    pub fn from_path(path: &Path) -> Option<Self> {
        let mut stem_path = path.to_path_buf();
        if CompressionFormat::from_extension(path).is_some() {
            stem_path = path.with_extension("");
        }
        let name = stem_path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".snapshot.json") {
            return Some(Self::Snapshot);
        }
        stem_path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse format from extension string (e.g. "parquet", "csv").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "parquet" => Some(Self::Parquet),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "psv" => Some(Self::Psv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            "arrow" | "ipc" | "feather" => Some(Self::Arrow),
            _ => None,
        }
    }

    /// Field separator for the delimited text formats.
    pub fn default_delimiter(&self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tsv => Some(b'\t'),
            Self::Psv => Some(b'|'),
            _ => None,
        }
    }
}

/// Compression format for data files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz) - Most common, good balance of speed and compression
    Gzip,
    /// Zstandard compression (.zst) - Modern, fast compression with good ratios
    Zstd,
    /// Bzip2 compression (.bz2) - Good compression ratio, slower than gzip
    Bzip2,
    /// XZ compression (.xz) - Excellent compression ratio, slower than bzip2
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Get file extension for this compression format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Zstd => "zst",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
        }
    }
}

/// How the correlation table is written
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned plain-text table
    Text,
    /// Comma-separated values with a header row
    Csv,
    /// JSON array of row objects
    Json,
}

/// How attributes are grouped into batches
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum BatchBy {
    /// Group by the `{name}` prefix in each attribute description
    Batch,
    /// Group by the collection (hierarchy level) holding each attribute
    Level,
}

/// Which attribute pairs are correlated
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PairScopeArg {
    /// Only pairs of attributes in the same collection
    Collection,
    /// Every ordered pair of attributes in the dataset
    All,
}

/// Command-line arguments for mvextras
#[derive(Clone, Parser, Debug)]
#[command(
    name = "mvextras",
    version,
    about = "Batch grouping, tagging, and pairwise correlation tables",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long = "debug", global = true, action)]
    pub debug: bool,

    /// Write a default configuration file to the user config directory and exit
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Overwrite an existing configuration file (with --generate-config)
    #[arg(long = "force", action, requires = "generate_config")]
    pub force: bool,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Command {
    /// Build the PairwiseCorrelations table for a dataset
    Correlate(CorrelateArgs),
    /// List attribute batches parsed from attribute descriptions
    Batches(BatchesArgs),
    /// Assign tag values to the dataset's cases and write the tagged dataset
    Tag(TagArgs),
}

/// Options shared by every subcommand that reads a dataset
#[derive(Clone, ClapArgs, Debug)]
pub struct InputArgs {
    /// Path to the data file to open
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Force file format. By default format is auto-detected from the file extension.
    #[arg(long = "format", value_enum)]
    pub format: Option<FileFormat>,

    /// Specify the compression format explicitly (gzip, zstd, bzip2, xz).
    /// If not specified, compression is auto-detected from file extension.
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Specify the delimiter to use when reading a delimited text file
    #[arg(long = "delimiter")]
    pub delimiter: Option<u8>,

    /// Specify that the file has no header
    #[arg(long = "no-header")]
    pub no_header: Option<bool>,

    /// Skip this many rows when reading a file
    #[arg(long = "skip-rows")]
    pub skip_rows: Option<usize>,

    /// Treat this value as null when reading delimited text. Use once per value.
    #[arg(long = "null-value", value_name = "VAL")]
    pub null_value: Vec<String>,
}

#[derive(Clone, ClapArgs, Debug)]
pub struct CorrelateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output format for the correlation table
    #[arg(long = "output-format", short = 'f', value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Write the table to this file instead of stdout
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Compress the output file (requires --output)
    #[arg(long = "output-compression", value_enum, requires = "output")]
    pub output_compression: Option<CompressionFormat>,

    /// Critical value of the standard normal used for confidence bounds (default 1.96)
    #[arg(long = "z-critical", value_name = "Z", conflicts_with = "confidence")]
    pub z_critical: Option<f64>,

    /// Two-sided confidence level for the bounds, e.g. 0.9 or 0.99
    #[arg(long = "confidence", value_name = "LEVEL")]
    pub confidence: Option<f64>,

    /// Which attribute pairs to correlate
    #[arg(long = "scope", value_enum)]
    pub scope: Option<PairScopeArg>,

    /// Also print the scatter plot request for the correlation table as JSON
    #[arg(long = "graph-request", action)]
    pub graph_request: bool,
}

#[derive(Clone, ClapArgs, Debug)]
pub struct BatchesArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Grouping strategy
    #[arg(long = "by", value_enum)]
    pub by: Option<BatchBy>,

    /// Batch name for attributes without a `{name}` prefix
    #[arg(long = "no-batch-label", value_name = "LABEL")]
    pub no_batch_label: Option<String>,

    /// Move an attribute into a batch. An empty BATCH takes it out of its batch.
    #[arg(long = "set-batch", value_name = "ATTR=BATCH")]
    pub set_batch: Vec<String>,

    /// Hide an attribute. Use once per attribute.
    #[arg(long = "hide", value_name = "ATTR")]
    pub hide: Vec<String>,

    /// Show a hidden attribute. Use once per attribute.
    #[arg(long = "show", value_name = "ATTR")]
    pub show: Vec<String>,

    /// Hide every attribute in a batch
    #[arg(long = "hide-batch", value_name = "BATCH")]
    pub hide_batch: Vec<String>,

    /// Show every attribute in a batch
    #[arg(long = "show-batch", value_name = "BATCH")]
    pub show_batch: Vec<String>,

    /// Where to write the edited dataset as a JSON snapshot. Required with any edit flag.
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl BatchesArgs {
    /// True when any flag asks to change batches or visibility.
    pub fn has_edits(&self) -> bool {
        !(self.set_batch.is_empty()
            && self.hide.is_empty()
            && self.show.is_empty()
            && self.hide_batch.is_empty()
            && self.show_batch.is_empty())
    }
}

#[derive(Clone, ClapArgs, Debug)]
pub struct TagArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Where to write the tagged dataset (CSV, or JSON when the input is a snapshot)
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: PathBuf,

    /// Name of the tag attribute (default from config, normally "Tag")
    #[arg(long = "attribute", value_name = "NAME")]
    pub attribute: Option<String>,

    /// Case ids to treat as selected. Use once per id.
    #[arg(long = "select", value_name = "ID")]
    pub select: Vec<String>,

    /// Label for the selected cases, or for group A with --random
    #[arg(long = "label", value_name = "LABEL", conflicts_with = "clear")]
    pub label: Option<String>,

    /// Label for the other cases: unselected cases (binary tagging) or group B with --random
    #[arg(long = "other-label", value_name = "LABEL", conflicts_with = "clear")]
    pub other_label: Option<String>,

    /// Also tag every unselected case (default label from config, normally "not selected")
    #[arg(long = "binary", action, conflicts_with_all = ["clear", "random"])]
    pub binary: bool,

    /// Randomly tag this share of cases with the group A label: 25%, 1/4, or 0.25
    #[arg(long = "random", value_name = "PROPORTION", conflicts_with = "clear")]
    pub random: Option<String>,

    /// Seed for random tagging
    #[arg(long = "seed", value_name = "N", requires = "random")]
    pub seed: Option<u64>,

    /// Blank the tag of the selected cases, or of every case when nothing is selected
    #[arg(long = "clear", action)]
    pub clear: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn push_options_table(out: &mut String, cmd: &clap::Command) {
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; one table for the global options and one
/// per subcommand.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Global options\n\n");
    push_options_table(&mut out, &cmd);

    for sub in cmd.get_subcommands() {
        if sub.get_name() == "help" {
            continue;
        }
        out.push_str(&format!("\n## `{}`\n\n", sub.get_name()));
        if let Some(about) = sub.get_about() {
            out.push_str(&format!("{about}\n\n"));
        }
        push_options_table(&mut out, sub);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_detection() {
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.csv.gz")),
            Some(CompressionFormat::Gzip)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.csv.zst")),
            Some(CompressionFormat::Zstd)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.csv.bz2")),
            Some(CompressionFormat::Bzip2)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.csv.xz")),
            Some(CompressionFormat::Xz)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("file.csv")),
            None
        );
        assert_eq!(CompressionFormat::from_extension(Path::new("file")), None);
    }

    #[test]
    fn test_file_format_from_path() {
        assert_eq!(
            FileFormat::from_path(Path::new("data.parquet")),
            Some(FileFormat::Parquet)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("data.csv")),
            Some(FileFormat::Csv)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("data.csv.gz")),
            Some(FileFormat::Csv)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("data.ndjson")),
            Some(FileFormat::Jsonl)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("mammals.snapshot.json")),
            Some(FileFormat::Snapshot)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("mammals.snapshot.json.zst")),
            Some(FileFormat::Snapshot)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("mammals.json")),
            Some(FileFormat::Json)
        );
        assert_eq!(FileFormat::from_path(Path::new("data")), None);
    }

    #[test]
    fn test_default_delimiters() {
        assert_eq!(FileFormat::Csv.default_delimiter(), Some(b','));
        assert_eq!(FileFormat::Tsv.default_delimiter(), Some(b'\t'));
        assert_eq!(FileFormat::Psv.default_delimiter(), Some(b'|'));
        assert_eq!(FileFormat::Parquet.default_delimiter(), None);
    }

    #[test]
    fn test_parse_correlate_args() {
        let args = Args::parse_from([
            "mvextras",
            "correlate",
            "data.csv",
            "--output-format",
            "json",
            "--confidence",
            "0.9",
        ]);
        match args.command {
            Some(Command::Correlate(c)) => {
                assert_eq!(c.input.path, PathBuf::from("data.csv"));
                assert_eq!(c.output_format, Some(OutputFormat::Json));
                assert_eq!(c.confidence, Some(0.9));
                assert!(c.z_critical.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_z_critical_conflicts_with_confidence() {
        let result = Args::try_parse_from([
            "mvextras",
            "correlate",
            "data.csv",
            "--z-critical",
            "2.0",
            "--confidence",
            "0.9",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_generate_config_without_command() {
        let args = Args::parse_from(["mvextras", "--generate-config", "--force"]);
        assert!(args.generate_config);
        assert!(args.force);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_tag_flags() {
        let args = Args::parse_from([
            "mvextras", "tag", "data.csv", "-o", "out.csv", "--select", "1", "--select", "3",
            "--binary",
        ]);
        match args.command {
            Some(Command::Tag(t)) => {
                assert_eq!(t.select, vec!["1".to_string(), "3".to_string()]);
                assert!(t.binary);
                assert!(!t.clear);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let result = Args::try_parse_from([
            "mvextras", "tag", "data.csv", "-o", "out.csv", "--binary", "--random", "25%",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_batches_edit_flags() {
        let args = Args::parse_from([
            "mvextras", "batches", "d.json", "--set-batch", "Mass=body", "--hide", "Speed",
            "--hide-batch", "food", "-o", "out.json",
        ]);
        match args.command {
            Some(Command::Batches(b)) => {
                assert_eq!(b.set_batch, vec!["Mass=body".to_string()]);
                assert_eq!(b.hide, vec!["Speed".to_string()]);
                assert_eq!(b.hide_batch, vec!["food".to_string()]);
                assert!(b.show.is_empty());
                assert_eq!(b.output, Some(PathBuf::from("out.json")));
                assert!(b.has_edits());
            }
            other => panic!("unexpected command: {:?}", other),
        }

        match Args::parse_from(["mvextras", "batches", "d.json"]).command {
            Some(Command::Batches(b)) => assert!(!b.has_edits()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_render_options_markdown_lists_subcommands() {
        let md = render_options_markdown();
        assert!(md.contains("## `correlate`"));
        assert!(md.contains("## `batches`"));
        assert!(md.contains("## `tag`"));
        assert!(md.contains("--output-format"));
    }
}
