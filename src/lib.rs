use chrono::Utc;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

pub mod batch;
pub mod config;
pub mod dataset;
pub mod error_display;
pub mod export;
pub mod pairwise;
pub mod source;
pub mod statistics;
pub mod tagging;

pub use batch::{
    group_attributes, parse_batch_tag, set_attribute_batch, set_batch_hidden, set_hidden, BatchPlan,
    BatchingMode,
};
pub use config::{AppConfig, ConfigManager};
pub use dataset::{Attribute, Case, Collection, DataSource, Dataset, DatasetSchema};
pub use mvextras_cli as cli;
pub use mvextras_cli::{Args, Command, CompressionFormat, FileFormat, OutputFormat};
pub use pairwise::{build_pairwise_table, PairScope, PairwiseCorrelationRow, PairwiseOptions};
pub use source::{load_dataset, LoadOptions, LoadedDataset};
pub use statistics::{
    compute_correlation, compute_correlation_ci, ConfidenceInterval, CorrelationResult,
    Observation,
};

use cli::{BatchesArgs, CorrelateArgs, TagArgs};
use config::TaggingConfig;
use export::GraphRequest;
use tagging::TagUpdate;

/// Application name used for the config directory
pub const APP_NAME: &str = "mvextras";

/// Resolve the pairwise options for `correlate`: config values, then CLI flags.
pub fn correlate_options(args: &CorrelateArgs, config: &AppConfig) -> Result<PairwiseOptions> {
    let mut options = config.pairwise_options();

    if let Some(z) = args.z_critical {
        options.z_critical = z;
    }
    if let Some(level) = args.confidence {
        options.z_critical = statistics::critical_value_for_confidence(level)
            .ok_or_else(|| eyre!("--confidence must be between 0 and 1, got {}", level))?;
    }
    if let Some(scope) = args.scope {
        options.scope = scope.into();
    }

    if !(options.z_critical.is_finite() && options.z_critical > 0.0) {
        return Err(eyre!(
            "--z-critical must be a positive number, got {}",
            options.z_critical
        ));
    }
    Ok(options)
}

/// Build the PairwiseCorrelations table and write it to `--output` or `out`.
pub fn run_correlate<W: Write>(args: &CorrelateArgs, config: &AppConfig, mut out: W) -> Result<()> {
    let load_options = LoadOptions::from_args_and_config(&args.input, config);
    let loaded = load_dataset(&args.input.path, &load_options)?;
    let options = correlate_options(args, config)?;
    debug!(?options, "correlating");

    let rows = build_pairwise_table(&loaded.dataset, &options, Utc::now());
    let format = match args.output_format {
        Some(format) => format,
        None => config.output.output_format()?,
    };
    let precision = config.output.precision;

    match &args.output {
        Some(path) => {
            let compression = args
                .output_compression
                .or_else(|| CompressionFormat::from_extension(path));
            let mut writer = export::create_writer(path, compression)?;
            export::write_rows(&rows, format, precision, &mut writer)?;
            writer.finish()?;
            info!(path = %path.display(), rows = rows.len(), "wrote correlation table");
        }
        None => export::write_rows(&rows, format, precision, &mut out)?,
    }

    if args.graph_request {
        serde_json::to_writer_pretty(&mut out, &GraphRequest::correlation_plot())?;
        writeln!(out)?;
    }
    Ok(())
}

/// Apply the `batches` edit flags to a schema. Batch moves come first, then
/// whole-batch visibility (using the moved batches), then single attributes.
pub fn edit_batches(
    schema: &DatasetSchema,
    args: &BatchesArgs,
    mode: BatchingMode,
    no_batch_label: &str,
) -> Result<DatasetSchema> {
    let mut schema = schema.clone();

    for assignment in &args.set_batch {
        let (attribute, batch_name) = assignment
            .split_once('=')
            .ok_or_else(|| eyre!("--set-batch expects ATTR=BATCH, got '{}'", assignment))?;
        schema = batch::set_attribute_batch(&schema, attribute, batch_name)?;
    }
    for name in &args.hide_batch {
        schema = batch::set_batch_hidden(&schema, name, mode, no_batch_label, true)?;
    }
    for name in &args.show_batch {
        schema = batch::set_batch_hidden(&schema, name, mode, no_batch_label, false)?;
    }
    schema = batch::set_hidden(&schema, &args.hide, true)?;
    schema = batch::set_hidden(&schema, &args.show, false)?;
    Ok(schema)
}

/// List the attribute batches of a dataset, applying any edit flags first.
///
/// Edits are stored in the attribute records, so an edited dataset is always
/// written to `--output` as a JSON snapshot.
pub fn run_batches<W: Write>(args: &BatchesArgs, config: &AppConfig, mut out: W) -> Result<()> {
    let load_options = LoadOptions::from_args_and_config(&args.input, config);
    let mut loaded = load_dataset(&args.input.path, &load_options)?;

    let mode = args.by.map(BatchingMode::from).unwrap_or(config.batching.mode);
    let no_batch_label = args
        .no_batch_label
        .as_deref()
        .unwrap_or(&config.batching.no_batch_label);
    debug!(mode = mode.as_str(), no_batch_label, "grouping attributes");

    if args.has_edits() {
        let path = args
            .output
            .as_deref()
            .ok_or_else(|| eyre!("--output is required to save batch or visibility changes"))?;
        match FileFormat::from_path(path) {
            Some(FileFormat::Snapshot | FileFormat::Json) => {}
            _ => {
                return Err(eyre!(
                    "Batch and visibility changes can only be saved as a JSON snapshot, not '{}'",
                    path.display()
                ))
            }
        }
        loaded.dataset.schema = edit_batches(&loaded.dataset.schema, args, mode, no_batch_label)?;
        export::write_snapshot(&loaded.dataset, path, CompressionFormat::from_extension(path))?;
        info!(path = %path.display(), "wrote edited dataset");
    } else if args.output.is_some() {
        warn!("--output ignored: no batch or visibility changes requested");
    }

    let plan = group_attributes(&loaded.dataset.schema, mode, no_batch_label);
    for batch in &plan.batches {
        writeln!(out, "{} ({})", batch.name, batch.attrs.len())?;
        for attr in plan.attributes.iter().filter(|a| a.batch == batch.name) {
            let name = &attr.attribute.name;
            let hidden = if attr.attribute.hidden { " [hidden]" } else { "" };
            match attr.attribute.description.as_str() {
                "" => writeln!(out, "  {}{}", name, hidden)?,
                description => writeln!(out, "  {}: {}{}", name, description, hidden)?,
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Work out the tag values the `tag` flags ask for.
///
/// `--clear` blanks the selection (or everything when nothing is selected).
/// `--random` splits every case into two groups. Otherwise the selection
/// gets `--label`, and with `--binary` (or `--other-label`) every other case
/// gets the other label.
pub fn plan_tags<R: rand::Rng + ?Sized>(
    args: &TagArgs,
    tagging: &TaggingConfig,
    all: &[String],
    rng: &mut R,
) -> Result<Vec<TagUpdate>> {
    if args.clear {
        return Ok(if args.select.is_empty() {
            tagging::clear_all(all)
        } else {
            tagging::clear_selected(&args.select)
        });
    }

    if let Some(text) = &args.random {
        let proportion = tagging::parse_proportion(text).ok_or_else(|| {
            eyre!(
                "Could not read '{}' as a proportion. Use a form like 25%, 1/4, or 0.25.",
                text
            )
        })?;
        if !(0.0..=1.0).contains(&proportion.value) {
            warn!(proportion = %proportion.display, "Proportion is outside 0..1");
        }
        let a = args.label.as_deref().unwrap_or(&tagging.group_a);
        let b = args.other_label.as_deref().unwrap_or(&tagging.group_b);
        return Ok(tagging::random(all, proportion.value, a, b, rng));
    }

    if args.select.is_empty() {
        return Err(eyre!(
            "No cases selected. Use --select, --random, or --clear."
        ));
    }
    let label = args.label.as_deref().unwrap_or(&tagging.selected);
    if args.binary || args.other_label.is_some() {
        let other = args.other_label.as_deref().unwrap_or(&tagging.not_selected);
        return Ok(tagging::binary(all, &args.select, label, other));
    }
    Ok(tagging::simple(&args.select, label))
}

/// Write a tagged dataset in the format implied by `path`.
///
/// Snapshots stay snapshots. Table files keep their columns with the tag
/// column set from the dataset.
pub fn write_tagged(loaded: &LoadedDataset, attribute: &str, path: &Path) -> Result<()> {
    let compression = CompressionFormat::from_extension(path);
    let format = FileFormat::from_path(path).unwrap_or(loaded.format);

    match (&loaded.frame, format) {
        (None, FileFormat::Snapshot | FileFormat::Json) | (Some(_), FileFormat::Snapshot) => {
            export::write_snapshot(&loaded.dataset, path, compression)
        }
        (None, format) => Err(eyre!(
            "A snapshot can only be written back as JSON, not {:?}",
            format
        )),
        (Some(frame), format) => {
            let mut frame = frame.clone();
            export::set_tag_column(&mut frame, &loaded.dataset, attribute)?;
            export::write_frame(&mut frame, path, format, compression)
        }
    }
}

/// Tag cases and write the tagged dataset to `--output`.
pub fn run_tag(args: &TagArgs, config: &AppConfig) -> Result<()> {
    let load_options = LoadOptions::from_args_and_config(&args.input, config);
    let mut loaded = load_dataset(&args.input.path, &load_options)?;
    let attribute = args
        .attribute
        .clone()
        .unwrap_or_else(|| config.tagging.attribute_name.clone());

    let all = loaded.dataset.case_ids();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let updates = plan_tags(args, &config.tagging, &all, &mut rng)?;
    let applied = tagging::apply_tag_updates(&mut loaded.dataset, &attribute, &updates)?;

    write_tagged(&loaded, &attribute, &args.output)?;
    info!(
        attribute = %attribute,
        cases = applied,
        path = %args.output.display(),
        "wrote tagged dataset"
    );
    Ok(())
}
