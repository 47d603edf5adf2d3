//! Loading datasets from files.
//!
//! Host snapshots (`*.snapshot.json`) deserialize straight into a
//! [`Dataset`]. Every other format is read with polars and turned into a
//! one-collection dataset named after the file.

use crate::config::AppConfig;
use crate::dataset::{Attribute, Case, Collection, Dataset, DatasetSchema};
use crate::error_display::user_message_from_io;
use crate::statistics::RawValue;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use mvextras_cli::{CompressionFormat, FileFormat, InputArgs};
use polars::io::csv::read::NullValues;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tracing::debug;

/// How a dataset file is read. CLI values win over config values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    pub format: Option<FileFormat>,
    pub compression: Option<CompressionFormat>,
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub skip_rows: Option<usize>,
    pub null_values: Option<Vec<String>>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_compression(mut self, compression: CompressionFormat) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_null_values(mut self, null_values: Vec<String>) -> Self {
        self.null_values = Some(null_values);
        self
    }

    /// Create LoadOptions from CLI args and config, with CLI args taking precedence
    pub fn from_args_and_config(args: &InputArgs, config: &AppConfig) -> Self {
        let mut opts = LoadOptions::new();

        opts.format = args.format;
        opts.compression = args.compression;
        opts.delimiter = args.delimiter.or(config.file_loading.delimiter);
        opts.skip_rows = args.skip_rows.or(config.file_loading.skip_rows);

        // CLI no_header flag overrides config
        opts.has_header = if let Some(no_header) = args.no_header {
            Some(!no_header)
        } else {
            config.file_loading.has_header
        };

        // Null values: config list with CLI list appended
        let config_nulls = config.file_loading.null_values.as_deref().unwrap_or(&[]);
        if !config_nulls.is_empty() || !args.null_value.is_empty() {
            opts.null_values = Some(
                config_nulls
                    .iter()
                    .chain(args.null_value.iter())
                    .cloned()
                    .collect(),
            );
        }

        opts
    }

    fn resolve_compression(&self, path: &Path) -> Option<CompressionFormat> {
        self.compression
            .or_else(|| CompressionFormat::from_extension(path))
    }

    fn resolve_format(&self, path: &Path) -> Result<FileFormat> {
        self.format
            .or_else(|| FileFormat::from_path(path))
            .ok_or_else(|| {
                eyre!(
                    "Could not determine the format of {}. Use --format to specify it.",
                    path.display()
                )
            })
    }
}

/// A dataset plus the frame it was read from, when it came from a table file.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub frame: Option<DataFrame>,
    pub format: FileFormat,
}

/// Reads the whole file, decompressing it in memory when `compression` is set.
pub fn read_bytes(path: &Path, compression: Option<CompressionFormat>) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| {
        eyre!(
            "Could not open {}: {}",
            path.display(),
            user_message_from_io(&e, None)
        )
    })?;
    let mut reader: Box<dyn Read> = match compression {
        None => Box::new(BufReader::new(file)),
        Some(CompressionFormat::Gzip) => {
            Box::new(flate2::read::GzDecoder::new(BufReader::new(file)))
        }
        Some(CompressionFormat::Zstd) => Box::new(zstd::Decoder::new(BufReader::new(file))?),
        Some(CompressionFormat::Bzip2) => {
            Box::new(bzip2::read::BzDecoder::new(BufReader::new(file)))
        }
        Some(CompressionFormat::Xz) => Box::new(xz2::read::XzDecoder::new(BufReader::new(file))),
    };
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Dataset name for a file: its name without compression or format extensions.
pub fn dataset_name_from_path(path: &Path) -> String {
    let mut stem_path = path.to_path_buf();
    if CompressionFormat::from_extension(path).is_some() {
        stem_path = path.with_extension("");
    }
    let stem = stem_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    stem.strip_suffix(".snapshot").unwrap_or(stem).to_string()
}

fn build_null_values(values: &[String]) -> Option<NullValues> {
    if values.is_empty() {
        return None;
    }
    let vals: Vec<PlSmallStr> = values
        .iter()
        .map(|s| PlSmallStr::from(s.as_str()))
        .collect();
    Some(if vals.len() == 1 {
        NullValues::AllColumnsSingle(vals[0].clone())
    } else {
        NullValues::AllColumns(vals)
    })
}

fn read_delimited(bytes: Vec<u8>, delimiter: u8, options: &LoadOptions) -> Result<DataFrame> {
    let mut read_options = CsvReadOptions::default();
    if let Some(skip_rows) = options.skip_rows {
        read_options.skip_rows = skip_rows;
    }
    if let Some(has_header) = options.has_header {
        read_options.has_header = has_header;
    }
    let nv = options.null_values.as_deref().and_then(build_null_values);
    read_options = read_options.map_parse_options(|opts| {
        let o = opts.with_separator(delimiter).with_try_parse_dates(true);
        match &nv {
            Some(n) => o.with_null_values(Some(n.clone())),
            None => o,
        }
    });
    let df = CsvReader::new(Cursor::new(bytes))
        .with_options(read_options)
        .finish()?;
    Ok(df)
}

/// Reads a table file into a DataFrame.
pub fn read_frame(path: &Path, format: FileFormat, options: &LoadOptions) -> Result<DataFrame> {
    let bytes = read_bytes(path, options.resolve_compression(path))?;
    let df = match format {
        FileFormat::Csv | FileFormat::Tsv | FileFormat::Psv => {
            let delimiter = options
                .delimiter
                .or_else(|| format.default_delimiter())
                .unwrap_or(b',');
            read_delimited(bytes, delimiter, options)?
        }
        FileFormat::Json => JsonReader::new(Cursor::new(bytes))
            .with_json_format(JsonFormat::Json)
            .finish()?,
        FileFormat::Jsonl => JsonReader::new(Cursor::new(bytes))
            .with_json_format(JsonFormat::JsonLines)
            .finish()?,
        FileFormat::Parquet => ParquetReader::new(Cursor::new(bytes)).finish()?,
        FileFormat::Arrow => IpcReader::new(Cursor::new(bytes)).finish()?,
        FileFormat::Snapshot => {
            return Err(eyre!(
                "{} is a dataset snapshot, not a table file",
                path.display()
            ))
        }
    };
    Ok(df)
}

/// Reads a host snapshot document.
pub fn load_snapshot(path: &Path, compression: Option<CompressionFormat>) -> Result<Dataset> {
    let bytes = read_bytes(path, compression)?;
    let dataset: Dataset = serde_json::from_slice(&bytes)?;
    Ok(dataset)
}

/// Declared attribute type for a polars column type.
pub fn declared_type_for(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Date | DataType::Datetime(_, _) => "date",
        DataType::Boolean => "checkbox",
        d if d.is_numeric() => "numeric",
        _ => "categorical",
    }
}

fn column_values(column: &Column) -> Result<Vec<RawValue>> {
    let series = column.as_materialized_series();
    let dtype = series.dtype();
    let values = if dtype.is_numeric() || dtype.is_temporal() {
        // Dates and datetimes come through as their physical integers
        let physical = series.to_physical_repr();
        let floats = physical.cast(&DataType::Float64)?;
        floats.f64()?.into_iter().map(RawValue::from).collect()
    } else if matches!(dtype, DataType::Boolean) {
        series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(RawValue::Null, RawValue::Bool))
            .collect()
    } else {
        let strings = series.cast(&DataType::String).map_err(|e| {
            eyre!(
                "Column '{}' of type {} cannot be read as text: {}",
                series.name(),
                dtype,
                e
            )
        })?;
        strings
            .str()?
            .into_iter()
            .map(|v| v.map_or(RawValue::Null, |s| RawValue::Text(s.to_string())))
            .collect()
    };
    Ok(values)
}

/// Turns a DataFrame into a one-collection dataset.
///
/// Case ids are 1-based row numbers. Null cells are left out of the case.
pub fn dataframe_to_dataset(df: &DataFrame, name: &str) -> Result<Dataset> {
    let mut cases: Vec<Case> = (1..=df.height()).map(|i| Case::new(i.to_string())).collect();
    let mut attrs = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let attr_name = column.name().to_string();
        for (case, value) in cases.iter_mut().zip(column_values(column)?) {
            if value != RawValue::Null {
                case.values.insert(attr_name.clone(), value);
            }
        }
        attrs.push(Attribute::new(attr_name, declared_type_for(column.dtype())));
    }

    let schema = DatasetSchema::new(name, vec![Collection::new(name, attrs)]);
    Ok(Dataset::new(schema, cases))
}

/// Loads a dataset from any supported file.
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<LoadedDataset> {
    let format = options.resolve_format(path)?;
    let loaded = if format == FileFormat::Snapshot {
        let dataset = load_snapshot(path, options.resolve_compression(path))?;
        LoadedDataset {
            dataset,
            frame: None,
            format,
        }
    } else {
        let frame = read_frame(path, format, options)?;
        let dataset = dataframe_to_dataset(&frame, &dataset_name_from_path(path))?;
        LoadedDataset {
            dataset,
            frame: Some(frame),
            format,
        }
    };

    debug!(
        path = %path.display(),
        format = ?format,
        attributes = loaded.dataset.schema.attribute_count(),
        cases = loaded.dataset.cases.len(),
        "loaded dataset"
    );
    Ok(loaded)
}
