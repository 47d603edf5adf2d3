//! Writing results: the correlation table, batch listings and tagged datasets.

use crate::dataset::Dataset;
use crate::pairwise::{PairwiseCorrelationRow, CORRELATIONS_TABLE_NAME};
use crate::statistics::RawValue;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use mvextras_cli::{CompressionFormat, FileFormat, OutputFormat};
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Scatter plot of the correlation table, as the host would be asked to draw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphRequest {
    pub dataset: String,
    pub x: String,
    pub y: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
}

impl GraphRequest {
    /// Predictor against Response, colored by correlation.
    pub fn correlation_plot() -> Self {
        Self {
            dataset: CORRELATIONS_TABLE_NAME.to_string(),
            x: "Predictor".to_string(),
            y: "Response".to_string(),
            legend: Some("correlation".to_string()),
        }
    }
}

/// A file opened for writing, optionally behind a compression encoder.
///
/// Call [`OutputWriter::finish`] once everything is written. Encoders write
/// their trailer there and any error surfaces; dropping the writer instead
/// loses those errors (and, for zstd, the trailer itself).
pub enum OutputWriter {
    Plain(BufWriter<File>),
    Gzip(flate2::write::GzEncoder<File>),
    Zstd(zstd::Encoder<'static, File>),
    Bzip2(bzip2::write::BzEncoder<File>),
    Xz(xz2::write::XzEncoder<File>),
}

impl OutputWriter {
    /// Flushes buffered data and completes the compressed stream.
    pub fn finish(self) -> Result<()> {
        match self {
            Self::Plain(mut w) => w.flush()?,
            Self::Gzip(w) => {
                w.finish()?;
            }
            Self::Zstd(w) => {
                w.finish()?;
            }
            Self::Bzip2(w) => {
                w.finish()?;
            }
            Self::Xz(w) => {
                w.finish()?;
            }
        }
        Ok(())
    }

    fn inner(&mut self) -> &mut dyn Write {
        match self {
            Self::Plain(w) => w,
            Self::Gzip(w) => w,
            Self::Zstd(w) => w,
            Self::Bzip2(w) => w,
            Self::Xz(w) => w,
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner().flush()
    }
}

/// Opens `path` for writing, wrapped in an encoder when `compression` is set.
pub fn create_writer(path: &Path, compression: Option<CompressionFormat>) -> Result<OutputWriter> {
    let file = File::create(path)?;
    Ok(match compression {
        None => OutputWriter::Plain(BufWriter::new(file)),
        Some(CompressionFormat::Gzip) => OutputWriter::Gzip(flate2::write::GzEncoder::new(
            file,
            flate2::Compression::default(),
        )),
        Some(CompressionFormat::Zstd) => OutputWriter::Zstd(zstd::Encoder::new(file, 0)?),
        Some(CompressionFormat::Bzip2) => OutputWriter::Bzip2(bzip2::write::BzEncoder::new(
            file,
            bzip2::Compression::default(),
        )),
        Some(CompressionFormat::Xz) => OutputWriter::Xz(xz2::write::XzEncoder::new(
            file, 6, // compression level
        )),
    })
}

/// Builds a DataFrame with one column per row field, in table order.
pub fn rows_to_dataframe(rows: &[PairwiseCorrelationRow]) -> Result<DataFrame> {
    fn text<F: Fn(&PairwiseCorrelationRow) -> &str>(
        rows: &[PairwiseCorrelationRow],
        name: &str,
        f: F,
    ) -> Column {
        Column::new(name.into(), rows.iter().map(f).collect::<Vec<_>>())
    }
    fn float<F: Fn(&PairwiseCorrelationRow) -> Option<f64>>(
        rows: &[PairwiseCorrelationRow],
        name: &str,
        f: F,
    ) -> Column {
        Column::new(name.into(), rows.iter().map(f).collect::<Vec<_>>())
    }
    fn count<F: Fn(&PairwiseCorrelationRow) -> usize>(
        rows: &[PairwiseCorrelationRow],
        name: &str,
        f: F,
    ) -> Column {
        Column::new(
            name.into(),
            rows.iter().map(|r| f(r) as u64).collect::<Vec<_>>(),
        )
    }

    let correlation_types: Vec<String> =
        rows.iter().map(|r| r.correlation_type.to_string()).collect();

    let df = DataFrame::new(vec![
        text(rows, "TableName", |r| r.table_name.as_str()),
        text(rows, "Predictor", |r| r.predictor.as_str()),
        text(rows, "Response", |r| r.response.as_str()),
        float(rows, "correlation", |r| r.correlation),
        Column::new("correlationType".into(), correlation_types),
        count(rows, "nNeitherMissing", |r| r.n_complete_cases),
        count(rows, "nCases", |r| r.n_cases),
        count(rows, "nBlanks1", |r| r.nx_missing),
        count(rows, "nBlanks2", |r| r.ny_missing),
        float(rows, "correlBlanks", |r| r.missingness_correlation),
        float(rows, "CI_low95", |r| r.ci_low),
        float(rows, "CI_high95", |r| r.ci_high),
        float(rows, "p_value", |r| r.p_value),
        text(rows, "date", |r| r.date.as_str()),
        text(rows, "type1", |r| r.type1.as_str()),
        text(rows, "unit1", |r| r.unit1.as_str()),
        text(rows, "type2", |r| r.type2.as_str()),
        text(rows, "unit2", |r| r.unit2.as_str()),
        text(rows, "description1", |r| r.description1.as_str()),
        text(rows, "description2", |r| r.description2.as_str()),
        text(rows, "table_order_Predictor", |r| r.table_order_predictor.as_str()),
        text(rows, "table_order_Response", |r| r.table_order_response.as_str()),
    ])?;
    Ok(df)
}

fn format_stat(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(String::new, |v| format!("{:.*}", precision, v))
}

/// Renders the main columns of the table as aligned plain text.
pub fn render_text_table(rows: &[PairwiseCorrelationRow], precision: usize) -> String {
    const HEADERS: [&str; 12] = [
        "Predictor",
        "Response",
        "correlation",
        "type",
        "n",
        "nCases",
        "nBlanks1",
        "nBlanks2",
        "correlBlanks",
        "CI_low95",
        "CI_high95",
        "p_value",
    ];
    // Text columns are left-aligned, numbers right-aligned
    const LEFT_ALIGNED: usize = 2;

    let cells: Vec<[String; 12]> = rows
        .iter()
        .map(|r| {
            [
                r.predictor.clone(),
                r.response.clone(),
                format_stat(r.correlation, precision),
                r.correlation_type.to_string(),
                r.n_complete_cases.to_string(),
                r.n_cases.to_string(),
                r.nx_missing.to_string(),
                r.ny_missing.to_string(),
                format_stat(r.missingness_correlation, precision),
                format_stat(r.ci_low, precision),
                format_stat(r.ci_high, precision),
                format_stat(r.p_value, precision),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let format_line = |fields: &[&str]| -> String {
        let parts: Vec<String> = fields
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (field, &w))| {
                if i < LEFT_ALIGNED {
                    format!("{:<w$}", field, w = w)
                } else {
                    format!("{:>w$}", field, w = w)
                }
            })
            .collect();
        parts.join("  ").trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&format_line(&HEADERS));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in &cells {
        let fields: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&format_line(&fields));
        out.push('\n');
    }
    out
}

/// Writes the correlation table in `format`.
pub fn write_rows<W: Write>(
    rows: &[PairwiseCorrelationRow],
    format: OutputFormat,
    precision: usize,
    mut writer: W,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writer.write_all(render_text_table(rows, precision).as_bytes())?;
        }
        OutputFormat::Csv => {
            let mut df = rows_to_dataframe(rows)?;
            CsvWriter::new(&mut writer)
                .include_header(true)
                .finish(&mut df)?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes a dataset snapshot as JSON.
pub fn write_snapshot(
    dataset: &Dataset,
    path: &Path,
    compression: Option<CompressionFormat>,
) -> Result<()> {
    let mut writer = create_writer(path, compression)?;
    serde_json::to_writer_pretty(&mut writer, dataset)?;
    writer.write_all(b"\n")?;
    writer.finish()
}

/// Writes a DataFrame in the given table format.
pub fn write_frame(
    df: &mut DataFrame,
    path: &Path,
    format: FileFormat,
    compression: Option<CompressionFormat>,
) -> Result<()> {
    match format {
        FileFormat::Csv | FileFormat::Tsv | FileFormat::Psv => {
            let mut writer = create_writer(path, compression)?;
            CsvWriter::new(&mut writer)
                .with_separator(format.default_delimiter().unwrap_or(b','))
                .include_header(true)
                .finish(df)?;
            writer.finish()?;
        }
        FileFormat::Json => {
            let mut writer = create_writer(path, compression)?;
            JsonWriter::new(&mut writer)
                .with_json_format(JsonFormat::Json)
                .finish(df)?;
            writer.finish()?;
        }
        FileFormat::Jsonl => {
            let mut writer = create_writer(path, compression)?;
            JsonWriter::new(&mut writer)
                .with_json_format(JsonFormat::JsonLines)
                .finish(df)?;
            writer.finish()?;
        }
        FileFormat::Parquet => {
            let mut writer = BufWriter::new(File::create(path)?);
            ParquetWriter::new(&mut writer).finish(df)?;
        }
        FileFormat::Arrow => {
            let mut writer = BufWriter::new(File::create(path)?);
            IpcWriter::new(&mut writer).finish(df)?;
        }
        FileFormat::Snapshot => {
            return Err(eyre!(
                "Cannot write a table as a snapshot; write the dataset instead"
            ))
        }
    }
    Ok(())
}

/// Sets `attribute` in `df` to the dataset's tag values, replacing any column of that name.
///
/// Rows and cases are matched by position.
pub fn set_tag_column(df: &mut DataFrame, dataset: &Dataset, attribute: &str) -> Result<()> {
    if df.height() != dataset.cases.len() {
        return Err(eyre!(
            "Dataset has {} cases but the table has {} rows",
            dataset.cases.len(),
            df.height()
        ));
    }
    let values: Vec<Option<String>> = dataset
        .cases
        .iter()
        .map(|c| match c.value(attribute) {
            RawValue::Null => None,
            v => Some(v.to_string()),
        })
        .collect();
    df.with_column(Column::new(attribute.into(), values))?;
    Ok(())
}
