//! The PairwiseCorrelations table: one row per ordered attribute pair.

use crate::dataset::{Attribute, DataSource};
use crate::statistics::{
    approximate_p_value, compute_correlation, compute_correlation_ci, AttributeTypeCategory,
    CorrelationResult, DEFAULT_Z_CRITICAL, MIN_CASES_FOR_INFERENCE,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace, warn};

/// Name of the results table handed to the presentation sink.
pub const CORRELATIONS_TABLE_NAME: &str = "PairwiseCorrelations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationType {
    Pearson,
    #[serde(rename = "none")]
    None,
}

impl fmt::Display for CorrelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationType::Pearson => write!(f, "Pearson"),
            CorrelationType::None => write!(f, "none"),
        }
    }
}

/// Which attributes are paired with each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairScope {
    /// Pairs within each collection, as the host's table builder does
    #[default]
    Collection,
    /// Every ordered pair across the dataset
    All,
}

impl From<mvextras_cli::PairScopeArg> for PairScope {
    fn from(value: mvextras_cli::PairScopeArg) -> Self {
        match value {
            mvextras_cli::PairScopeArg::Collection => Self::Collection,
            mvextras_cli::PairScopeArg::All => Self::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseOptions {
    /// Critical value used for the CI_low95 / CI_high95 bounds
    pub z_critical: f64,
    pub scope: PairScope,
    /// CI and p-value need strictly more complete cases than this
    pub min_complete_cases: usize,
}

impl Default for PairwiseOptions {
    fn default() -> Self {
        Self {
            z_critical: DEFAULT_Z_CRITICAL,
            scope: PairScope::default(),
            min_complete_cases: MIN_CASES_FOR_INFERENCE,
        }
    }
}

/// One row of the PairwiseCorrelations table.
///
/// Serialized names follow the host's results table. Statistics that are
/// undefined (non-numeric pair, zero variance, too few cases, extraction
/// failure) are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseCorrelationRow {
    #[serde(rename = "TableName")]
    pub table_name: String,
    #[serde(rename = "Predictor")]
    pub predictor: String,
    #[serde(rename = "Response")]
    pub response: String,
    pub correlation: Option<f64>,
    #[serde(rename = "correlationType")]
    pub correlation_type: CorrelationType,
    #[serde(rename = "nNeitherMissing")]
    pub n_complete_cases: usize,
    #[serde(rename = "nCases")]
    pub n_cases: usize,
    #[serde(rename = "nBlanks1")]
    pub nx_missing: usize,
    #[serde(rename = "nBlanks2")]
    pub ny_missing: usize,
    #[serde(rename = "correlBlanks")]
    pub missingness_correlation: Option<f64>,
    #[serde(rename = "CI_low95")]
    pub ci_low: Option<f64>,
    #[serde(rename = "CI_high95")]
    pub ci_high: Option<f64>,
    pub p_value: Option<f64>,
    pub date: String,
    pub type1: String,
    pub unit1: String,
    pub type2: String,
    pub unit2: String,
    pub description1: String,
    pub description2: String,
    #[serde(rename = "table_order_Predictor")]
    pub table_order_predictor: String,
    #[serde(rename = "table_order_Response")]
    pub table_order_response: String,
}

/// Column names of the table, in output order.
pub const ROW_FIELDS: [&str; 22] = [
    "TableName",
    "Predictor",
    "Response",
    "correlation",
    "correlationType",
    "nNeitherMissing",
    "nCases",
    "nBlanks1",
    "nBlanks2",
    "correlBlanks",
    "CI_low95",
    "CI_high95",
    "p_value",
    "date",
    "type1",
    "unit1",
    "type2",
    "unit2",
    "description1",
    "description2",
    "table_order_Predictor",
    "table_order_Response",
];

/// Zero-padded table position plus name, so the labels sort in schema order.
pub fn table_order_label(position: usize, name: &str) -> String {
    format!("{:03}_{}", position, name)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Statistics for one pair, before metadata is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PairStatistics {
    correlation_type: CorrelationType,
    result: Option<CorrelationResult>,
    ci: Option<(f64, f64)>,
    p_value: Option<f64>,
}

fn correlate_pair<S>(
    source: &S,
    predictor: &Attribute,
    response: &Attribute,
    options: &PairwiseOptions,
) -> PairStatistics
where
    S: DataSource + ?Sized,
{
    let both_numeric = predictor.category() == AttributeTypeCategory::EssentiallyNumeric
        && response.category() == AttributeTypeCategory::EssentiallyNumeric;
    if !both_numeric {
        return PairStatistics {
            correlation_type: CorrelationType::None,
            result: None,
            ci: None,
            p_value: None,
        };
    }

    let result = match source.pair_sample(&predictor.name, &response.name) {
        Ok(sample) => compute_correlation(&sample),
        Err(e) => {
            warn!(
                predictor = %predictor.name,
                response = %response.name,
                "Could not extract values for pair: {}",
                e
            );
            return PairStatistics {
                correlation_type: CorrelationType::Pearson,
                result: None,
                ci: None,
                p_value: None,
            };
        }
    };

    let (ci, p_value) =
        if result.has_correlation() && result.n_complete_cases > options.min_complete_cases {
            let ci = compute_correlation_ci(
                result.correlation,
                result.n_complete_cases,
                options.z_critical,
            );
            (
                Some((ci.low, ci.high)),
                approximate_p_value(result.correlation, result.n_complete_cases),
            )
        } else {
            (None, None)
        };

    trace!(
        predictor = %predictor.name,
        response = %response.name,
        r = result.correlation,
        n = result.n_complete_cases,
        "correlated pair"
    );

    PairStatistics {
        correlation_type: CorrelationType::Pearson,
        result: Some(result),
        ci,
        p_value,
    }
}

fn make_row(
    table_name: &str,
    predictor: &Attribute,
    response: &Attribute,
    stats: PairStatistics,
    n_cases: usize,
    order: &HashMap<String, usize>,
    date: &str,
) -> PairwiseCorrelationRow {
    let result = stats.result;
    PairwiseCorrelationRow {
        table_name: table_name.to_string(),
        predictor: predictor.name.clone(),
        response: response.name.clone(),
        correlation: result.and_then(|r| finite(r.correlation)),
        correlation_type: stats.correlation_type,
        n_complete_cases: result.map_or(0, |r| r.n_complete_cases),
        n_cases,
        nx_missing: result.map_or(0, |r| r.nx_missing),
        ny_missing: result.map_or(0, |r| r.ny_missing),
        missingness_correlation: result.and_then(|r| finite(r.missingness_correlation)),
        ci_low: stats.ci.and_then(|(low, _)| finite(low)),
        ci_high: stats.ci.and_then(|(_, high)| finite(high)),
        p_value: stats.p_value,
        date: date.to_string(),
        type1: predictor.declared_type.clone(),
        unit1: predictor.unit.clone(),
        type2: response.declared_type.clone(),
        unit2: response.unit.clone(),
        description1: predictor.description.clone(),
        description2: response.description.clone(),
        table_order_predictor: table_order_label(
            order.get(&predictor.name).copied().unwrap_or(0),
            &predictor.name,
        ),
        table_order_response: table_order_label(
            order.get(&response.name).copied().unwrap_or(0),
            &response.name,
        ),
    }
}

/// Builds one row for every ordered attribute pair, self-pairs included.
///
/// Both orders of a pair are computed separately, so the cost is
/// O(k^2 * m) for k attributes and m cases. Rows come out in collection
/// order, then predictor order, then response order. A pair whose values
/// cannot be extracted gets a row with empty statistics and the table
/// carries on.
pub fn build_pairwise_table<S>(
    source: &S,
    options: &PairwiseOptions,
    timestamp: DateTime<Utc>,
) -> Vec<PairwiseCorrelationRow>
where
    S: DataSource + ?Sized,
{
    let schema = source.schema();
    let order = schema.attribute_order();
    let n_cases = source.case_count();
    let date = timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);

    let groups: Vec<Vec<&Attribute>> = match options.scope {
        PairScope::Collection => schema
            .collections
            .iter()
            .map(|c| c.attrs.iter().collect())
            .collect(),
        PairScope::All => vec![schema.attributes().collect()],
    };

    let mut rows = Vec::with_capacity(groups.iter().map(|g| g.len() * g.len()).sum());
    for attrs in &groups {
        for predictor in attrs {
            for response in attrs {
                let stats = correlate_pair(source, predictor, response, options);
                rows.push(make_row(
                    &schema.name,
                    predictor,
                    response,
                    stats,
                    n_cases,
                    &order,
                    &date,
                ));
            }
        }
    }

    debug!(
        dataset = %schema.name,
        rows = rows.len(),
        cases = n_cases,
        "built pairwise correlation table"
    );
    rows
}
