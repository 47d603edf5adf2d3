use serde::{Deserialize, Serialize};
use std::fmt;

/// Two-sided 95% critical value of the standard normal distribution.
pub const DEFAULT_Z_CRITICAL: f64 = 1.96;

/// Confidence intervals and p-values need more complete cases than this.
pub const MIN_CASES_FOR_INFERENCE: usize = 3;

pub const CI_ERROR_OUT_OF_RANGE: &str = "correlation coefficient must be between -1 and 1";
pub const CI_ERROR_SAMPLE_TOO_SMALL: &str = "sample size must be greater than 3";
pub const CI_NOTE_PERFECT: &str = "perfect correlation - CI is the point estimate";

/// A cell value as it arrives from the host, before missingness classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(RawValue::Null, RawValue::Number)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => Ok(()),
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

/// Normalizes a raw value to a finite number, or `None` when it counts as missing.
///
/// Null, the empty string, text without a numeric prefix, booleans and
/// non-finite numbers are all missing. Text is read like a lenient float
/// parser: leading whitespace is skipped and trailing junk after the
/// longest numeric prefix is ignored (`"12 kg"` is 12).
pub fn classify_value(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Null | RawValue::Bool(_) => None,
        RawValue::Number(n) => n.is_finite().then_some(*n),
        RawValue::Text(s) => leading_number(s).filter(|n| n.is_finite()),
    }
}

/// Parses the longest numeric prefix of `s` (after leading whitespace).
pub fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Broad grouping of a host attribute's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeTypeCategory {
    EssentiallyNumeric,
    EssentiallyCategorical,
    Other,
}

impl AttributeTypeCategory {
    /// Classifies a declared type token. Exact and case-sensitive; unknown tokens are `Other`.
    pub fn from_declared_type(declared: &str) -> Self {
        match declared {
            // checkbox values are true/false/blank; some host sample data declares "nominal"
            "" | "categorical" | "checkbox" | "nominal" => Self::EssentiallyCategorical,
            // qualitative is numeric data displayed as bars
            "numeric" | "date" | "qualitative" => Self::EssentiallyNumeric,
            "boundary" | "color" => Self::Other,
            _ => Self::Other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::EssentiallyNumeric)
    }
}

impl fmt::Display for AttributeTypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EssentiallyNumeric => write!(f, "EssentiallyNumeric"),
            Self::EssentiallyCategorical => write!(f, "EssentiallyCategorical"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Classifies a declared attribute type. See [`AttributeTypeCategory::from_declared_type`].
pub fn classify_attribute_type(declared: &str) -> AttributeTypeCategory {
    AttributeTypeCategory::from_declared_type(declared)
}

/// One row of a two-attribute sample; `None` marks a missing side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl Observation {
    pub fn new(x: Option<f64>, y: Option<f64>) -> Self {
        Self {
            x: x.filter(|v| v.is_finite()),
            y: y.filter(|v| v.is_finite()),
        }
    }

    /// Builds an observation from two raw host values.
    pub fn from_raw(x: &RawValue, y: &RawValue) -> Self {
        Self {
            x: classify_value(x),
            y: classify_value(y),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

impl From<(f64, f64)> for Observation {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(Some(x), Some(y))
    }
}

impl From<(Option<f64>, Option<f64>)> for Observation {
    fn from((x, y): (Option<f64>, Option<f64>)) -> Self {
        Self::new(x, y)
    }
}

/// Running means and co-moments of a pair of variables (Welford's update).
///
/// `sxx`, `syy` and `sxy` are sums of squared / cross deviations from the
/// running means, so the correlation never comes from subtracting
/// large raw sums.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairedMoments {
    n: usize,
    mean_x: f64,
    mean_y: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl PairedMoments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        let dy = y - self.mean_y;
        self.mean_x += dx / n;
        self.mean_y += dy / n;
        self.sxx += dx * (x - self.mean_x);
        self.syy += dy * (y - self.mean_y);
        self.sxy += dx * (y - self.mean_y);
    }

    pub fn count(&self) -> usize {
        self.n
    }

    pub fn mean_x(&self) -> f64 {
        self.mean_x
    }

    pub fn mean_y(&self) -> f64 {
        self.mean_y
    }

    /// Pearson correlation, or NaN when either variable has zero variance.
    pub fn correlation(&self) -> f64 {
        if self.sxx > 0.0 && self.syy > 0.0 {
            (self.sxy / (self.sxx * self.syy).sqrt()).clamp(-1.0, 1.0)
        } else {
            f64::NAN
        }
    }
}

/// Correlation of one attribute pair, with missingness bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationResult {
    /// Pearson r over complete cases; NaN when undefined
    pub correlation: f64,
    pub n_complete_cases: usize,
    pub nx_missing: usize,
    pub ny_missing: usize,
    pub total_cases: usize,
    /// Pearson r between the two 0/1 missingness indicators; NaN when undefined
    pub missingness_correlation: f64,
}

impl CorrelationResult {
    pub fn has_correlation(&self) -> bool {
        self.correlation.is_finite()
    }
}

/// One-pass accumulator for [`compute_correlation`].
///
/// Every row updates the missingness-indicator moments; only complete rows
/// update the value moments.
#[derive(Debug, Clone, Default)]
pub struct CorrelationAccumulator {
    values: PairedMoments,
    indicators: PairedMoments,
    nx_missing: usize,
    ny_missing: usize,
}

impl CorrelationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observation: Observation) {
        let ix = if observation.x.is_none() { 1.0 } else { 0.0 };
        let iy = if observation.y.is_none() { 1.0 } else { 0.0 };
        if observation.x.is_none() {
            self.nx_missing += 1;
        }
        if observation.y.is_none() {
            self.ny_missing += 1;
        }
        self.indicators.push(ix, iy);

        if let (Some(x), Some(y)) = (observation.x, observation.y) {
            self.values.push(x, y);
        }
    }

    pub fn finish(&self) -> CorrelationResult {
        CorrelationResult {
            correlation: self.values.correlation(),
            n_complete_cases: self.values.count(),
            nx_missing: self.nx_missing,
            ny_missing: self.ny_missing,
            total_cases: self.indicators.count(),
            missingness_correlation: self.indicators.correlation(),
        }
    }
}

impl Extend<Observation> for CorrelationAccumulator {
    fn extend<I: IntoIterator<Item = Observation>>(&mut self, iter: I) {
        for observation in iter {
            self.push(observation);
        }
    }
}

/// Computes Pearson correlation over complete cases and over missingness indicators.
///
/// Single forward pass. An empty sample gives zero counts and NaN for both
/// correlations; so does a one-row sample (zero variance).
pub fn compute_correlation(sample: &[Observation]) -> CorrelationResult {
    let mut acc = CorrelationAccumulator::new();
    acc.extend(sample.iter().copied());
    acc.finish()
}

/// Outcome of the input checks in [`compute_correlation_ci`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalStatus {
    Valid,
    /// |r| == 1: the interval collapses to the point estimate
    PointEstimate,
    CorrelationOutOfRange,
    SampleTooSmall,
}

/// Fisher z confidence interval for a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
    pub z_transformed: Option<f64>,
    pub standard_error: Option<f64>,
    pub margin_of_error: Option<f64>,
    pub status: IntervalStatus,
}

impl ConfidenceInterval {
    fn invalid(status: IntervalStatus) -> Self {
        Self {
            low: f64::NAN,
            high: f64::NAN,
            z_transformed: None,
            standard_error: None,
            margin_of_error: None,
            status,
        }
    }

    /// Error text for invalid input, `None` otherwise.
    pub fn error(&self) -> Option<&'static str> {
        match self.status {
            IntervalStatus::CorrelationOutOfRange => Some(CI_ERROR_OUT_OF_RANGE),
            IntervalStatus::SampleTooSmall => Some(CI_ERROR_SAMPLE_TOO_SMALL),
            _ => None,
        }
    }

    /// Error or explanatory note, if any.
    pub fn message(&self) -> Option<&'static str> {
        match self.status {
            IntervalStatus::PointEstimate => Some(CI_NOTE_PERFECT),
            _ => self.error(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == IntervalStatus::Valid
    }
}

/// Fisher's z-transformation, `0.5 * ln((1 + r) / (1 - r))`.
pub fn fisher_z(r: f64) -> f64 {
    0.5 * ((1.0 + r) / (1.0 - r)).ln()
}

/// Inverse of [`fisher_z`]: `(e^(2z) - 1) / (e^(2z) + 1)`, which is `tanh(z)`.
pub fn fisher_z_inverse(z: f64) -> f64 {
    z.tanh()
}

/// Confidence interval for Pearson's r via Fisher's z-transformation.
///
/// Checks run in order: r outside [-1, 1] (or NaN), then `n <= 3`, then
/// |r| == 1. Invalid input yields NaN bounds and an error status.
pub fn compute_correlation_ci(r: f64, n: usize, z_critical: f64) -> ConfidenceInterval {
    if !(-1.0..=1.0).contains(&r) {
        return ConfidenceInterval::invalid(IntervalStatus::CorrelationOutOfRange);
    }
    if n <= MIN_CASES_FOR_INFERENCE {
        return ConfidenceInterval::invalid(IntervalStatus::SampleTooSmall);
    }
    if r.abs() == 1.0 {
        return ConfidenceInterval {
            low: r,
            high: r,
            z_transformed: None,
            standard_error: None,
            margin_of_error: None,
            status: IntervalStatus::PointEstimate,
        };
    }

    let z_r = fisher_z(r);
    let se = 1.0 / ((n - 3) as f64).sqrt();
    let margin = z_critical * se;

    ConfidenceInterval {
        low: fisher_z_inverse(z_r - margin),
        high: fisher_z_inverse(z_r + margin),
        z_transformed: Some(z_r),
        standard_error: Some(se),
        margin_of_error: Some(margin),
        status: IntervalStatus::Valid,
    }
}

/// Error function, Abramowitz and Stegun 7.1.26 (max absolute error about 1.5e-7).
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    // Horner form of the degree-5 polynomial in t
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Standard normal CDF, `0.5 * (1 + erf(x / sqrt(2)))`.
pub fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Approximate two-sided p-value for H0: rho = 0.
///
/// Uses `t = r * sqrt((n - 2) / (1 - r^2))` against the standard normal tail
/// rather than Student's t with n - 2 degrees of freedom, so small samples
/// get p-values that are too small. Returns `None` unless `n > 3` and `r` is
/// a finite value in [-1, 1].
pub fn approximate_p_value(r: f64, n: usize) -> Option<f64> {
    if n <= MIN_CASES_FOR_INFERENCE || !r.is_finite() || r.abs() > 1.0 {
        return None;
    }
    if r.abs() == 1.0 {
        return Some(0.0);
    }
    let t = r * ((n - 2) as f64 / (1.0 - r * r)).sqrt();
    let p = 2.0 * (1.0 - standard_normal_cdf(t.abs()));
    Some(p.clamp(0.0, 1.0))
}

/// Approximate standard normal quantile (Abramowitz and Stegun 26.2.23, |error| < 4.5e-4).
pub fn normal_quantile(p: f64) -> f64 {
    if p < 0.5 {
        -normal_quantile(1.0 - p)
    } else {
        let t = (-2.0 * (1.0 - p).ln()).sqrt();
        t - (2.515517 + 0.802853 * t + 0.010328 * t * t)
            / (1.0 + 1.432788 * t + 0.189269 * t * t + 0.001308 * t * t * t)
    }
}

/// Two-sided critical value for a confidence level in (0, 1), e.g. 0.95 -> ~1.96.
pub fn critical_value_for_confidence(level: f64) -> Option<f64> {
    if !(level > 0.0 && level < 1.0) {
        return None;
    }
    Some(normal_quantile(1.0 - (1.0 - level) / 2.0))
}
