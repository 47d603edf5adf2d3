//! Attribute batches.
//!
//! A batch is a named group of attributes. Batch names are carried inside
//! attribute descriptions as a braced prefix, e.g. `{work}Percent of people
//! working in agriculture` puts the attribute in batch `work`. Grouping can
//! instead follow the collection (hierarchy level) an attribute lives in.
//!
//! Editing helpers ([`set_attribute_batch`], [`set_hidden`],
//! [`set_batch_hidden`]) return an edited copy of the schema and leave the
//! input alone.

use crate::dataset::{Attribute, DatasetSchema};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Batch label for attributes without a braced prefix.
pub const NO_BATCH_LABEL: &str = "--";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchingMode {
    /// Use the `{name}` prefix from the description
    #[default]
    ByBatch,
    /// Use the collection name
    ByLevel,
}

impl BatchingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ByBatch => "byBatch",
            Self::ByLevel => "byLevel",
        }
    }
}

impl From<mvextras_cli::BatchBy> for BatchingMode {
    fn from(value: mvextras_cli::BatchBy) -> Self {
        match value {
            mvextras_cli::BatchBy::Batch => Self::ByBatch,
            mvextras_cli::BatchBy::Level => Self::ByLevel,
        }
    }
}

/// Result of [`parse_batch_tag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTag {
    pub batch: Option<String>,
    pub description: String,
}

/// Splits a braced batch name off a description.
///
/// Uses the first `{` and the first `}`. When the `}` comes after the `{`
/// (a missing `{` counts as coming before everything) the batch is the text
/// between them and the description becomes whatever follows the `}`.
/// Otherwise the description is returned unchanged with no batch.
pub fn parse_batch_tag(description: &str) -> BatchTag {
    let left = description.find('{');
    let right = description.find('}');

    match right {
        Some(r) if left.map_or(true, |l| r > l) => {
            let start = left.map_or(0, |l| l + 1);
            BatchTag {
                batch: Some(description[start..r].to_string()),
                description: description[r + 1..].to_string(),
            }
        }
        _ => BatchTag {
            batch: None,
            description: description.to_string(),
        },
    }
}

/// An attribute annotated with its batch and owning collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchedAttribute {
    #[serde(flatten)]
    pub attribute: Attribute,
    pub batch: String,
    pub collection: String,
}

/// A named group of attributes, in schema order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    pub name: String,
    pub attrs: Vec<String>,
    pub mode: BatchingMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchPlan {
    pub attributes: Vec<BatchedAttribute>,
    /// Batches in order of first appearance
    pub batches: Vec<Batch>,
}

impl BatchPlan {
    pub fn batch(&self, name: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.name == name)
    }
}

/// Groups every attribute of `schema` into batches.
///
/// Returns new records; the schema's attributes are left untouched. The
/// description stored on each [`BatchedAttribute`] has its braced prefix
/// removed whichever mode is used.
pub fn group_attributes(
    schema: &DatasetSchema,
    mode: BatchingMode,
    no_batch_label: &str,
) -> BatchPlan {
    let mut plan = BatchPlan::default();

    for collection in &schema.collections {
        for attr in &collection.attrs {
            let tag = parse_batch_tag(&attr.description);
            let group = match mode {
                BatchingMode::ByLevel => collection.name.clone(),
                BatchingMode::ByBatch => tag.batch.unwrap_or_else(|| no_batch_label.to_string()),
            };

            let mut attribute = attr.clone();
            attribute.description = tag.description;

            match plan.batches.iter_mut().find(|b| b.name == group) {
                Some(batch) => batch.attrs.push(attr.name.clone()),
                None => plan.batches.push(Batch {
                    name: group.clone(),
                    attrs: vec![attr.name.clone()],
                    mode,
                }),
            }

            plan.attributes.push(BatchedAttribute {
                attribute,
                batch: group,
                collection: collection.name.clone(),
            });
        }
    }

    plan
}

/// Moves `attribute` into `batch` by rewriting the braced prefix of its
/// description. Any previous prefix is replaced. An empty `batch` removes the
/// prefix, which puts the attribute back among the unbatched ones.
pub fn set_attribute_batch(
    schema: &DatasetSchema,
    attribute: &str,
    batch: &str,
) -> Result<DatasetSchema> {
    if batch.contains(['{', '}']) {
        return Err(eyre!("Batch name '{}' must not contain braces", batch));
    }

    let mut edited = schema.clone();
    let attr = edited
        .attribute_mut(attribute)
        .ok_or_else(|| eyre!("Attribute '{}' not found in dataset '{}'", attribute, schema.name))?;

    let description = parse_batch_tag(&attr.description).description;
    attr.description = if batch.is_empty() {
        description
    } else {
        format!("{{{}}}{}", batch, description)
    };
    debug!(attribute, batch, "moved attribute to batch");
    Ok(edited)
}

/// Sets the `hidden` flag of every named attribute.
///
/// Fails without editing anything when a name is not in the schema.
pub fn set_hidden<S: AsRef<str>>(
    schema: &DatasetSchema,
    attributes: &[S],
    hidden: bool,
) -> Result<DatasetSchema> {
    let missing: Vec<&str> = attributes
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| schema.attribute(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(eyre!(
            "Attribute(s) not found in dataset '{}': {}",
            schema.name,
            missing.join(", ")
        ));
    }

    let mut edited = schema.clone();
    for name in attributes {
        if let Some(attr) = edited.attribute_mut(name.as_ref()) {
            attr.hidden = hidden;
        }
    }
    Ok(edited)
}

/// Sets the `hidden` flag of every attribute in one batch, with batches
/// worked out as [`group_attributes`] does.
pub fn set_batch_hidden(
    schema: &DatasetSchema,
    batch: &str,
    mode: BatchingMode,
    no_batch_label: &str,
    hidden: bool,
) -> Result<DatasetSchema> {
    let plan = group_attributes(schema, mode, no_batch_label);
    let members = plan
        .batch(batch)
        .ok_or_else(|| eyre!("No batch named '{}' ({})", batch, mode.as_str()))?;
    debug!(batch, hidden, count = members.attrs.len(), "changing batch visibility");
    set_hidden(schema, &members.attrs, hidden)
}
