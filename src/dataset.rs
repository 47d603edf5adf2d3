//! In-memory dataset model: collections of attributes plus cases.
//!
//! Mirrors what a host hands over as a read-only snapshot. The JSON layout
//! (`name`, `title`, `collections[].attrs[]`, `cases[].values`) matches the
//! snapshot files read by `source::load_snapshot`.

use crate::statistics::{AttributeTypeCategory, Observation, RawValue};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Host fields a record does not model, kept so they survive a write-back.
pub type ExtraFields = Map<String, Value>;

/// Treats an explicit JSON `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Accepts case ids written either as numbers or strings.
fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Float(f64),
        Text(String),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Int(i) => i.to_string(),
        Id::Float(f) => f.to_string(),
        Id::Text(s) => s,
    })
}

/// A host attribute (column) with its declared type and display metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub declared_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Hidden attributes stay in the dataset but are left out of host tables.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Attribute {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(&self) -> AttributeTypeCategory {
        AttributeTypeCategory::from_declared_type(&self.declared_type)
    }
}

/// One level of the host's case hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attrs: Vec<Attribute>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Collection {
    pub fn new(name: impl Into<String>, attrs: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            title: None,
            attrs,
            extra: ExtraFields::new(),
        }
    }
}

/// Ordered collections and attributes of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub collections: Vec<Collection>,
    /// Dataset-level host fields. `Dataset` flattens the schema, so these
    /// sit next to `name` and `cases` in a snapshot.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl DatasetSchema {
    pub fn new(name: impl Into<String>, collections: Vec<Collection>) -> Self {
        Self {
            name: name.into(),
            title: None,
            collections,
            extra: ExtraFields::new(),
        }
    }

    /// All attributes in schema order (collection by collection).
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.collections.iter().flat_map(|c| c.attrs.iter())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes().find(|a| a.name == name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.collections
            .iter_mut()
            .flat_map(|c| c.attrs.iter_mut())
            .find(|a| a.name == name)
    }

    pub fn attribute_count(&self) -> usize {
        self.collections.iter().map(|c| c.attrs.len()).sum()
    }

    /// 1-based position of every attribute across the whole dataset.
    pub fn attribute_order(&self) -> HashMap<String, usize> {
        self.attributes()
            .enumerate()
            .map(|(i, a)| (a.name.clone(), i + 1))
            .collect()
    }
}

/// One case (row): raw values keyed by attribute name. Absent keys are missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Case {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: HashMap<String, RawValue>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Case {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: HashMap::new(),
            extra: ExtraFields::new(),
        }
    }

    pub fn with_value(mut self, attribute: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    pub fn value(&self, attribute: &str) -> &RawValue {
        static NULL: RawValue = RawValue::Null;
        self.values.get(attribute).unwrap_or(&NULL)
    }
}

/// Read-only access to a dataset, as the pairwise table builder needs it.
pub trait DataSource {
    fn schema(&self) -> &DatasetSchema;

    /// Number of cases in the dataset, blanks included.
    fn case_count(&self) -> usize;

    /// Pulls the `(x, y)` observations for two attributes, one per case.
    fn pair_sample(&self, x_attribute: &str, y_attribute: &str) -> Result<Vec<Observation>>;
}

/// A dataset snapshot: schema plus flat cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(flatten)]
    pub schema: DatasetSchema,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cases: Vec<Case>,
}

impl Dataset {
    pub fn new(schema: DatasetSchema, cases: Vec<Case>) -> Self {
        Self { schema, cases }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn case_ids(&self) -> Vec<String> {
        self.cases.iter().map(|c| c.id.clone()).collect()
    }

    /// Column of raw values for one attribute, in case order.
    pub fn column(&self, attribute: &str) -> Result<Vec<&RawValue>> {
        if self.schema.attribute(attribute).is_none() {
            return Err(eyre!(
                "Attribute '{}' not found in dataset '{}'",
                attribute,
                self.schema.name
            ));
        }
        Ok(self.cases.iter().map(|c| c.value(attribute)).collect())
    }
}

impl DataSource for Dataset {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    fn case_count(&self) -> usize {
        self.cases.len()
    }

    fn pair_sample(&self, x_attribute: &str, y_attribute: &str) -> Result<Vec<Observation>> {
        let xs = self.column(x_attribute)?;
        let ys = self.column(y_attribute)?;
        Ok(xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| Observation::from_raw(x, y))
            .collect())
    }
}
