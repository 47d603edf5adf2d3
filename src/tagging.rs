//! Case tagging: plans of tag values for a tag attribute.
//!
//! The planning functions are pure. [`apply_tag_updates`] writes a plan into
//! an in-memory [`Dataset`], creating the tag attribute when needed.

use crate::dataset::{Attribute, Dataset};
use crate::statistics::{leading_number, RawValue};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Default name of the tag attribute.
pub const DEFAULT_TAG_ATTRIBUTE: &str = "Tag";

/// Declared type and description given to a newly created tag attribute.
pub const TAG_ATTRIBUTE_TYPE: &str = "nominal";
pub const TAG_ATTRIBUTE_DESCRIPTION: &str = "user-made tags for sets of cases";

/// New tag value for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUpdate {
    pub case_id: String,
    pub value: String,
}

impl TagUpdate {
    pub fn new(case_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            value: value.into(),
        }
    }
}

/// Gives every selected case `label`.
pub fn simple(selected: &[String], label: &str) -> Vec<TagUpdate> {
    selected.iter().map(|id| TagUpdate::new(id, label)).collect()
}

/// Blanks the tag of every selected case.
pub fn clear_selected(selected: &[String]) -> Vec<TagUpdate> {
    simple(selected, "")
}

/// Selected cases get `yes`, all others get `no`.
pub fn binary(all: &[String], selected: &[String], yes: &str, no: &str) -> Vec<TagUpdate> {
    let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();
    all.iter()
        .map(|id| {
            let value = if selected.contains(id.as_str()) { yes } else { no };
            TagUpdate::new(id, value)
        })
        .collect()
}

/// Each case independently gets `a` with probability `proportion`, else `b`.
pub fn random<R: Rng + ?Sized>(
    all: &[String],
    proportion: f64,
    a: &str,
    b: &str,
    rng: &mut R,
) -> Vec<TagUpdate> {
    all.iter()
        .map(|id| {
            let in_group_a = rng.gen::<f64>() < proportion;
            TagUpdate::new(id, if in_group_a { a } else { b })
        })
        .collect()
}

/// Blanks the tag of every case. The attribute itself is kept.
pub fn clear_all(all: &[String]) -> Vec<TagUpdate> {
    simple(all, "")
}

/// A parsed proportion plus the normalized text it was read as.
#[derive(Debug, Clone, PartialEq)]
pub struct Proportion {
    pub value: f64,
    pub display: String,
}

/// Reads `"25%"`, `"1/4"` or `"0.25"` as a proportion.
///
/// Each number is read leniently: leading whitespace is skipped and anything
/// after the leading number is ignored, so `"30 %"` and `"1/4 of them"` work.
/// Returns `None` when no finite value comes out.
pub fn parse_proportion(input: &str) -> Option<Proportion> {
    let (value, display) = if let Some(pos) = input.find('%') {
        let percent = leading_number(&input[..pos])?;
        (percent / 100.0, format!("{}%", percent))
    } else if let Some(pos) = input.find('/') {
        let numerator = leading_number(&input[..pos])?;
        let denominator = leading_number(&input[pos + 1..])?;
        (
            numerator / denominator,
            format!("{}/{}", numerator, denominator),
        )
    } else {
        let value = leading_number(input)?;
        (value, format!("{}", value))
    };

    value.is_finite().then_some(Proportion { value, display })
}

/// Makes sure `attribute_name` exists, adding it to the last collection if not.
///
/// Returns the name of the collection holding the attribute.
pub fn ensure_tag_attribute(dataset: &mut Dataset, attribute_name: &str) -> Result<String> {
    if let Some(collection) = dataset
        .schema
        .collections
        .iter()
        .find(|c| c.attrs.iter().any(|a| a.name == attribute_name))
    {
        return Ok(collection.name.clone());
    }

    let dataset_name = dataset.schema.name.clone();
    let collection = dataset
        .schema
        .collections
        .last_mut()
        .ok_or_else(|| eyre!("Dataset '{}' has no collections to tag", dataset_name))?;

    let mut attribute = Attribute::new(attribute_name, TAG_ATTRIBUTE_TYPE)
        .with_description(TAG_ATTRIBUTE_DESCRIPTION);
    attribute.title = Some(attribute_name.to_string());
    collection.attrs.push(attribute);
    debug!(
        attribute = attribute_name,
        collection = %collection.name,
        "created tag attribute"
    );
    Ok(collection.name.clone())
}

/// Writes tag values into the dataset. Returns the number of cases updated.
///
/// Updates naming a case id that is not in the dataset are skipped. When ids
/// repeat, the first case with that id gets the tag.
pub fn apply_tag_updates(
    dataset: &mut Dataset,
    attribute_name: &str,
    updates: &[TagUpdate],
) -> Result<usize> {
    ensure_tag_attribute(dataset, attribute_name)?;

    let mut index: HashMap<String, usize> = HashMap::with_capacity(dataset.cases.len());
    for (i, case) in dataset.cases.iter().enumerate() {
        index.entry(case.id.clone()).or_insert(i);
    }

    let mut applied = 0;
    for update in updates {
        match index.get(&update.case_id).map(|&i| &mut dataset.cases[i]) {
            Some(case) => {
                case.values.insert(
                    attribute_name.to_string(),
                    RawValue::Text(update.value.clone()),
                );
                applied += 1;
            }
            None => warn!(case_id = %update.case_id, "No such case; tag skipped"),
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_proportion_forms() {
        let p = parse_proportion("25%").unwrap();
        assert_eq!(p.value, 0.25);
        assert_eq!(p.display, "25%");

        let p = parse_proportion("1/4").unwrap();
        assert_eq!(p.value, 0.25);
        assert_eq!(p.display, "1/4");

        let p = parse_proportion("0.3").unwrap();
        assert_eq!(p.value, 0.3);
        assert_eq!(p.display, "0.3");

        let p = parse_proportion(" 12.5 percent%").unwrap();
        assert_eq!(p.value, 0.125);
        assert_eq!(p.display, "12.5%");
    }

    #[test]
    fn parse_proportion_rejects_junk() {
        assert_eq!(parse_proportion("lots"), None);
        assert_eq!(parse_proportion("%"), None);
        assert_eq!(parse_proportion("1/"), None);
        assert_eq!(parse_proportion("1/0"), None);
        assert_eq!(parse_proportion(""), None);
    }

    #[test]
    fn simple_and_clear() {
        let selected = ids(&["2", "5"]);
        assert_eq!(
            simple(&selected, "odd"),
            vec![TagUpdate::new("2", "odd"), TagUpdate::new("5", "odd")]
        );
        assert!(clear_selected(&selected).iter().all(|u| u.value.is_empty()));
    }
}
