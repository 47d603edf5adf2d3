#![allow(dead_code)]

use mvextras::{Attribute, Case, Collection, Dataset, DatasetSchema};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Two collections: `diet` (one categorical attribute) over `animals`
/// (three numeric attributes and a categorical one).
pub fn mammals() -> Dataset {
    let schema = DatasetSchema::new(
        "mammals",
        vec![
            Collection::new(
                "diet",
                vec![Attribute::new("Diet", "categorical").with_description("{food}What it eats")],
            ),
            Collection::new(
                "animals",
                vec![
                    Attribute::new("Mass", "numeric")
                        .with_unit("kg")
                        .with_description("{body}Body mass"),
                    Attribute::new("Height", "numeric")
                        .with_unit("m")
                        .with_description("{body}Shoulder height"),
                    Attribute::new("Speed", "numeric")
                        .with_unit("km/h")
                        .with_description("Top speed"),
                    Attribute::new("Habitat", "categorical"),
                ],
            ),
        ],
    );

    let rows: [(f64, Option<f64>, Option<&str>, &str, &str); 6] = [
        (10.0, Some(0.5), Some("40"), "plants", "forest"),
        (20.0, Some(0.9), Some("35"), "meat", "plains"),
        (30.0, Some(1.1), Some(""), "plants", "plains"),
        (40.0, None, Some("20"), "both", "forest"),
        (50.0, Some(1.8), Some("15 km/h"), "meat", "desert"),
        (60.0, Some(2.0), None, "plants", "forest"),
    ];

    let cases = rows
        .iter()
        .enumerate()
        .map(|(i, (mass, height, speed, diet, habitat))| {
            let mut case = Case::new((i + 1).to_string())
                .with_value("Mass", *mass)
                .with_value("Height", *height)
                .with_value("Diet", *diet)
                .with_value("Habitat", *habitat);
            if let Some(speed) = speed {
                case = case.with_value("Speed", *speed);
            }
            case
        })
        .collect();

    Dataset::new(schema, cases)
}

pub fn mammals_frame() -> DataFrame {
    df!(
        "Mass" => [10.0, 20.0, 30.0, 40.0, 50.0, 60.0],
        "Height" => [Some(0.5), Some(0.9), Some(1.1), None, Some(1.8), Some(2.0)],
        "Legs" => [4i64, 4, 4, 2, 4, 4],
        "Diet" => ["plants", "meat", "plants", "both", "meat", "plants"],
    )
    .unwrap()
}

pub fn write_csv(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    path
}

pub fn write_snapshot(dir: &Path, name: &str, dataset: &Dataset) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    serde_json::to_writer_pretty(file, dataset).unwrap();
    path
}
