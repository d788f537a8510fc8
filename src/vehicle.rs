//! Per-crash vehicle summary.
//!
//! Collapses every vehicle row of a crash into six indicator flags. Predicates
//! short-circuit on the first satisfying vehicle; null or non-numeric codes
//! never satisfy one.

use std::collections::HashMap;

use anyhow::Result;

use crate::{
    cli::BooleanFormat,
    config::VehicleFields,
    interval::{normalize_key, parse_measure},
    table::Table,
};

pub const SUMMARY_COLUMNS: [&str; 6] = [
    "has_mixed_sex",
    "has_young_driver",
    "has_old_driver",
    "has_truck",
    "has_old_car",
    "has_intoxication",
];

const YOUNG_DRIVER_AGE: f64 = 25.0;
const OLD_DRIVER_AGE: f64 = 65.0;
const OLD_CAR_YEARS: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleSummary {
    pub case_number: String,
    pub has_mixed_sex: bool,
    pub has_young_driver: bool,
    pub has_old_driver: bool,
    pub has_truck: bool,
    pub has_old_car: bool,
    pub has_intoxication: bool,
}

impl VehicleSummary {
    pub fn flags(&self) -> [bool; 6] {
        [
            self.has_mixed_sex,
            self.has_young_driver,
            self.has_old_driver,
            self.has_truck,
            self.has_old_car,
            self.has_intoxication,
        ]
    }
}

/// Full model year for a 2-digit code: below 20 is 20xx, otherwise 19xx.
pub fn model_year(code: f64) -> f64 {
    if code < 20.0 {
        2000.0 + code
    } else {
        1900.0 + code
    }
}

struct FieldIndices {
    sex: usize,
    age: usize,
    vehicle_type: usize,
    model_year: usize,
    intoxication: usize,
}

fn any_code<'a, I, F>(rows: I, column: usize, predicate: F) -> bool
where
    I: IntoIterator<Item = &'a Vec<String>>,
    F: Fn(f64) -> bool,
{
    rows.into_iter()
        .any(|row| parse_measure(&row[column]).is_some_and(&predicate))
}

/// One summary per case number, in order of first appearance.
pub fn aggregate_vehicles(
    vehicles: &Table,
    fields: &VehicleFields,
    case_column: &str,
    crash_year: u16,
) -> Result<Vec<VehicleSummary>> {
    let case_idx = vehicles.require_column(case_column)?;
    let idx = FieldIndices {
        sex: vehicles.require_column(&fields.sex)?,
        age: vehicles.require_column(&fields.age)?,
        vehicle_type: vehicles.require_column(&fields.vehicle_type)?,
        model_year: vehicles.require_column(&fields.model_year)?,
        intoxication: vehicles.require_column(&fields.intoxication)?,
    };

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Vec<String>>> = HashMap::new();
    for row in vehicles.rows() {
        let case = normalize_key(&row[case_idx]);
        if case.is_empty() {
            continue;
        }
        let group = groups.entry(case.clone()).or_insert_with(|| {
            order.push(case);
            Vec::new()
        });
        group.push(row);
    }

    let crash_year = f64::from(crash_year);
    let summaries = order
        .into_iter()
        .map(|case| {
            let rows = &groups[&case];
            VehicleSummary {
                has_mixed_sex: any_code(rows.iter().copied(), idx.sex, |code| code > 1.0),
                has_young_driver: any_code(rows.iter().copied(), idx.age, |age| {
                    age < YOUNG_DRIVER_AGE
                }),
                has_old_driver: any_code(rows.iter().copied(), idx.age, |age| age > OLD_DRIVER_AGE),
                has_truck: any_code(rows.iter().copied(), idx.vehicle_type, |code| code > 4.0),
                has_old_car: any_code(rows.iter().copied(), idx.model_year, |code| {
                    crash_year - model_year(code) >= OLD_CAR_YEARS
                }),
                has_intoxication: any_code(rows.iter().copied(), idx.intoxication, |code| {
                    code == 1.0 || code == 5.0
                }),
                case_number: case,
            }
        })
        .collect();
    Ok(summaries)
}

pub fn summary_table(
    summaries: &[VehicleSummary],
    case_column: &str,
    format: BooleanFormat,
) -> Result<Table> {
    let mut headers = vec![case_column.to_string()];
    headers.extend(SUMMARY_COLUMNS.iter().map(|name| name.to_string()));
    let rows = summaries
        .iter()
        .map(|summary| {
            let mut row = vec![summary.case_number.clone()];
            row.extend(summary.flags().iter().map(|flag| format.render(*flag).to_string()));
            row
        })
        .collect();
    Table::new("vehicle summary", headers, rows)
}
