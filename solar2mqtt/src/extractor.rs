//! Turns the polled API document into [`EnergyTotals`].
//!
//! Two layouts are understood. The aggregate layout maps arbitrary keys
//! (usually years) to arrays of per-day records carrying `P` (solar, kWh),
//! `U` (grid import, kWh) and `I` (grid export, Wh by default). It is always
//! tried first. Only if it finds no record at all are the configured dotted
//! paths resolved instead.

use log::trace;
use serde_json::{Map, Value};

use crate::api_config::{ExportUnit, FieldPaths};
use crate::energy_totals::EnergyTotals;
use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionSchema {
    pub fields: Option<FieldPaths>,
    pub export_unit: ExportUnit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    AutoDetect,
    FieldPaths,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::AutoDetect => write!(f, "auto-detect"),
            Strategy::FieldPaths => write!(f, "fallback"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extraction {
    pub strategy: Strategy,
    pub totals: EnergyTotals,
}

pub fn extract(document: &Value, schema: &ExtractionSchema) -> Result<Extraction> {
    if let Some(totals) = auto_detect(document, schema.export_unit) {
        return Ok(Extraction {
            strategy: Strategy::AutoDetect,
            totals,
        });
    }

    let Some(fields) = &schema.fields else {
        return Err(Error::SchemaMismatch(
            "no per-day records found and no field paths configured".to_string(),
        ));
    };
    trace!("no per-day records found, resolving configured field paths");

    Ok(Extraction {
        strategy: Strategy::FieldPaths,
        totals: EnergyTotals {
            solar_total_kwh: resolve_path(document, &fields.solar_total_kwh)?,
            grid_import_kwh: resolve_path(document, &fields.grid_import_kwh)?,
            grid_export_kwh: resolve_path(document, &fields.grid_export_kwh)?,
        },
    })
}

/// Sums every per-day record of the aggregate layout.
///
/// Returns `None` unless at least one record was visited, so a document made
/// only of empty arrays is a miss rather than a zero total.
pub fn auto_detect(document: &Value, export_unit: ExportUnit) -> Option<EnergyTotals> {
    let Value::Object(entries) = document else {
        return None;
    };

    let mut records = 0usize;
    let mut solar = 0.0;
    let mut import = 0.0;
    let mut export = 0.0;

    for days in entries.values() {
        let Value::Array(days) = days else {
            continue;
        };
        for day in days {
            let Value::Object(day) = day else {
                continue;
            };
            records += 1;
            solar += numeric_field(day, "P");
            import += numeric_field(day, "U");
            export += numeric_field(day, "I");
        }
    }

    if records == 0 {
        return None;
    }
    trace!("auto-detect visited {records} records");

    Some(EnergyTotals {
        solar_total_kwh: solar,
        grid_import_kwh: import,
        grid_export_kwh: export_unit.to_kwh(export),
    })
}

/// Walks `document` along the dot separated segments of `path`.
pub fn resolve_path(document: &Value, path: &str) -> Result<f64> {
    let mut current = document;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| Error::SchemaMismatch(format!("path '{path}' not found")))?;
    }

    current
        .as_f64()
        .ok_or_else(|| Error::SchemaMismatch(format!("value at path '{path}' is not numeric")))
}

fn numeric_field(record: &Map<String, Value>, name: &str) -> f64 {
    let value = record.get(name).or_else(|| {
        record
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    });
    value.and_then(as_number).unwrap_or(0.0)
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(fields: Option<FieldPaths>) -> ExtractionSchema {
        ExtractionSchema {
            fields,
            export_unit: ExportUnit::Wh,
        }
    }

    fn paths(solar: &str, import: &str, export: &str) -> FieldPaths {
        FieldPaths {
            solar_total_kwh: solar.to_string(),
            grid_import_kwh: import.to_string(),
            grid_export_kwh: export.to_string(),
        }
    }

    #[test]
    fn sums_records_across_keys() {
        let document = json!({
            "2023": [{"D": 1, "P": 1.5, "U": 0.5, "I": 250}],
            "2024": [
                {"D": 1, "P": 5.0, "U": 2.0, "I": 1500},
                {"D": 2, "P": 3.0, "U": 1.0, "I": 500}
            ]
        });

        let totals = auto_detect(&document, ExportUnit::Wh).unwrap();
        assert_eq!(totals.solar_total_kwh, 9.5);
        assert_eq!(totals.grid_import_kwh, 3.5);
        assert_eq!(totals.grid_export_kwh, 2.25);
    }

    #[test]
    fn skips_non_object_elements_and_non_array_values() {
        let document = json!({
            "meta": {"P": 100},
            "version": 3,
            "2024": [1, "x", null, {"P": 2.0}, [{"P": 50}]]
        });

        let totals = auto_detect(&document, ExportUnit::Wh).unwrap();
        assert_eq!(totals.solar_total_kwh, 2.0);
        assert_eq!(totals.grid_import_kwh, 0.0);
        assert_eq!(totals.grid_export_kwh, 0.0);
    }

    #[test]
    fn accepts_numeric_strings_and_ignores_garbage() {
        let document = json!({
            "2024": [
                {"P": "4.5", "U": " 1.25 ", "I": "2000"},
                {"P": "n/a", "U": true, "I": null},
                {"P": "NaN"}
            ]
        });

        let totals = auto_detect(&document, ExportUnit::Wh).unwrap();
        assert_eq!(totals.solar_total_kwh, 4.5);
        assert_eq!(totals.grid_import_kwh, 1.25);
        assert_eq!(totals.grid_export_kwh, 2.0);
    }

    #[test]
    fn field_names_match_case_insensitively() {
        let document = json!({"2024": [{"p": 1.0, "u": 2.0, "i": 3000}]});

        let totals = auto_detect(&document, ExportUnit::Wh).unwrap();
        assert_eq!(totals.solar_total_kwh, 1.0);
        assert_eq!(totals.grid_import_kwh, 2.0);
        assert_eq!(totals.grid_export_kwh, 3.0);
    }

    #[test]
    fn export_in_kwh_is_not_scaled() {
        let document = json!({"2024": [{"I": 1.5}]});

        let totals = auto_detect(&document, ExportUnit::Kwh).unwrap();
        assert_eq!(totals.grid_export_kwh, 1.5);
    }

    #[test]
    fn empty_arrays_are_a_miss() {
        assert_eq!(auto_detect(&json!({"2024": [], "2025": []}), ExportUnit::Wh), None);
        assert_eq!(auto_detect(&json!({"a": {"b": 1}}), ExportUnit::Wh), None);
        assert_eq!(auto_detect(&json!({}), ExportUnit::Wh), None);
        assert_eq!(auto_detect(&json!([{"P": 1}]), ExportUnit::Wh), None);
    }

    #[test]
    fn records_without_fields_still_count_as_a_hit() {
        let document = json!({"2024": [{"D": 1}]});

        let extraction = extract(&document, &schema(Some(paths("a", "b", "c")))).unwrap();
        assert_eq!(extraction.strategy, Strategy::AutoDetect);
        assert_eq!(extraction.totals, EnergyTotals::default());
    }

    #[test]
    fn auto_detect_wins_over_configured_paths() {
        let document = json!({
            "2024": [{"P": 1.0, "U": 2.0, "I": 3000}],
            "a": {"b": 10, "c": 4, "d": 1}
        });

        let extraction = extract(&document, &schema(Some(paths("a.b", "a.c", "a.d")))).unwrap();
        assert_eq!(extraction.strategy, Strategy::AutoDetect);
        assert_eq!(extraction.totals.solar_total_kwh, 1.0);
    }

    #[test]
    fn falls_back_to_field_paths() {
        let document = json!({"2024": [], "a": {"b": 10, "c": 4, "d": 1}});

        let extraction = extract(&document, &schema(Some(paths("a.b", "a.c", "a.d")))).unwrap();
        assert_eq!(extraction.strategy, Strategy::FieldPaths);
        assert_eq!(
            extraction.totals,
            EnergyTotals {
                solar_total_kwh: 10.0,
                grid_import_kwh: 4.0,
                grid_export_kwh: 1.0,
            }
        );
    }

    #[test]
    fn missing_path_names_the_full_path() {
        let document = json!({"a": {"b": 10}});

        let err = extract(&document, &schema(Some(paths("a.b", "a.x.y", "a.b")))).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert!(err.to_string().contains("'a.x.y'"), "{err}");
    }

    #[test]
    fn terminal_value_must_be_numeric() {
        let document = json!({"a": {"b": "10", "c": {"d": 1}}});

        assert!(matches!(resolve_path(&document, "a.b"), Err(Error::SchemaMismatch(_))));
        assert!(matches!(resolve_path(&document, "a.c"), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn numeric_segments_index_arrays() {
        let document = json!({"totals": [{"kwh": 1.0}, {"kwh": 7.5}]});

        assert_eq!(resolve_path(&document, "totals.1.kwh").unwrap(), 7.5);
        assert!(resolve_path(&document, "totals.2.kwh").is_err());
    }

    #[test]
    fn miss_without_field_paths_is_a_schema_mismatch() {
        let err = extract(&json!({"2024": []}), &schema(None)).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }
}
