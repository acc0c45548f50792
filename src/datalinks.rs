//! Data link rows: building, merging and summarising.
//!
//! A data link filetype delivers either a flag (`true` means "link exists"),
//! one map with `url`/`title`/`item_count`/`link_sub_type` keys, or a list
//! of such maps. Each map becomes one [`DataLinkRow`]; rows sharing
//! `(link_type, link_sub_type)` are merged before the record is emitted.

use crate::error::{NonbibError, Result};
use crate::field::{json_type_name, FieldDefinition};
use crate::record::DataLinkRow;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Link type whose rows are summarised into the `data` field
pub const DATA_LINK_TYPE: &str = "DATA";

/// Convert one raw data link value into a row.
///
/// # Errors
///
/// Returns `NonbibError::MalformedField` if the value is neither `true` nor a
/// map, or if the definition carries no link type.
pub fn build_row(bibcode: &str, filetype: &str, value: &Value, def: &FieldDefinition) -> Result<DataLinkRow> {
    let malformed = || NonbibError::MalformedField {
        bibcode: bibcode.to_string(),
        filetype: filetype.to_string(),
        observed: json_type_name(value),
        value: value.to_string(),
    };
    let extra = def.extra_values.as_ref().ok_or_else(malformed)?;
    let link_type = extra.link_type.clone().ok_or_else(malformed)?;

    let row = match value {
        Value::Bool(true) => DataLinkRow {
            link_type,
            link_sub_type: extra.link_sub_type.clone().unwrap_or_default(),
            url: vec![String::new()],
            title: vec![String::new()],
            item_count: 0,
        },
        Value::Object(map) => {
            let sub_type = map
                .get("link_sub_type")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| extra.link_sub_type.clone())
                .unwrap_or_default();
            DataLinkRow {
                link_type,
                link_sub_type: format!("{}{}", sub_type, subparts_suffix(map)),
                url: string_list(map.get("url")),
                title: string_list(map.get("title")),
                item_count: count(map.get("item_count")),
            }
        }
        _ => return Err(malformed()),
    };

    debug!(
        bibcode = bibcode,
        filetype = filetype,
        link_type = %row.link_type,
        link_sub_type = %row.link_sub_type,
        "Built data link row"
    );
    Ok(row)
}

/// Merge rows sharing `(link_type, link_sub_type)`.
///
/// Output has one row per key, in first-occurrence order. Later rows are
/// folded into the first: url and title lists are concatenated and
/// item counts summed.
pub fn merge(rows: Vec<DataLinkRow>) -> Vec<DataLinkRow> {
    let mut merged: Vec<DataLinkRow> = Vec::with_capacity(rows.len());
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for row in rows {
        let key = (row.link_type.clone(), row.link_sub_type.clone());
        match index.get(&key) {
            Some(&pos) => {
                let first = &mut merged[pos];
                first.url.extend(row.url);
                first.title.extend(row.title);
                first.item_count += row.item_count;
            }
            None => {
                index.insert(key, merged.len());
                merged.push(row);
            }
        }
    }

    merged
}

/// Summarise DATA rows as sorted `"SUBTYPE:COUNT"` strings plus the total count
pub fn data_summary(rows: &[DataLinkRow]) -> (Vec<String>, u64) {
    let data_rows: Vec<&DataLinkRow> = rows.iter().filter(|r| r.link_type == DATA_LINK_TYPE).collect();

    let mut data: Vec<String> = data_rows
        .iter()
        .map(|r| format!("{}:{}", r.link_sub_type, r.item_count))
        .collect();
    data.sort();

    let total = data_rows.iter().map(|r| r.item_count).sum();
    (data, total)
}

/// `" N"` when the value carries `subparts.item_count`, empty otherwise
fn subparts_suffix(map: &Map<String, Value>) -> String {
    match map.get("subparts").and_then(|s| s.get("item_count")) {
        Some(Value::String(s)) => format!(" {}", s),
        Some(Value::Number(n)) => format!(" {}", n),
        _ => String::new(),
    }
}

/// Coerce an absent value, a bare string or a list into a non-empty string list
fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };
    if items.is_empty() {
        vec![String::new()]
    } else {
        items
    }
}

fn count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ExtraValues;
    use serde_json::json;

    const BIBCODE: &str = "2020ApJ...900..100X";

    fn link_def(link_type: &str, sub_type: Option<&str>) -> FieldDefinition {
        FieldDefinition::new(json!([])).with_extra(ExtraValues {
            link_type: Some(link_type.to_string()),
            link_sub_type: sub_type.map(str::to_string),
            ..Default::default()
        })
    }

    fn row(link_type: &str, sub_type: &str, url: &str, count: u64) -> DataLinkRow {
        DataLinkRow {
            link_type: link_type.to_string(),
            link_sub_type: sub_type.to_string(),
            url: vec![url.to_string()],
            title: vec![String::new()],
            item_count: count,
        }
    }

    #[test]
    fn test_build_row_from_flag() -> Result<()> {
        let def = link_def("ESOURCE", Some("ADS_PDF"));
        let built = build_row(BIBCODE, "ADS_PDF", &json!(true), &def)?;
        assert_eq!(built.link_type, "ESOURCE");
        assert_eq!(built.link_sub_type, "ADS_PDF");
        assert_eq!(built.url, vec![String::new()]);
        assert_eq!(built.title, vec![String::new()]);
        assert_eq!(built.item_count, 0);
        Ok(())
    }

    #[test]
    fn test_build_row_from_map() -> Result<()> {
        let def = link_def("DATA", None);
        let value = json!({
            "link_sub_type": "NED",
            "url": "http://ned.example/1",
            "title": ["NED objects"],
            "item_count": 1953
        });
        let built = build_row(BIBCODE, "data_link", &value, &def)?;
        assert_eq!(built.link_sub_type, "NED");
        assert_eq!(built.url, vec!["http://ned.example/1".to_string()]);
        assert_eq!(built.title, vec!["NED objects".to_string()]);
        assert_eq!(built.item_count, 1953);
        Ok(())
    }

    #[test]
    fn test_build_row_defaults() -> Result<()> {
        let def = link_def("PRESENTATION", Some("NA"));
        let built = build_row(BIBCODE, "presentation", &json!({}), &def)?;
        assert_eq!(built.link_sub_type, "NA");
        assert_eq!(built.url, vec![String::new()]);
        assert_eq!(built.title, vec![String::new()]);
        assert_eq!(built.item_count, 0);

        let empty_lists = build_row(BIBCODE, "presentation", &json!({"url": [], "title": []}), &def)?;
        assert_eq!(empty_lists.url, vec![String::new()]);
        assert_eq!(empty_lists.title, vec![String::new()]);
        Ok(())
    }

    #[test]
    fn test_build_row_subparts_suffix() -> Result<()> {
        let def = link_def("ASSOCIATED", Some("NA"));
        let value = json!({"subparts": {"item_count": 3}});
        assert_eq!(build_row(BIBCODE, "associated", &value, &def)?.link_sub_type, "NA 3");

        let own = json!({"link_sub_type": "CXO", "subparts": {"item_count": "12"}});
        assert_eq!(build_row(BIBCODE, "associated", &own, &def)?.link_sub_type, "CXO 12");
        Ok(())
    }

    #[test]
    fn test_build_row_malformed() {
        let def = link_def("DATA", Some("CDS"));
        let result = build_row(BIBCODE, "data_link", &json!(42), &def);
        match result {
            Err(NonbibError::MalformedField { filetype, observed, value, .. }) => {
                assert_eq!(filetype, "data_link");
                assert_eq!(observed, "number");
                assert_eq!(value, "42");
            }
            other => panic!("expected malformed field, got {:?}", other),
        }
    }

    #[test]
    fn test_build_row_false_flag_is_malformed() {
        let def = link_def("ESOURCE", Some("PUB_PDF"));
        let result = build_row(BIBCODE, "PUB_PDF", &json!(false), &def);
        assert!(matches!(
            result,
            Err(NonbibError::MalformedField { observed: "flag", .. })
        ));
    }

    #[test]
    fn test_merge_concatenates_and_sums() {
        let rows = vec![
            row("DATA", "CDS", "a", 1),
            row("ESOURCE", "PUB_PDF", "p", 0),
            row("DATA", "CDS", "b", 4),
            row("DATA", "NED", "n", 2),
        ];
        let merged = merge(rows);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].link_sub_type, "CDS");
        assert_eq!(merged[0].url, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(merged[0].title.len(), 2);
        assert_eq!(merged[0].item_count, 5);
        assert_eq!(merged[1].link_sub_type, "PUB_PDF");
        assert_eq!(merged[2].link_sub_type, "NED");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let rows = vec![
            row("DATA", "CDS", "a", 1),
            row("DATA", "CDS", "b", 4),
            row("DATA", "SIMBAD", "s", 1),
        ];
        let once = merge(rows);
        let twice = merge(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_same_sub_type_different_type() {
        let rows = vec![row("DATA", "NA", "a", 1), row("ASSOCIATED", "NA", "b", 1)];
        assert_eq!(merge(rows).len(), 2);
    }

    #[test]
    fn test_data_summary() {
        let rows = vec![
            row("DATA", "Vizier", "v", 1),
            row("DATA", "CDS", "c", 1),
            row("ESOURCE", "PUB_PDF", "p", 7),
            row("DATA", "NED", "n", 1953),
        ];
        let (data, total) = data_summary(&rows);
        assert_eq!(data, vec!["CDS:1", "NED:1953", "Vizier:1"]);
        assert_eq!(total, 1955);
    }

    #[test]
    fn test_data_summary_empty() {
        let (data, total) = data_summary(&[]);
        assert!(data.is_empty());
        assert_eq!(total, 0);
    }
}
