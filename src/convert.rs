//! Raw record to canonical (nonbib) record conversion.
//!
//! Walks the filetypes of one raw record in arrival order:
//! - values equal to their default are suppressed
//! - data link filetypes become [`DataLinkRow`]s and property/esource tags
//! - property-only filetypes contribute their properties
//! - everything else is copied through
//!
//! Derived fields (refereed/article classification, data summary,
//! citation_count_norm) are computed once all filetypes have been seen.

use crate::datalinks;
use crate::error::{NonbibError, OptionExt, Result};
use crate::field::{json_type_name, FieldDefinition, FieldDefinitionTable, FieldValue};
use crate::record::{CanonicalRecord, DataLinkRow, RawRecord, CANONICAL};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error};

/// Link type whose sub types are also collected into `esource`
pub const ESOURCE_LINK_TYPE: &str = "ESOURCE";

/// Filetype whose inner keys are lifted to the top level of the record
pub const RELEVANCE: &str = "relevance";

/// Raw filetypes consumed only to derive other fields
pub const INTERMEDIATE_FIELDS: &[&str] = &[
    "author",
    "canonical",
    "citation",
    "download",
    "item_count",
    "nonarticle",
    "ocrabstract",
    "private",
    "pub_openaccess",
    "reads",
    "refereed",
    "relevance",
    "toc",
];

/// Keys owned by the typed fields of [`CanonicalRecord`]; pass-through
/// fields of the same name are discarded
pub const RESERVED_FIELDS: &[&str] = &[
    "bibcode",
    "citation_count_norm",
    "data",
    "data_links_rows",
    "esource",
    "property",
    "total_link_counts",
];

/// Result of converting one bibcode
#[derive(Debug)]
pub struct Conversion {
    pub record: CanonicalRecord,
    /// Data-quality problems found along the way; the record is still usable
    pub issues: Vec<NonbibError>,
}

/// Converts raw records using a fixed field definition table
pub struct Converter<'a> {
    defs: &'a FieldDefinitionTable,
}

/// Accumulators filled while walking the filetypes
#[derive(Default)]
struct Builder {
    rows: Vec<DataLinkRow>,
    property: BTreeSet<String>,
    esource: BTreeSet<String>,
    fields: BTreeMap<String, Value>,
    issues: Vec<NonbibError>,
}

impl<'a> Converter<'a> {
    pub fn new(defs: &'a FieldDefinitionTable) -> Self {
        Self { defs }
    }

    /// Convert one raw record into its canonical record.
    ///
    /// # Errors
    ///
    /// Fails if the record has no canonical bibcode or names a filetype the
    /// table does not define. Malformed values are reported in
    /// [`Conversion::issues`] instead.
    pub fn convert(&self, raw: &RawRecord) -> Result<Conversion> {
        let bibcode = raw.bibcode().ok_or_missing(CANONICAL)?;
        let mut acc = Builder::default();

        for (filetype, raw_value) in raw.iter() {
            let def = self.defs.get(filetype).ok_or_else(|| {
                NonbibError::FieldDefinition(format!("no definition for filetype {}", filetype))
            })?;
            let value = if def.is_flag() {
                raw_value.clone().flatten(filetype)
            } else {
                raw_value.clone()
            };
            let differs = !def.is_default(&value);

            match (def.extra_values.as_ref(), def.link_type()) {
                (Some(extra), Some(link_type)) if differs => {
                    if self.add_link_rows(bibcode, filetype, &value, def, &mut acc) {
                        if link_type == ESOURCE_LINK_TYPE {
                            if let Some(sub_type) = &extra.link_sub_type {
                                acc.esource.insert(sub_type.clone());
                            }
                        }
                        acc.property.insert(link_type.to_string());
                        acc.property.extend(extra.property.iter().cloned());
                    }
                }
                (Some(extra), None) if differs => {
                    acc.property.extend(extra.property.iter().cloned());
                }
                _ if differs || def.copy_default => {
                    acc.fields.insert(filetype.to_string(), value.to_json());
                }
                _ => {}
            }

            if filetype == RELEVANCE {
                lift_relevance(bibcode, &value, &mut acc);
            }
        }

        Ok(Conversion {
            record: finish(bibcode, raw, acc.rows, acc.property, acc.esource, acc.fields),
            issues: acc.issues,
        })
    }

    /// Append the rows for one data link value. Returns false when the value's
    /// shape is unusable and the whole field was skipped.
    fn add_link_rows(
        &self,
        bibcode: &str,
        filetype: &str,
        value: &FieldValue,
        def: &FieldDefinition,
        acc: &mut Builder,
    ) -> bool {
        let items: Vec<Value> = match value {
            FieldValue::Flag(true) | FieldValue::Scalar(_) => vec![value.to_json()],
            FieldValue::List(items) => items.clone(),
            other => {
                report(
                    acc,
                    NonbibError::MalformedField {
                        bibcode: bibcode.to_string(),
                        filetype: filetype.to_string(),
                        observed: other.type_name(),
                        value: other.to_json().to_string(),
                    },
                );
                return false;
            }
        };

        for item in &items {
            match datalinks::build_row(bibcode, filetype, item, def) {
                Ok(row) => acc.rows.push(row),
                Err(e) => report(acc, e),
            }
        }
        true
    }
}

/// Copy every key of the relevance map to the top level of the record
fn lift_relevance(bibcode: &str, value: &FieldValue, acc: &mut Builder) {
    match value {
        FieldValue::Scalar(map) => {
            for (k, v) in map {
                acc.fields.insert(k.clone(), v.clone());
            }
        }
        FieldValue::Absent => {}
        other => {
            let json = other.to_json();
            report(
                acc,
                NonbibError::MalformedField {
                    bibcode: bibcode.to_string(),
                    filetype: RELEVANCE.to_string(),
                    observed: json_type_name(&json),
                    value: json.to_string(),
                },
            );
        }
    }
}

fn report(acc: &mut Builder, issue: NonbibError) {
    error!(error = %issue, "Data quality error");
    acc.issues.push(issue);
}

/// Derived fields, applied after every filetype has been processed
fn finish(
    bibcode: &str,
    raw: &RawRecord,
    rows: Vec<DataLinkRow>,
    mut property: BTreeSet<String>,
    esource: BTreeSet<String>,
    mut fields: BTreeMap<String, Value>,
) -> CanonicalRecord {
    if !property.contains("REFEREED") {
        property.insert("NOT REFEREED".to_string());
    }
    if is_nonarticle(raw) {
        property.insert("NONARTICLE".to_string());
    } else {
        property.insert("ARTICLE".to_string());
    }

    let data_links_rows = datalinks::merge(rows);
    let (data, total_link_counts) = datalinks::data_summary(&data_links_rows);

    let citation_count = fields.get("citation_count").and_then(Value::as_f64).unwrap_or(0.0);
    let citation_count_norm = citation_count / raw.author_count().max(1) as f64;

    for key in INTERMEDIATE_FIELDS.iter().chain(RESERVED_FIELDS) {
        fields.remove(*key);
    }

    debug!(
        bibcode = bibcode,
        rows = data_links_rows.len(),
        properties = property.len(),
        "Converted record"
    );

    CanonicalRecord {
        bibcode: bibcode.to_string(),
        property: property.into_iter().collect(),
        esource: esource.into_iter().collect(),
        data_links_rows,
        data,
        total_link_counts,
        citation_count_norm,
        fields,
    }
}

/// The nonarticle flag, possibly wrapped as `{"nonarticle": bool}`
fn is_nonarticle(raw: &RawRecord) -> bool {
    raw.get("nonarticle")
        .map(|v| v.clone().flatten("nonarticle").is_true())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ExtraValues;
    use serde_json::json;

    const BIBCODE: &str = "2020ApJ...900..100X";

    fn table() -> Result<FieldDefinitionTable> {
        FieldDefinitionTable::builtin()
    }

    fn convert(raw: &RawRecord) -> Result<Conversion> {
        let defs = table()?;
        Converter::new(&defs).convert(raw)
    }

    #[test]
    fn test_defaults_are_suppressed() -> Result<()> {
        let raw = RawRecord::new(BIBCODE)
            .with("grants", json!([]))
            .with("simbad_objects", json!([]))
            .with("bibgroup", json!(["CfA"]));
        let record = convert(&raw)?.record;
        assert_eq!(record.bibcode, BIBCODE);
        assert!(record.field("grants").is_none());
        assert!(record.field("simbad_objects").is_none());
        assert_eq!(record.field("bibgroup"), Some(&json!(["CfA"])));
        Ok(())
    }

    #[test]
    fn test_copy_default_forces_copy() -> Result<()> {
        let raw = RawRecord::new(BIBCODE).with("reference", json!([]));
        let record = convert(&raw)?.record;
        assert_eq!(record.field("reference"), Some(&json!([])));
        Ok(())
    }

    #[test]
    fn test_classification_defaults() -> Result<()> {
        let record = convert(&RawRecord::new(BIBCODE))?.record;
        assert_eq!(record.property, vec!["ARTICLE", "NOT REFEREED"]);
        assert!(record.esource.is_empty());
        assert!(record.data_links_rows.is_empty());
        assert_eq!(record.total_link_counts, 0);
        Ok(())
    }

    #[test]
    fn test_refereed_and_nonarticle() -> Result<()> {
        let raw = RawRecord::new(BIBCODE)
            .with("refereed", json!({"refereed": true}))
            .with("nonarticle", json!({"nonarticle": true}));
        let record = convert(&raw)?.record;
        assert_eq!(record.property, vec!["NONARTICLE", "REFEREED"]);
        assert!(record.field("refereed").is_none());
        assert!(record.field("nonarticle").is_none());

        let bare = RawRecord::new(BIBCODE).with("nonarticle", json!(true));
        let record = convert(&bare)?.record;
        assert!(record.property.contains(&"NONARTICLE".to_string()));
        assert!(!record.property.contains(&"ARTICLE".to_string()));
        Ok(())
    }

    #[test]
    fn test_esource_links() -> Result<()> {
        let raw = RawRecord::new(BIBCODE)
            .with("PUB_PDF", json!([{"url": "http://pub/pdf", "title": "Publisher PDF"}]))
            .with("ADS_PDF", json!({"ADS_PDF": true}))
            .with("EPRINT_HTML", json!([]))
            .with("pub_openaccess", json!({"pub_openaccess": true}));
        let record = convert(&raw)?.record;

        assert_eq!(record.esource, vec!["ADS_PDF", "PUB_PDF"]);
        assert_eq!(
            record.property,
            vec!["ARTICLE", "ESOURCE", "NOT REFEREED", "OPENACCESS", "PUB_OPENACCESS"]
        );
        assert_eq!(record.data_links_rows.len(), 2);
        assert_eq!(record.data_links_rows[0].link_sub_type, "PUB_PDF");
        assert_eq!(record.data_links_rows[0].url, vec!["http://pub/pdf"]);
        assert_eq!(record.data_links_rows[0].title, vec!["Publisher PDF"]);
        assert_eq!(record.data_links_rows[1].link_sub_type, "ADS_PDF");
        assert_eq!(record.data_links_rows[1].url, vec![""]);
        assert!(record.field("ADS_PDF").is_none());
        Ok(())
    }

    #[test]
    fn test_data_links_merged_and_summarised() -> Result<()> {
        let raw = RawRecord::new(BIBCODE).with(
            "data_link",
            json!([
                {"link_sub_type": "NED", "url": ["http://ned/1"], "item_count": 1953},
                {"link_sub_type": "CDS", "url": "http://cds/1", "item_count": 1},
                {"link_sub_type": "NED", "url": ["http://ned/2"], "item_count": 2}
            ]),
        );
        let record = convert(&raw)?.record;

        assert_eq!(record.data_links_rows.len(), 2);
        let ned = &record.data_links_rows[0];
        assert_eq!(ned.url, vec!["http://ned/1", "http://ned/2"]);
        assert_eq!(ned.item_count, 1955);
        assert_eq!(record.data, vec!["CDS:1", "NED:1955"]);
        assert_eq!(record.total_link_counts, 1956);
        assert!(record.property.contains(&"DATA".to_string()));
        Ok(())
    }

    #[test]
    fn test_relevance_lifted() -> Result<()> {
        let raw = RawRecord::new(BIBCODE)
            .with("author", json!(["A", "B", "C", "D", "E"]))
            .with(
                "relevance",
                json!({"citation_count": 10, "read_count": 4, "boost": 0.3, "norm_cites": 900}),
            );
        let record = convert(&raw)?.record;
        assert_eq!(record.field("citation_count"), Some(&json!(10)));
        assert_eq!(record.field("boost"), Some(&json!(0.3)));
        assert!(record.field("relevance").is_none());
        assert!(record.field("author").is_none());
        assert!((record.citation_count_norm - 2.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_relevance_cannot_shadow_derived_fields() -> Result<()> {
        let raw = RawRecord::new(BIBCODE).with(
            "relevance",
            json!({"citation_count": 10, "citation_count_norm": 99.0, "bibcode": "OTHER", "property": ["X"]}),
        );
        let record = convert(&raw)?.record;
        assert_eq!(record.bibcode, BIBCODE);
        assert!((record.citation_count_norm - 10.0).abs() < f64::EPSILON);
        assert_eq!(record.property, vec!["ARTICLE", "NOT REFEREED"]);
        assert_eq!(record.field("citation_count"), Some(&json!(10)));
        for key in RESERVED_FIELDS {
            assert!(record.field(key).is_none(), "{} should not be a pass-through field", key);
        }

        let line = serde_json::to_string(&record)?;
        assert_eq!(line.matches("\"bibcode\"").count(), 1);
        let reread: CanonicalRecord = serde_json::from_str(&line)?;
        assert_eq!(reread, record);
        Ok(())
    }

    #[test]
    fn test_citation_count_norm_without_authors() -> Result<()> {
        let raw = RawRecord::new(BIBCODE)
            .with("author", json!([]))
            .with("relevance", json!({"citation_count": 7}));
        let record = convert(&raw)?.record;
        assert!((record.citation_count_norm - 7.0).abs() < f64::EPSILON);

        let record = convert(&RawRecord::new(BIBCODE))?.record;
        assert_eq!(record.citation_count_norm, 0.0);
        Ok(())
    }

    #[test]
    fn test_intermediate_fields_dropped() -> Result<()> {
        let raw = RawRecord::new(BIBCODE)
            .with("reads", json!([1, 2, 3]))
            .with("download", json!([0, 1]))
            .with("citation", json!(["2021AJ....1..1A"]))
            .with("ned_objects", json!(["M31"]));
        let record = convert(&raw)?.record;
        for key in INTERMEDIATE_FIELDS {
            assert!(record.field(key).is_none(), "{} should be dropped", key);
        }
        assert_eq!(record.field("ned_objects"), Some(&json!(["M31"])));
        Ok(())
    }

    #[test]
    fn test_malformed_link_value_reported() -> Result<()> {
        let raw = RawRecord::new(BIBCODE)
            .with("data_link", json!(42))
            .with("PUB_PDF", json!([{"url": "http://pub/pdf"}]));
        let conversion = convert(&raw)?;

        assert_eq!(conversion.issues.len(), 1);
        assert!(matches!(
            &conversion.issues[0],
            NonbibError::MalformedField { filetype, observed: "number", .. } if filetype == "data_link"
        ));
        let record = conversion.record;
        assert_eq!(record.data_links_rows.len(), 1);
        assert!(!record.property.contains(&"DATA".to_string()));
        assert!(record.property.contains(&"ESOURCE".to_string()));
        Ok(())
    }

    #[test]
    fn test_false_flag_on_list_link_is_malformed() -> Result<()> {
        let raw = RawRecord::new(BIBCODE).with("PUB_PDF", json!(false));
        let conversion = convert(&raw)?;

        assert_eq!(conversion.issues.len(), 1);
        assert!(matches!(
            &conversion.issues[0],
            NonbibError::MalformedField { filetype, observed: "flag", .. } if filetype == "PUB_PDF"
        ));
        let record = conversion.record;
        assert!(record.data_links_rows.is_empty());
        assert!(record.esource.is_empty());
        assert_eq!(record.property, vec!["ARTICLE", "NOT REFEREED"]);
        assert!(record.field("PUB_PDF").is_none());
        Ok(())
    }

    #[test]
    fn test_malformed_list_item_skipped() -> Result<()> {
        let raw = RawRecord::new(BIBCODE).with(
            "data_link",
            json!([{"link_sub_type": "CDS", "item_count": 2}, "oops"]),
        );
        let conversion = convert(&raw)?;
        assert_eq!(conversion.issues.len(), 1);
        assert_eq!(conversion.record.data, vec!["CDS:2"]);
        Ok(())
    }

    #[test]
    fn test_unknown_filetype_is_fatal() -> Result<()> {
        let raw = RawRecord::new(BIBCODE).with("mystery", json!(1));
        assert!(matches!(convert(&raw), Err(NonbibError::FieldDefinition(_))));
        Ok(())
    }

    #[test]
    fn test_missing_canonical_is_fatal() -> Result<()> {
        let defs = table()?;
        let mut raw = RawRecord::default();
        raw.insert("reads", FieldValue::List(vec![]));
        assert!(matches!(
            Converter::new(&defs).convert(&raw),
            Err(NonbibError::MissingField(_))
        ));
        Ok(())
    }

    #[test]
    fn test_property_only_field() -> Result<()> {
        let mut defs = FieldDefinitionTable::builtin()?;
        defs.insert(
            "ocrabstract",
            FieldDefinition::new(json!(false)).with_extra(ExtraValues {
                property: ["OCRABSTRACT".to_string()].into_iter().collect(),
                ..Default::default()
            }),
        );
        let raw = RawRecord::new(BIBCODE).with("ocrabstract", json!(true));
        let record = Converter::new(&defs).convert(&raw)?.record;
        assert!(record.property.contains(&"OCRABSTRACT".to_string()));
        assert!(record.data_links_rows.is_empty());
        assert!(record.field("ocrabstract").is_none());
        Ok(())
    }

    #[test]
    fn test_property_sorted_and_unique() -> Result<()> {
        let raw = RawRecord::new(BIBCODE)
            .with("pub_openaccess", json!(true))
            .with("eprint_openaccess", json!(true))
            .with("EPRINT_PDF", json!([{"url": "e1"}, {"url": "e2"}]))
            .with("PUB_HTML", json!([{"url": "h"}]));
        let record = convert(&raw)?.record;
        let mut sorted = record.property.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(record.property, sorted);
        assert_eq!(record.esource, vec!["EPRINT_PDF", "PUB_HTML"]);
        assert_eq!(record.data_links_rows[0].url, vec!["e1", "e2"]);
        Ok(())
    }
}
