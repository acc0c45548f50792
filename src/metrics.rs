//! Citation metrics computation.
//!
//! For a bibcode with publication year `pubyear` and citing papers `c`:
//!
//! - `rn_citations` is the sum over `c` of `1 / max(5, references(c))`
//! - `an_citations` is `citations / max(1, current_year - pubyear + 1)`
//! - `an_refereed_citations` is the same using refereed citations only

use crate::bibcode;
use crate::error::{NonbibError, OptionExt, Result};
use crate::field::FieldValue;
use crate::record::{CitationDetail, MetricsRecord, RawRecord, CANONICAL};
use crate::snapshot::CitationIndex;
use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use tracing::debug;

/// Citing papers with fewer references than this count as having this many
const MIN_REFERENCE_NORM: usize = 5;

/// Compute the metrics record for one bibcode.
///
/// `now` is stamped as `modtime` and supplies the current year.
///
/// # Errors
///
/// Fails if the bibcode or a citing bibcode has no leading year, or if the
/// reads/download values are not integer lists.
pub fn compute<I: CitationIndex + ?Sized>(raw: &RawRecord, index: &I, now: DateTime<Utc>) -> Result<MetricsRecord> {
    let bibcode = raw.bibcode().ok_or_missing(CANONICAL)?;
    let pubyear = bibcode::year(bibcode)?;
    let author_num = raw.author_count().max(1);
    let auth_norm = 1.0 / author_num as f64;

    let citations: Vec<String> = index.citing(bibcode).to_vec();
    let mut refereed_citations = Vec::new();
    let mut rn_citation_data = Vec::with_capacity(citations.len());
    let mut rn_citations = 0.0;

    for citing in &citations {
        let len_ref = index.referenced(citing).len();
        let ref_norm = 1.0 / len_ref.max(MIN_REFERENCE_NORM) as f64;
        rn_citations += ref_norm;
        rn_citation_data.push(CitationDetail {
            bibcode: citing.clone(),
            ref_norm,
            auth_norm,
            pubyear,
            cityear: bibcode::year(citing)?,
        });
        if index.is_refereed(citing) {
            refereed_citations.push(citing.clone());
        }
    }

    let resource_age = (now.year() - pubyear + 1).max(1) as f64;
    let citation_num = citations.len();
    let refereed_citation_num = refereed_citations.len();

    debug!(
        bibcode = bibcode,
        citations = citation_num,
        refereed_citations = refereed_citation_num,
        rn_citations = rn_citations,
        "Computed metrics"
    );

    Ok(MetricsRecord {
        bibcode: bibcode.to_string(),
        an_citations: citation_num as f64 / resource_age,
        an_refereed_citations: refereed_citation_num as f64 / resource_age,
        author_num: author_num as u32,
        citation_num: citation_num as u32,
        citations,
        downloads: int_list(raw, bibcode, "download")?,
        modtime: now,
        reads: int_list(raw, bibcode, "reads")?,
        refereed: index.is_refereed(bibcode),
        refereed_citations,
        refereed_citation_num: refereed_citation_num as u32,
        reference_num: index.referenced(bibcode).len() as u32,
        rn_citations,
        rn_citation_data,
    })
}

/// Integer list carried through from the raw record; absent means empty
fn int_list(raw: &RawRecord, bibcode: &str, filetype: &str) -> Result<Vec<i64>> {
    let malformed = |value: &FieldValue| NonbibError::MalformedField {
        bibcode: bibcode.to_string(),
        filetype: filetype.to_string(),
        observed: value.type_name(),
        value: value.to_json().to_string(),
    };
    match raw.get(filetype) {
        None | Some(FieldValue::Absent) => Ok(Vec::new()),
        Some(value) => match value {
            FieldValue::List(items) => items
                .iter()
                .map(|v| match v {
                    Value::Number(n) => n.as_i64().ok_or_else(|| malformed(value)),
                    _ => Err(malformed(value)),
                })
                .collect(),
            other => Err(malformed(other)),
        },
    }
}
