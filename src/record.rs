//! Canonical aptamer record shape and its admission rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One experimentally reported nucleic-acid ligand binding entry.
///
/// All fields are plain owned data and never mutated after construction; the
/// loaded collection can be shared freely across threads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AptamerRecord {
    pub article_title: String,
    pub year: String,
    pub journal: String,
    pub doi: String,
    pub target_name: String,
    pub target_type: String,
    pub sequence_id: String,
    pub sequence: String,
    pub affinity: String,
    pub buffer_condition: String,
    pub best: bool,
    pub external_id: String,
    pub external_name: String,
    pub gene_symbol: String,
    pub id_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Which matching tier produced a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Contains,
    TokenOverlap,
}

/// An [`AptamerRecord`] annotated with how and how well it matched.
///
/// Serializes flat: record fields at the top level alongside the score and
/// strategy annotations, which is the wire shape existing clients consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub record: AptamerRecord,
    pub score: f64,
    pub match_strategy: MatchStrategy,
    pub normalized_query: String,
}

/// Aggregate entry of the target listing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub target: String,
    pub count: usize,
}

fn text_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

fn bool_field(obj: &serde_json::Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

// Never coerced to 0: an absent pKd means "not reported", while 0 is a
// meaningful affinity value. Unparseable text stays absent rather than NaN.
fn pkd_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn level_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if text.is_empty() { None } else { Some(text) }
        }
    }
}

/// Coerces one parsed JSONL line into the canonical record shape.
///
/// Returns `None` when the raw value is not object-shaped; never panics.
pub fn to_record(raw: &Value) -> Option<AptamerRecord> {
    let obj = raw.as_object()?;
    Some(AptamerRecord {
        article_title: text_field(obj, "Article title"),
        year: text_field(obj, "Year"),
        journal: text_field(obj, "Journal"),
        doi: text_field(obj, "Doi"),
        target_name: text_field(obj, "Target name"),
        target_type: text_field(obj, "Target type"),
        sequence_id: text_field(obj, "Sequence ID"),
        sequence: text_field(obj, "Aptamer sequence"),
        affinity: text_field(obj, "Affinity"),
        buffer_condition: text_field(obj, "Buffer condition"),
        best: bool_field(obj, "Best"),
        external_id: text_field(obj, "External_ID"),
        external_name: text_field(obj, "External_Name"),
        gene_symbol: text_field(obj, "Gene_Symbol"),
        id_type: text_field(obj, "ID_Type"),
        pkd: pkd_field(obj, "pKd"),
        level: level_field(obj, "Level"),
    })
}

/// Admissibility invariant: provenance and identity fields must be present.
pub fn validate_record(rec: &AptamerRecord) -> bool {
    !rec.article_title.is_empty()
        && !rec.doi.is_empty()
        && !rec.target_name.is_empty()
        && !rec.sequence_id.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_raw() -> Value {
        json!({
            "Article title": "Selection of single-stranded DNA molecules that bind thrombin",
            "Year": 1992,
            "Journal": "Nature",
            "Doi": "10.1038/355564a0",
            "Target name": "Thrombin",
            "Target type": "Protein",
            "Sequence ID": "TBA",
            "Aptamer sequence": "GGTTGGTGTGGTTGG",
            "Affinity": "25 nM",
            "Buffer condition": "PBS",
            "Best": true,
            "External_ID": "APT-001",
            "External_Name": "Thrombin aptamer",
            "Gene_Symbol": "F2",
            "ID_Type": "aptagen",
            "pKd": 7.6,
            "Level": "P"
        })
    }

    #[test]
    fn coerces_full_record() {
        let rec = to_record(&full_raw()).expect("record from object");
        assert!(rec.article_title.starts_with("Selection"));
        assert_eq!(rec.year, "1992");
        assert_eq!(rec.doi, "10.1038/355564a0");
        assert_eq!(rec.target_name, "Thrombin");
        assert_eq!(rec.sequence_id, "TBA");
        assert!(rec.best);
        assert_eq!(rec.pkd, Some(7.6));
        assert_eq!(rec.level.as_deref(), Some("P"));
        assert!(validate_record(&rec));
    }

    #[test]
    fn non_object_input_yields_none() {
        assert!(to_record(&json!("just a string")).is_none());
        assert!(to_record(&json!([1, 2, 3])).is_none());
        assert!(to_record(&json!(null)).is_none());
    }

    #[test]
    fn missing_fields_become_empty_strings() {
        let rec = to_record(&json!({})).expect("record from empty object");
        assert_eq!(rec.article_title, "");
        assert_eq!(rec.doi, "");
        assert!(!rec.best);
        assert_eq!(rec.pkd, None);
        assert_eq!(rec.level, None);
        assert!(!validate_record(&rec));
    }

    #[test]
    fn pkd_zero_is_preserved_not_dropped() {
        let rec = to_record(&json!({ "pKd": 0 })).expect("record");
        assert_eq!(rec.pkd, Some(0.0));
        let rec = to_record(&json!({ "pKd": "0" })).expect("record");
        assert_eq!(rec.pkd, Some(0.0));
    }

    #[test]
    fn pkd_empty_or_unparseable_stays_absent() {
        let rec = to_record(&json!({ "pKd": "" })).expect("record");
        assert_eq!(rec.pkd, None);
        let rec = to_record(&json!({ "pKd": "n.d." })).expect("record");
        assert_eq!(rec.pkd, None);
        let rec = to_record(&json!({ "pKd": "9.2" })).expect("record");
        assert_eq!(rec.pkd, Some(9.2));
    }

    #[test]
    fn best_coercion_is_truthy() {
        let rec = to_record(&json!({ "Best": 1 })).expect("record");
        assert!(rec.best);
        let rec = to_record(&json!({ "Best": 0 })).expect("record");
        assert!(!rec.best);
        let rec = to_record(&json!({ "Best": "yes" })).expect("record");
        assert!(rec.best);
        let rec = to_record(&json!({ "Best": "" })).expect("record");
        assert!(!rec.best);
    }

    #[test]
    fn empty_level_stays_absent() {
        let rec = to_record(&json!({ "Level": "" })).expect("record");
        assert_eq!(rec.level, None);
        let rec = to_record(&json!({ "Level": "B" })).expect("record");
        assert_eq!(rec.level.as_deref(), Some("B"));
    }

    #[test]
    fn validation_rejects_missing_doi() {
        let mut raw = full_raw();
        raw.as_object_mut()
            .expect("object")
            .insert("Doi".to_string(), json!(""));
        let rec = to_record(&raw).expect("record");
        assert!(!validate_record(&rec));
    }

    #[test]
    fn search_result_serializes_flat() {
        let rec = to_record(&full_raw()).expect("record");
        let result = SearchResult {
            record: rec,
            score: 1.0,
            match_strategy: MatchStrategy::Exact,
            normalized_query: "thrombin".to_string(),
        };
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["target_name"], "Thrombin");
        assert_eq!(value["score"], 1.0);
        assert_eq!(value["match_strategy"], "exact");
        assert_eq!(value["normalized_query"], "thrombin");
    }
}
