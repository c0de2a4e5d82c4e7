//! Presentation-side aggregation: records bucketed per target with
//! tier-based preview selection. Thin sort-and-slice over loaded data; the
//! fuzzy matching engine is deliberately not involved here.

use crate::record::AptamerRecord;
use serde::Serialize;
use std::collections::HashMap;

const PREVIEW_TOP_COUNT: usize = 5;
const PREVIEW_RECENT_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PreviewTier {
    P,
    A,
    Bc,
}

/// One target's records with per-tier counts and a preview subset.
#[derive(Debug, Clone, Serialize)]
pub struct TargetGroup {
    pub target_name: String,
    pub target_type: String,
    pub gene_symbol: String,
    pub total_aptamers: usize,
    #[serde(rename = "count_P")]
    pub count_p: usize,
    #[serde(rename = "count_A")]
    pub count_a: usize,
    #[serde(rename = "count_B")]
    pub count_b: usize,
    #[serde(rename = "count_C")]
    pub count_c: usize,
    pub year_min: i32,
    pub year_max: i32,
    pub records: Vec<AptamerRecord>,
    pub preview_records: Vec<AptamerRecord>,
    pub preview_type: PreviewTier,
}

fn parsed_year(rec: &AptamerRecord) -> Option<i32> {
    rec.year.trim().parse::<i32>().ok()
}

fn level_is(rec: &AptamerRecord, tier: &str) -> bool {
    rec.level.as_deref() == Some(tier)
}

// This consumer treats a missing pKd as 0 so unreported entries sink to the
// bottom of the preview instead of vanishing; the engine's top_by_pkd
// excludes them instead.
fn top_by_pkd_or_zero(records: &[AptamerRecord], n: usize) -> Vec<AptamerRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        b.pkd
            .unwrap_or(0.0)
            .total_cmp(&a.pkd.unwrap_or(0.0))
    });
    sorted.truncate(n);
    sorted
}

fn most_recent(records: &[AptamerRecord], n: usize) -> Vec<AptamerRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|rec| std::cmp::Reverse(parsed_year(rec).unwrap_or(0)));
    sorted.truncate(n);
    sorted
}

fn build_group(target_name: String, records: Vec<AptamerRecord>) -> Option<TargetGroup> {
    let first = records.first()?.clone();
    let p: Vec<AptamerRecord> = records.iter().filter(|r| level_is(r, "P")).cloned().collect();
    let a: Vec<AptamerRecord> = records.iter().filter(|r| level_is(r, "A")).cloned().collect();
    let b: Vec<AptamerRecord> = records.iter().filter(|r| level_is(r, "B")).cloned().collect();
    let c: Vec<AptamerRecord> = records.iter().filter(|r| level_is(r, "C")).cloned().collect();

    let years: Vec<i32> = records.iter().filter_map(parsed_year).collect();
    let year_min = years.iter().min().copied().unwrap_or(0);
    let year_max = years.iter().max().copied().unwrap_or(0);

    let (preview_records, preview_type) = if !p.is_empty() {
        (top_by_pkd_or_zero(&p, PREVIEW_TOP_COUNT), PreviewTier::P)
    } else if !a.is_empty() {
        (top_by_pkd_or_zero(&a, PREVIEW_TOP_COUNT), PreviewTier::A)
    } else {
        let mut bc = b.clone();
        bc.extend(c.iter().cloned());
        (most_recent(&bc, PREVIEW_RECENT_COUNT), PreviewTier::Bc)
    };

    Some(TargetGroup {
        target_name,
        target_type: if first.target_type.is_empty() {
            "Unknown".to_string()
        } else {
            first.target_type.clone()
        },
        gene_symbol: first.gene_symbol.clone(),
        total_aptamers: records.len(),
        count_p: p.len(),
        count_a: a.len(),
        count_b: b.len(),
        count_c: c.len(),
        year_min,
        year_max,
        records,
        preview_records,
        preview_type,
    })
}

/// Filters by a raw case-insensitive substring over name, gene symbol,
/// sequence, and sequence id, then groups by exact target name.
///
/// Grouping is on the raw (non-normalized) name; the first record of each
/// group supplies the representative metadata. Groups come back sorted by
/// size descending, first-seen order on ties.
pub fn group_by_target(records: &[AptamerRecord], query: &str) -> Vec<TargetGroup> {
    let needle = query.trim().to_lowercase();
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<AptamerRecord>> = HashMap::new();
    for rec in records {
        if !needle.is_empty()
            && !rec.target_name.to_lowercase().contains(&needle)
            && !rec.gene_symbol.to_lowercase().contains(&needle)
            && !rec.sequence.to_lowercase().contains(&needle)
            && !rec.sequence_id.to_lowercase().contains(&needle)
        {
            continue;
        }
        let key = if rec.target_name.is_empty() {
            "Unknown Target".to_string()
        } else {
            rec.target_name.clone()
        };
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        buckets.entry(key).or_default().push(rec.clone());
    }
    let mut groups: Vec<TargetGroup> = order
        .into_iter()
        .filter_map(|name| {
            let members = buckets.remove(&name)?;
            build_group(name, members)
        })
        .collect();
    groups.sort_by(|a, b| b.total_aptamers.cmp(&a.total_aptamers));
    groups
}
