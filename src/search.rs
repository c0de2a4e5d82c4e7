//! Match & rank engine over the loaded aptamer collection.
//!
//! Every operation is a pure read-only pass over a borrowed record slice:
//! no I/O, no hidden state, no panics. Unmatched queries yield empty
//! vectors, never errors. The collection is injected per call; nothing here
//! holds a global snapshot.

use crate::normalize::{expand_synonyms, normalize_text};
use crate::record::{AptamerRecord, MatchStrategy, SearchResult, TargetSummary};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_TOP_N: usize = 3;

const SCORE_EXACT: f64 = 1.0;
const SCORE_CONTAINS: f64 = 0.8;

/// Ranks every record against a query using a three-tier strategy.
///
/// Tier order per record, best outcome kept: exact candidate equality
/// (score 1.0, short-circuits since no later candidate can beat it),
/// candidate substring containment (score 0.8), then token overlap against
/// the primary normalized query (score = shared tokens / target tokens).
/// The matched pool is stably sorted by score descending, so equal scores
/// keep original collection order, and sliced to `[offset, offset+limit)`.
pub fn search_by_target(
    records: &[AptamerRecord],
    query: &str,
    limit: usize,
    offset: usize,
) -> Vec<SearchResult> {
    let candidates = expand_synonyms(query);
    let primary = candidates
        .first()
        .cloned()
        .unwrap_or_else(|| normalize_text(query));
    let primary_tokens: HashSet<&str> = primary.split_whitespace().collect();

    let mut pool: Vec<SearchResult> = Vec::new();
    for rec in records {
        let target = normalize_text(&rec.target_name);
        let mut matched = false;
        let mut score = 0.0;
        let mut strategy = MatchStrategy::TokenOverlap;
        for candidate in &candidates {
            if target == *candidate {
                matched = true;
                score = SCORE_EXACT;
                strategy = MatchStrategy::Exact;
                break;
            }
            if !matched && target.contains(candidate.as_str()) {
                matched = true;
                score = SCORE_CONTAINS;
                strategy = MatchStrategy::Contains;
            }
        }
        if !matched && !primary_tokens.is_empty() {
            let target_tokens: HashSet<&str> = target.split_whitespace().collect();
            let overlap = primary_tokens
                .iter()
                .filter(|token| target_tokens.contains(**token))
                .count();
            if overlap > 0 {
                matched = true;
                score = overlap as f64 / target_tokens.len().max(1) as f64;
                strategy = MatchStrategy::TokenOverlap;
            }
        }
        if matched {
            pool.push(SearchResult {
                record: rec.clone(),
                score,
                match_strategy: strategy,
                normalized_query: primary.clone(),
            });
        }
    }

    pool.sort_by(|a, b| b.score.total_cmp(&a.score));
    pool.into_iter().skip(offset).take(limit).collect()
}

/// All records from one publication. Exact match on normalized DOI only;
/// one paper legitimately reports many aptamers.
pub fn get_by_doi(records: &[AptamerRecord], doi: &str) -> Vec<AptamerRecord> {
    let needle = normalize_text(doi);
    records
        .iter()
        .filter(|rec| normalize_text(&rec.doi) == needle)
        .cloned()
        .collect()
}

/// All records carrying the given external accession identifier.
pub fn get_by_external_id(records: &[AptamerRecord], id: &str) -> Vec<AptamerRecord> {
    let needle = normalize_text(id);
    records
        .iter()
        .filter(|rec| normalize_text(&rec.external_id) == needle)
        .cloned()
        .collect()
}

/// Groups records by normalized target name with occurrence counts.
///
/// The optional query filters by plain substring on the normalized target
/// text; no synonym expansion, no fuzzy tiers. Sorted by count descending;
/// ties keep first-seen order in the collection.
pub fn list_targets(records: &[AptamerRecord], query: Option<&str>) -> Vec<TargetSummary> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for rec in records {
        let key = normalize_text(&rec.target_name);
        if let Some(n) = counts.get_mut(&key) {
            *n += 1;
        } else {
            counts.insert(key.clone(), 1);
            order.push(key);
        }
    }
    let mut summaries: Vec<TargetSummary> = order
        .into_iter()
        .map(|target| {
            let count = counts.get(&target).copied().unwrap_or(0);
            TargetSummary { target, count }
        })
        .collect();
    if let Some(query) = query {
        let needle = normalize_text(query);
        summaries.retain(|summary| summary.target.contains(&needle));
    }
    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Strongest binders for a target: matched records with a reported pKd,
/// sorted descending, first `top_n`.
///
/// Runs over the full matched pool with no internal cap, so a true top
/// binder can never be silently truncated away. Records without a pKd are
/// excluded, never treated as zero.
pub fn top_by_pkd(records: &[AptamerRecord], query: &str, top_n: usize) -> Vec<AptamerRecord> {
    let mut hits = search_by_target(records, query, usize::MAX, 0);
    hits.retain(|hit| hit.record.pkd.is_some());
    hits.sort_by(|a, b| {
        let pa = a.record.pkd.unwrap_or(f64::NEG_INFINITY);
        let pb = b.record.pkd.unwrap_or(f64::NEG_INFINITY);
        pb.total_cmp(&pa)
    });
    hits.into_iter()
        .take(top_n)
        .map(|hit| hit.record)
        .collect()
}
