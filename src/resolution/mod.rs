//! Entity resolution: turn judged candidate pairs into merged mention
//! clusters.
//!
//! Same-verdicts feed a union-find; each resulting cluster collapses into its
//! first-inserted member, which keeps that mention's name and type, gathers
//! the deduplicated descriptions of the whole cluster, and unions all source
//! references. Unknown verdicts never merge — an oracle outage can only
//! under-merge, never corrupt.

pub mod union_find;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::graph::{MentionId, MentionSet, DESCRIPTION_SEPARATOR};
use crate::oracle::{ExtractionOracle, Verdict};
use crate::similarity::CandidatePair;
use union_find::UnionFind;

/// One candidate pair after judgment, kept for the artifact log.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgedPair {
    pub a_name: String,
    pub b_name: String,
    pub score: f32,
    pub verdict: Verdict,
}

/// What happened during one resolution pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResolutionReport {
    /// Candidate pairs put to the judge.
    pub candidates: usize,
    /// Pairs confirmed as the same entity.
    pub confirmed: usize,
    /// Pairs the judge could not answer (left unmerged).
    pub unknown: usize,
    /// Mentions absorbed into a survivor.
    pub merged: usize,
    /// Absorbed mention name → surviving mention name.
    pub merged_names: BTreeMap<String, String>,
    /// Every judged pair, in judgment order.
    pub judged: Vec<JudgedPair>,
}

/// Judge every candidate pair and merge confirmed clusters in place.
pub async fn resolve<O: ExtractionOracle>(
    oracle: &O,
    mentions: &mut MentionSet,
    pairs: &[CandidatePair],
) -> ResolutionReport {
    let mut report = ResolutionReport {
        candidates: pairs.len(),
        ..ResolutionReport::default()
    };

    let mut uf = UnionFind::new(mentions.capacity());
    for pair in pairs {
        let (Some(a), Some(b)) = (mentions.get(pair.a), mentions.get(pair.b)) else {
            continue;
        };
        let verdict = oracle.judge_same(a, b).await;
        match verdict {
            Verdict::Same => {
                report.confirmed += 1;
                uf.union(pair.a, pair.b);
            }
            Verdict::Different => {}
            Verdict::Unknown => report.unknown += 1,
        }
        debug!(a = %a.name, b = %b.name, score = pair.score, ?verdict, "candidate judged");
        report.judged.push(JudgedPair {
            a_name: a.name.clone(),
            b_name: b.name.clone(),
            score: pair.score,
            verdict,
        });
    }

    // Group live ids by root; insertion order makes the lowest id the first
    // member, which is the survivor.
    let mut clusters: BTreeMap<usize, Vec<MentionId>> = BTreeMap::new();
    for id in mentions.ids() {
        clusters.entry(uf.find(id)).or_default().push(id);
    }

    for members in clusters.values() {
        if members.len() < 2 {
            continue;
        }
        merge_cluster(mentions, members, &mut report);
    }

    info!(
        candidates = report.candidates,
        confirmed = report.confirmed,
        unknown = report.unknown,
        merged = report.merged,
        "entity resolution complete"
    );
    report
}

/// Collapse a cluster into its first member.
fn merge_cluster(mentions: &mut MentionSet, members: &[MentionId], report: &mut ResolutionReport) {
    let survivor_id = members[0];
    let survivor_name = match mentions.get(survivor_id) {
        Some(m) => m.name.clone(),
        None => return,
    };

    let mut descriptions: Vec<String> = Vec::new();
    let mut push_segments = |text: &str| {
        for segment in text.split(DESCRIPTION_SEPARATOR) {
            let segment = segment.trim();
            if !segment.is_empty() && !descriptions.iter().any(|d| d == segment) {
                descriptions.push(segment.to_string());
            }
        }
    };

    if let Some(survivor) = mentions.get(survivor_id) {
        push_segments(&survivor.description.clone());
    }

    let mut absorbed_refs = Vec::new();
    for &id in &members[1..] {
        if let Some(absorbed) = mentions.remove(id) {
            push_segments(&absorbed.description);
            absorbed_refs.extend(absorbed.source_refs);
            report.merged += 1;
            report
                .merged_names
                .insert(absorbed.name, survivor_name.clone());
        }
    }

    if let Some(survivor) = mentions.get_mut(survivor_id) {
        survivor.description = descriptions.join(DESCRIPTION_SEPARATOR);
        survivor.source_refs.extend(absorbed_refs);
    }
}
