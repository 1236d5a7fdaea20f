//! Tracks per-sample best scores and the non-dominated candidate set across an
//! optimization run.
//!
//! Per-sample bests are kept in a flat `best`/`best_candidates` pair indexed by
//! sample position, and the frontier itself is a coverage-pruned map keyed by
//! candidate id. Dominance is evaluated over whatever dimensions are configured at
//! runtime rather than a fixed scalar metric, so the same frontier works whether a
//! run scores one dimension or a dozen.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;

use crate::config::{DimensionSet, SelectorKind};
use crate::judge::MetricScores;

/// A scored prompt candidate along with the lineage that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptCandidate {
    pub id: String,
    pub prompt: String,
    pub metrics: MetricScores,
    pub overall_score: f64,
    pub parents: Vec<String>,
    pub discovered_at_iteration: u32,
}

pub const SEED_CANDIDATE_ID: &str = "seed";

impl PromptCandidate {
    /// `A` dominates `B` over `dimensions` iff `A.metrics[d] >= B.metrics[d]` for
    /// every active dimension `d`, with strict inequality on at least one.
    /// Dimensions absent from either candidate's metrics are excluded from the
    /// comparison entirely, consistent with missing-as-absent aggregation.
    pub fn dominates(&self, other: &Self, dimensions: &DimensionSet) -> bool {
        let mut any_strict = false;
        for (name, _) in dimensions.iter() {
            let (Some(a), Some(b)) = (self.metrics.get(name), other.metrics.get(name)) else {
                continue;
            };
            if a < b {
                return false;
            }
            if a > b {
                any_strict = true;
            }
        }
        any_strict
    }
}

/// Per-sample best tracking plus the non-dominated candidate set, keyed by opaque
/// candidate id.
pub struct ParetoFrontier {
    /// `best[i]`: highest overall score observed for sample `i`.
    best: Vec<f64>,
    /// `bestCandidates[i]`: ids tied at `best[i]`.
    best_candidates: Vec<BTreeSet<String>>,
    /// The non-dominated candidate set, by id.
    frontier: BTreeMap<String, PromptCandidate>,
    /// Every candidate ever added, by id, insertion order preserved via `order`.
    all_candidates: BTreeMap<String, PromptCandidate>,
    order: Vec<String>,
}

impl ParetoFrontier {
    pub fn new(sample_count: usize) -> Self {
        Self {
            best: vec![f64::MIN; sample_count],
            best_candidates: vec![BTreeSet::new(); sample_count],
            frontier: BTreeMap::new(),
            all_candidates: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Records a candidate's per-sample overall scores against the running best.
    pub fn observe(&mut self, candidate_id: &str, per_sample_overall: &[f64]) {
        for (i, &score) in per_sample_overall.iter().enumerate() {
            if score > self.best[i] {
                self.best[i] = score;
                self.best_candidates[i].clear();
                self.best_candidates[i].insert(candidate_id.to_string());
            } else if (score - self.best[i]).abs() < f64::EPSILON {
                self.best_candidates[i].insert(candidate_id.to_string());
            }
        }
    }

    /// Inserts `candidate` into the frontier, removing any existing member it
    /// dominates, and skipping insertion if any existing member dominates it.
    pub fn update_frontier(&mut self, candidate: PromptCandidate, dimensions: &DimensionSet) {
        let dominated_by_existing = self
            .frontier
            .values()
            .any(|existing| existing.dominates(&candidate, dimensions));

        self.frontier
            .retain(|_, existing| !candidate.dominates(existing, dimensions));

        if !dominated_by_existing {
            self.frontier.insert(candidate.id.clone(), candidate.clone());
        }

        self.order.push(candidate.id.clone());
        self.all_candidates.insert(candidate.id.clone(), candidate);
    }

    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    pub fn contains_in_frontier(&self, id: &str) -> bool {
        self.frontier.contains_key(id)
    }

    pub fn candidates_in_order(&self) -> Vec<&PromptCandidate> {
        self.order
            .iter()
            .filter_map(|id| self.all_candidates.get(id))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&PromptCandidate> {
        self.all_candidates.get(id)
    }

    /// Returns the candidate to use as the next iteration's parent, per the
    /// configured selector. `current_best` picks the highest `overall_score` ever
    /// added; `pareto` uniformly samples from the union of all `bestCandidates[i]`.
    pub fn select(&self, selector: SelectorKind) -> Option<&PromptCandidate> {
        match selector {
            SelectorKind::CurrentBest => self
                .all_candidates
                .values()
                .max_by(|a, b| a.overall_score.total_cmp(&b.overall_score)),
            SelectorKind::Pareto => {
                let union: BTreeSet<&String> = self.best_candidates.iter().flatten().collect();
                let pool: Vec<&String> = union.into_iter().collect();
                let mut rng = rand::thread_rng();
                pool.choose(&mut rng)
                    .and_then(|id| self.all_candidates.get(id.as_str()))
            }
        }
    }
}
