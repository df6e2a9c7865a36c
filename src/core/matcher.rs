use crate::core::normalize::{derive_keys, normalize, AddressKey};
use crate::core::similarity::similarity_ratio;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Two raw addresses whose normalized forms are identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactMatch {
    pub address_a: String,
    pub address_b: String,
    pub normalized: String,
}

/// Two addresses judged equivalent with `threshold <= score < 1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatch {
    pub address_a: String,
    pub address_b: String,
    pub score: f64,
}

impl FuzzyMatch {
    pub fn formatted_score(&self) -> String {
        format!("{:.4}", self.score)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    /// Accepted fuzzy pairs, highest score first.
    pub fuzzy: Vec<FuzzyMatch>,
    /// Normalized-equal pairs. Pairing is one-to-one, so when one side holds
    /// more variants of the same address the surplus stays unmatched.
    pub exact: Vec<ExactMatch>,
    /// Unique non-blank addresses seen on each side.
    pub total_a: usize,
    pub total_b: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub total_a: usize,
    pub total_b: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub matched_a: usize,
    pub matched_b: usize,
    pub unmatched_a: usize,
    pub unmatched_b: usize,
    /// Share of set B (the reference side) that found a partner, in percent.
    pub match_percentage: f64,
}

impl MatchResult {
    pub fn summary(&self) -> MatchSummary {
        let matched = self.exact.len() + self.fuzzy.len();
        let match_percentage = if self.total_b > 0 {
            matched as f64 / self.total_b as f64 * 100.0
        } else {
            0.0
        };

        MatchSummary {
            total_a: self.total_a,
            total_b: self.total_b,
            exact_matches: self.exact.len(),
            fuzzy_matches: self.fuzzy.len(),
            matched_a: matched,
            matched_b: matched,
            unmatched_a: self.total_a.saturating_sub(matched),
            unmatched_b: self.total_b.saturating_sub(matched),
            match_percentage,
        }
    }

    /// Addresses of set A that ended up in neither list.
    pub fn unmatched_a<'a>(&self, set_a: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let used: BTreeSet<&str> = self
            .exact
            .iter()
            .map(|m| m.address_a.as_str())
            .chain(self.fuzzy.iter().map(|m| m.address_a.as_str()))
            .collect();
        unique_addresses(set_a)
            .into_iter()
            .filter(|a| !used.contains(a))
            .map(str::to_string)
            .collect()
    }

    /// Addresses of set B that ended up in neither list.
    pub fn unmatched_b<'a>(&self, set_b: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let used: BTreeSet<&str> = self
            .exact
            .iter()
            .map(|m| m.address_b.as_str())
            .chain(self.fuzzy.iter().map(|m| m.address_b.as_str()))
            .collect();
        unique_addresses(set_b)
            .into_iter()
            .filter(|b| !used.contains(b))
            .map(str::to_string)
            .collect()
    }
}

struct Prepared<'a> {
    original: &'a str,
    normalized: String,
}

fn unique_addresses<'a>(addresses: impl IntoIterator<Item = &'a str>) -> BTreeSet<&'a str> {
    addresses
        .into_iter()
        .filter(|a| !a.trim().is_empty())
        .collect()
}

/// Deduplicates and sorts one side, normalizing each distinct string once.
/// Addresses that normalize to nothing are dropped from matching.
fn prepare<'a>(addresses: impl IntoIterator<Item = &'a str>) -> (usize, Vec<Prepared<'a>>) {
    let unique = unique_addresses(addresses);
    let total = unique.len();
    let prepared = unique
        .into_iter()
        .map(|original| Prepared {
            original,
            normalized: normalize(original),
        })
        .filter(|p| !p.normalized.is_empty())
        .collect();
    (total, prepared)
}

struct Candidate {
    score: f64,
    a: usize,
    b: usize,
}

/// Bucketed address matcher. Only pairs sharing an [`AddressKey`] are
/// scored, so a true match with no key in common is never found.
#[derive(Debug, Clone, Copy)]
pub struct AddressMatcher {
    threshold: f64,
}

impl Default for AddressMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AddressMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Pairs addresses of `set_a` with addresses of `set_b`. Each address
    /// takes part in at most one match. Output depends only on the set
    /// contents: equal scores are accepted in (address A, address B) order.
    pub fn find_matches<'a>(
        &self,
        set_a: impl IntoIterator<Item = &'a str>,
        set_b: impl IntoIterator<Item = &'a str>,
    ) -> MatchResult {
        let (total_a, side_a) = prepare(set_a);
        let (total_b, side_b) = prepare(set_b);
        let mut used_a = vec![false; side_a.len()];
        let mut used_b = vec![false; side_b.len()];

        // Normalized-equal pairs come first and claim both addresses.
        let mut by_normalized: HashMap<&str, VecDeque<usize>> = HashMap::new();
        for (i, a) in side_a.iter().enumerate() {
            by_normalized
                .entry(a.normalized.as_str())
                .or_default()
                .push_back(i);
        }

        let mut exact = Vec::new();
        for (j, b) in side_b.iter().enumerate() {
            let Some(i) = by_normalized
                .get_mut(b.normalized.as_str())
                .and_then(VecDeque::pop_front)
            else {
                continue;
            };
            used_a[i] = true;
            used_b[j] = true;
            exact.push(ExactMatch {
                address_a: side_a[i].original.to_string(),
                address_b: b.original.to_string(),
                normalized: b.normalized.clone(),
            });
        }

        let mut index: HashMap<AddressKey, Vec<usize>> = HashMap::new();
        for (i, a) in side_a.iter().enumerate() {
            if used_a[i] {
                continue;
            }
            for key in derive_keys(&a.normalized) {
                index.entry(key).or_default().push(i);
            }
        }
        tracing::debug!(
            "Indexed {} addresses of set A under {} keys",
            side_a.len() - exact.len(),
            index.len()
        );

        let mut candidates = Vec::new();
        for (j, b) in side_b.iter().enumerate() {
            if used_b[j] {
                continue;
            }
            let bucket: BTreeSet<usize> = derive_keys(&b.normalized)
                .iter()
                .filter_map(|key| index.get(key))
                .flatten()
                .copied()
                .collect();

            for i in bucket {
                let score = similarity_ratio(&side_a[i].normalized, &b.normalized);
                if score >= self.threshold && score < 1.0 {
                    candidates.push(Candidate { score, a: i, b: j });
                }
            }
        }
        tracing::debug!("{} candidate pairs at or above threshold", candidates.len());

        // Sides are sorted by original string, so index order is the
        // lexicographic tie-break.
        candidates.sort_by(|x, y| {
            y.score
                .total_cmp(&x.score)
                .then(x.a.cmp(&y.a))
                .then(x.b.cmp(&y.b))
        });

        let mut fuzzy = Vec::new();
        for candidate in candidates {
            if used_a[candidate.a] || used_b[candidate.b] {
                continue;
            }
            used_a[candidate.a] = true;
            used_b[candidate.b] = true;
            fuzzy.push(FuzzyMatch {
                address_a: side_a[candidate.a].original.to_string(),
                address_b: side_b[candidate.b].original.to_string(),
                score: candidate.score,
            });
        }

        MatchResult {
            fuzzy,
            exact,
            total_a,
            total_b,
        }
    }
}

/// Convenience wrapper around [`AddressMatcher::find_matches`].
pub fn find_matches<A: AsRef<str>, B: AsRef<str>>(
    set_a: &[A],
    set_b: &[B],
    threshold: f64,
) -> MatchResult {
    AddressMatcher::new(threshold).find_matches(
        set_a.iter().map(AsRef::as_ref),
        set_b.iter().map(AsRef::as_ref),
    )
}
