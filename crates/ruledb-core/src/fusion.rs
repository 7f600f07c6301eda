//! Reciprocal Rank Fusion over best-first ranked lists.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::QueryResult;

pub const DEFAULT_RRF_K: u32 = 60;

/// Anything with a stable identity across ranked lists.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for QueryResult {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fused<T> {
    pub id: String,
    /// First occurrence across sources.
    pub item: T,
    pub score: f64,
}

/// Contribution of a 0-based `rank` in one list: `1 / (k + rank + 1)`.
pub fn rrf_contribution(k: u32, rank: usize) -> f64 {
    1.0 / (f64::from(k) + rank as f64 + 1.0)
}

/// Fuse `sources` by summing [`rrf_contribution`] per identity, then sort by
/// score descending. Equal scores keep first-source, first-occurrence order.
///
/// Zero sources is [`Error::EmptyFusionInput`]; sources that are all empty
/// fuse to an empty list.
pub fn reciprocal_rank_fusion<T: Identified + Clone>(sources: &[Vec<T>], k: u32) -> Result<Vec<Fused<T>>> {
    if sources.is_empty() {
        return Err(Error::EmptyFusionInput);
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut fused: Vec<Fused<T>> = Vec::new();
    for list in sources {
        for (rank, item) in list.iter().enumerate() {
            let slot = *positions.entry(item.id()).or_insert_with(|| {
                fused.push(Fused { id: item.id().to_string(), item: item.clone(), score: 0.0 });
                fused.len() - 1
            });
            fused[slot].score += rrf_contribution(k, rank);
        }
    }

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(fused)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Hit(&'static str);

    impl Identified for Hit {
        fn id(&self) -> &str {
            self.0
        }
    }

    fn ids<T>(fused: &[Fused<T>]) -> Vec<&str> {
        fused.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn consensus_outranks_single_source() {
        let sources = vec![vec![Hit("A"), Hit("B"), Hit("C")], vec![Hit("B"), Hit("A")]];
        let fused = reciprocal_rank_fusion(&sources, 60).unwrap();
        assert_eq!(ids(&fused), vec!["A", "B", "C"]);
        let ab = 1.0 / 61.0 + 1.0 / 62.0;
        assert!((fused[0].score - ab).abs() < 1e-12);
        assert!((fused[1].score - ab).abs() < 1e-12);
        assert!((fused[2].score - 1.0 / 63.0).abs() < 1e-12);
    }

    #[test]
    fn contribution_is_monotonic_in_rank() {
        for k in [0, 1, 60, 1000] {
            for rank in 0..100 {
                assert!(rrf_contribution(k, rank) >= rrf_contribution(k, rank + 1));
            }
        }
    }

    #[test]
    fn output_is_sorted_and_reproducible() {
        let sources = vec![
            vec![Hit("d"), Hit("a"), Hit("c")],
            vec![Hit("b"), Hit("c")],
            vec![Hit("a"), Hit("e"), Hit("b")],
        ];
        let first = reciprocal_rank_fusion(&sources, 60).unwrap();
        for pair in first.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for _ in 0..10 {
            assert_eq!(ids(&reciprocal_rank_fusion(&sources, 60).unwrap()), ids(&first));
        }
    }

    #[test]
    fn ties_keep_first_occurrence_order() {
        let sources = vec![vec![Hit("x")], vec![Hit("y")], vec![Hit("z")]];
        let fused = reciprocal_rank_fusion(&sources, 60).unwrap();
        assert_eq!(ids(&fused), vec!["x", "y", "z"]);
    }

    #[test]
    fn empty_inputs() {
        assert!(matches!(reciprocal_rank_fusion::<Hit>(&[], 60), Err(Error::EmptyFusionInput)));
        assert!(reciprocal_rank_fusion::<Hit>(&[vec![], vec![]], 60).unwrap().is_empty());
    }

    #[test]
    fn absent_ids_never_appear() {
        let fused = reciprocal_rank_fusion(&[vec![Hit("a")], vec![]], 60).unwrap();
        assert_eq!(ids(&fused), vec!["a"]);
    }
}
