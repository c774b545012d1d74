use anyhow::{anyhow, Result};

use kbsearch_core::traits::VectorIndex;
use kbsearch_core::types::{Candidate, ChunkId};

/// Exhaustive inner-product index held in memory.
///
/// Exact rather than approximate; suited to small corpora and tests.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dim: usize,
    ids: Vec<ChunkId>,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, ids: Vec::new(), vectors: Vec::new() }
    }

    pub fn insert(&mut self, id: ChunkId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(anyhow!("vector for chunk {} has {} dims, expected {}", id, vector.len(), self.dim));
        }
        self.ids.push(id);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
}

impl VectorIndex for FlatIndex {
    fn search_vec(&self, query_vec: &[f32], n: usize) -> Result<Vec<Candidate>> {
        if query_vec.len() != self.dim {
            return Err(anyhow!("query has {} dims, index has {}", query_vec.len(), self.dim));
        }
        let mut hits: Vec<Candidate> = self
            .ids
            .iter()
            .zip(self.vectors.chunks_exact(self.dim.max(1)))
            .map(|(&id, v)| Candidate::new(id, v.iter().zip(query_vec).map(|(a, b)| a * b).sum()))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(n);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_best_inner_products_first() {
        let mut index = FlatIndex::new(2);
        index.insert(1, &[1.0, 0.0]).unwrap();
        index.insert(2, &[0.0, 1.0]).unwrap();
        index.insert(3, &[0.6, 0.8]).unwrap();
        let hits = index.search_vec(&[0.0, 1.0], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![2, 3]);
        assert!((hits[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let mut index = FlatIndex::new(1);
        for id in [9, 4, 7] { index.insert(id, &[1.0]).unwrap(); }
        let ids: Vec<_> = index.search_vec(&[1.0], 10).unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![4, 7, 9]);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let mut index = FlatIndex::new(3);
        assert!(index.insert(1, &[1.0]).is_err());
        assert!(index.search_vec(&[1.0], 1).is_err());
        assert!(index.is_empty());
    }
}
