use super::{
    dist_matrix, ClusterError, Clustering, ConsensusEngine, Criterion, DistanceMatrix,
    DwfaConsensus, LinkageMethod, MajorityVote, RowExecutor, SeedChoice, SequentialExecutor,
    ThreadPoolExecutor,
};
use crate::align::SeqAligner;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusParams {
    /// Clusters whose consensus sequences differ by less are merged
    pub th_merge: f64,
    /// Minimum cluster size as a fraction of all sequences
    pub th_noisy: f64,
    /// Consensus sequences differing by less are brought to the same phase
    pub th_sync: f64,
    /// Seed of the majority vote fallback
    pub seed_choice: SeedChoice,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams {
            th_merge: 0.05,
            th_noisy: 0.01,
            th_sync: 0.3,
            seed_choice: SeedChoice::AsGiven,
        }
    }
}

impl ConsensusParams {
    fn validate(&self) -> Result<(), ClusterError> {
        for (name, value) in [
            ("th_merge", self.th_merge),
            ("th_noisy", self.th_noisy),
            ("th_sync", self.th_sync),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ClusterError::InvalidParameter(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConsensus {
    pub cluster_id: i32,
    pub cluster_size: usize,
    pub seq: Vec<u8>,
}

/// Keeps track of which cluster id each merged id ends up in during one merge
/// pass. The lower id is always the root.
struct UnionFind {
    parent: FxHashMap<i32, i32>,
}

impl UnionFind {
    fn new(ids: impl IntoIterator<Item = i32>) -> Self {
        UnionFind {
            parent: ids.into_iter().map(|id| (id, id)).collect(),
        }
    }

    fn find(&mut self, id: i32) -> i32 {
        let mut root = id;
        while let Some(&parent) = self.parent.get(&root) {
            if parent == root {
                break;
            }
            root = parent;
        }
        let mut node = id;
        while node != root {
            let next = self.parent.get(&node).copied().unwrap_or(root);
            self.parent.insert(node, root);
            node = next;
        }
        root
    }

    /// Returns false if both ids were already in the same set.
    fn union(&mut self, a: i32, b: i32) -> bool {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return false;
        }
        let (low, high) = (root_a.min(root_b), root_a.max(root_b));
        self.parent.insert(high, low);
        true
    }
}

fn summarize(cons: &[ClusterConsensus]) -> String {
    cons.iter()
        .map(|c| format!("{}:{}x{}bp", c.cluster_id, c.cluster_size, c.seq.len()))
        .join(", ")
}

/// Clustering session over a fixed set of sequences: distance matrix,
/// hierarchical clustering and consensus refinement.
pub struct SeqClustering {
    seqs: Arc<Vec<Vec<u8>>>,
    aligner: SeqAligner,
    clustering: Clustering,
    engine: Box<dyn ConsensusEngine>,
    cons: Vec<ClusterConsensus>,
}

impl SeqClustering {
    pub fn new(seqs: Vec<Vec<u8>>, aligner: SeqAligner) -> Self {
        let n = seqs.len();
        SeqClustering {
            seqs: Arc::new(seqs),
            aligner,
            clustering: Clustering::new(n),
            engine: Box::new(DwfaConsensus),
            cons: Vec::new(),
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn ConsensusEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn clustering(&self) -> &Clustering {
        &self.clustering
    }

    pub fn consensus(&self) -> &[ClusterConsensus] {
        &self.cons
    }

    /// Computes the distance matrix on `n_threads` local threads.
    pub fn calc_dist_mat(&mut self, n_threads: usize) -> Result<&DistanceMatrix, ClusterError> {
        if n_threads > 1 {
            self.calc_dist_mat_with(&ThreadPoolExecutor::new(n_threads))
        } else {
            self.calc_dist_mat_with(&SequentialExecutor)
        }
    }

    pub fn calc_dist_mat_with<X: RowExecutor>(
        &mut self,
        executor: &X,
    ) -> Result<&DistanceMatrix, ClusterError> {
        log::info!("Computing distance matrix of {} sequences", self.seqs.len());
        let dist = dist_matrix::build(self.seqs.clone(), self.aligner.clone(), executor)?;
        self.clustering.set_dist_matrix(dist)?;
        self.clustering
            .dist_matrix()
            .ok_or(ClusterError::MissingDistanceMatrix)
    }

    pub fn cluster_hierarchical(
        &mut self,
        threshold: f64,
        method: LinkageMethod,
        criterion: Criterion,
    ) -> Result<&[i32], ClusterError> {
        self.clustering
            .cluster_hierarchical(threshold, method, criterion)
    }

    /// Builds one consensus per cluster, then merges clusters with
    /// near-identical consensus sequences until nothing changes, drops small
    /// clusters and brings similar consensus sequences to a common phase.
    pub fn generate_consensus(
        &mut self,
        params: &ConsensusParams,
    ) -> Result<&[ClusterConsensus], ClusterError> {
        params.validate()?;
        if !self.clustering.is_clustered() {
            return Err(ClusterError::NotClustered);
        }

        let mut cons = self.initial_consensus(params.seed_choice)?;
        log::debug!("Initial consensus: {}", summarize(&cons));

        while self.merge_pass(&cons, params.th_merge)? {
            cons = self.initial_consensus(params.seed_choice)?;
            log::debug!("Merged consensus: {}", summarize(&cons));
        }

        let min_size = (self.seqs.len() as f64 * params.th_noisy).max(2.0);
        let n_before = cons.len();
        cons.retain(|c| c.cluster_size as f64 >= min_size);
        log::info!(
            "Kept {} of {} clusters with at least {} sequences",
            cons.len(),
            n_before,
            min_size
        );

        self.sync_phase(&mut cons, params.th_sync)?;
        log::debug!("Synchronized consensus: {}", summarize(&cons));

        self.cons = cons;
        Ok(&self.cons)
    }

    fn initial_consensus(
        &self,
        seed_choice: SeedChoice,
    ) -> Result<Vec<ClusterConsensus>, ClusterError> {
        self.clustering
            .clusters()
            .into_iter()
            .map(|(cluster_id, members)| {
                let seq = self.cluster_consensus(cluster_id, &members, seed_choice)?;
                Ok(ClusterConsensus {
                    cluster_id,
                    cluster_size: members.len(),
                    seq,
                })
            })
            .collect()
    }

    fn cluster_consensus(
        &self,
        cluster_id: i32,
        members: &[usize],
        seed_choice: SeedChoice,
    ) -> Result<Vec<u8>, ClusterError> {
        let projected: Vec<Vec<u8>> = match members.split_first() {
            Some((&first, rest)) if self.aligner.revcomp() || self.aligner.cyclic() => {
                let first_seq = &self.seqs[first];
                let mut projected = vec![first_seq.clone()];
                for &member in rest {
                    let member_seq = &self.seqs[member];
                    let aln = self.aligner.align(first_seq, member_seq)?;
                    projected.push(aln.b_aligned_seq(member_seq));
                }
                projected
            }
            _ => members.iter().map(|&m| self.seqs[m].clone()).collect(),
        };
        let seqs: Vec<&[u8]> = projected.iter().map(|s| s.as_slice()).collect();

        match self.engine.consensus(&seqs) {
            Ok(seq) => Ok(seq),
            Err(err) => {
                log::warn!(
                    "{} consensus failed for cluster {} ({}), falling back to majority vote",
                    self.engine.name(),
                    cluster_id,
                    err
                );
                Ok(MajorityVote::new(seed_choice).vote(&seqs)?)
            }
        }
    }

    /// Returns true if any two clusters were merged.
    fn merge_pass(&mut self, cons: &[ClusterConsensus], th_merge: f64) -> Result<bool, ClusterError> {
        let mut merged = UnionFind::new(cons.iter().map(|c| c.cluster_id));
        let mut changed = false;
        for (i, j) in (0..cons.len()).tuple_combinations() {
            let (first, second) = (&cons[i], &cons[j]);
            if merged.find(first.cluster_id) == merged.find(second.cluster_id) {
                continue;
            }
            let diff = self.aligner.align(&first.seq, &second.seq)?.diff;
            if diff < th_merge {
                log::debug!(
                    "Merging cluster {} into {} (diff {:.4})",
                    second.cluster_id,
                    first.cluster_id,
                    diff
                );
                changed |= merged.union(first.cluster_id, second.cluster_id);
            }
        }
        for c in cons {
            let root = merged.find(c.cluster_id);
            self.clustering.merge(c.cluster_id, root);
        }
        Ok(changed)
    }

    fn sync_phase(&self, cons: &mut [ClusterConsensus], th_sync: f64) -> Result<(), ClusterError> {
        for (i, j) in (0..cons.len()).tuple_combinations() {
            let aln = self.aligner.align(&cons[i].seq, &cons[j].seq)?;
            if aln.diff < th_sync {
                cons[j].seq = aln.b_aligned_seq(&cons[j].seq);
            }
        }
        Ok(())
    }
}
