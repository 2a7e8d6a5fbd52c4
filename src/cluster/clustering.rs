use super::{ClusterError, DistanceMatrix};
use kodama::{linkage, Method};
use rustc_hash::FxHashMap;
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Assignment of a sequence that belongs to no cluster.
pub const UNASSIGNED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkageMethod {
    Single,
    Complete,
    Average,
    Weighted,
    Ward,
    Centroid,
    Median,
}

impl LinkageMethod {
    fn kodama_method(self) -> Method {
        match self {
            LinkageMethod::Single => Method::Single,
            LinkageMethod::Complete => Method::Complete,
            LinkageMethod::Average => Method::Average,
            LinkageMethod::Weighted => Method::Weighted,
            LinkageMethod::Ward => Method::Ward,
            LinkageMethod::Centroid => Method::Centroid,
            LinkageMethod::Median => Method::Median,
        }
    }
}

impl FromStr for LinkageMethod {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(LinkageMethod::Single),
            "complete" => Ok(LinkageMethod::Complete),
            "average" => Ok(LinkageMethod::Average),
            "weighted" => Ok(LinkageMethod::Weighted),
            "ward" => Ok(LinkageMethod::Ward),
            "centroid" => Ok(LinkageMethod::Centroid),
            "median" => Ok(LinkageMethod::Median),
            _ => Err(ClusterError::InvalidParameter(format!(
                "invalid linkage method: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for LinkageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkageMethod::Single => "single",
            LinkageMethod::Complete => "complete",
            LinkageMethod::Average => "average",
            LinkageMethod::Weighted => "weighted",
            LinkageMethod::Ward => "ward",
            LinkageMethod::Centroid => "centroid",
            LinkageMethod::Median => "median",
        };
        write!(f, "{}", name)
    }
}

/// How the flat cut interprets its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// Members of a cluster are joined below the threshold distance
    Distance,
    /// Lowest cut yielding at most `threshold` clusters
    MaxClust,
}

impl FromStr for Criterion {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "distance" => Ok(Criterion::Distance),
            "maxclust" => Ok(Criterion::MaxClust),
            _ => Err(ClusterError::InvalidParameter(format!(
                "invalid criterion: {} (expected distance or maxclust)",
                s
            ))),
        }
    }
}

/// One agglomeration step. The node it creates is labelled `n + step index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkageStep {
    pub cluster1: usize,
    pub cluster2: usize,
    pub dissimilarity: f64,
    pub size: usize,
}

/// Cluster assignments of `n` sequences together with the distance matrix
/// they were derived from.
#[derive(Debug, Clone)]
pub struct Clustering {
    n: usize,
    assignments: Vec<i32>,
    dist: Option<DistanceMatrix>,
    linkage_cache: FxHashMap<LinkageMethod, Vec<LinkageStep>>,
}

impl Clustering {
    pub fn new(n: usize) -> Self {
        Clustering {
            n,
            assignments: vec![UNASSIGNED; n],
            dist: None,
            linkage_cache: FxHashMap::default(),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Replaces the distance matrix; cached linkages are dropped.
    pub fn set_dist_matrix(&mut self, dist: DistanceMatrix) -> Result<(), ClusterError> {
        if dist.n() != self.n {
            return Err(ClusterError::InvalidParameter(format!(
                "distance matrix covers {} sequences, expected {}",
                dist.n(),
                self.n
            )));
        }
        self.dist = Some(dist);
        self.linkage_cache.clear();
        Ok(())
    }

    pub fn dist_matrix(&self) -> Option<&DistanceMatrix> {
        self.dist.as_ref()
    }

    pub fn linkage(&mut self, method: LinkageMethod) -> Result<&[LinkageStep], ClusterError> {
        let dist = self
            .dist
            .as_ref()
            .ok_or(ClusterError::MissingDistanceMatrix)?;
        if dist.n() < 2 {
            return Err(ClusterError::TooFewObservations(dist.n()));
        }
        let steps = self.linkage_cache.entry(method).or_insert_with(|| {
            log::debug!("Computing {} linkage", method);
            let mut condensed = dist.condensed().to_vec();
            let dendrogram = linkage(&mut condensed, dist.n(), method.kodama_method());
            dendrogram
                .steps()
                .iter()
                .map(|step| LinkageStep {
                    cluster1: step.cluster1,
                    cluster2: step.cluster2,
                    dissimilarity: step.dissimilarity,
                    size: step.size,
                })
                .collect()
        });
        Ok(steps.as_slice())
    }

    /// Agglomerative clustering followed by a flat cut. Cluster ids start at 1
    /// and follow the order in which sequences first appear.
    pub fn cluster_hierarchical(
        &mut self,
        threshold: f64,
        method: LinkageMethod,
        criterion: Criterion,
    ) -> Result<&[i32], ClusterError> {
        if self.n < 2 {
            return Err(ClusterError::TooFewObservations(self.n));
        }
        let n = self.n;
        let steps = self.linkage(method)?;
        let heights = subtree_heights(steps, n);
        let labels = match criterion {
            Criterion::Distance => flat_cut(steps, &heights, n, threshold),
            Criterion::MaxClust => {
                if threshold < 1.0 || threshold.fract() != 0.0 {
                    return Err(ClusterError::InvalidParameter(format!(
                        "maxclust threshold must be a positive integer, got {}",
                        threshold
                    )));
                }
                maxclust_cut(steps, &heights, n, threshold as usize)
            }
        };
        self.assignments = relabel(&labels);
        log::info!(
            "Generated {} clusters from {} sequences",
            self.n_clusters(),
            self.n
        );
        Ok(self.assignments.as_slice())
    }

    pub fn assignments(&self) -> &[i32] {
        &self.assignments
    }

    pub fn is_clustered(&self) -> bool {
        self.assignments.iter().any(|&id| id != UNASSIGNED)
    }

    pub fn cluster_members(&self, id: i32) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, &cluster)| cluster == id)
            .map(|(index, _)| index)
            .collect()
    }

    /// Clusters with their members in ascending id order.
    pub fn clusters(&self) -> Vec<(i32, Vec<usize>)> {
        let mut clusters: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (index, &id) in self.assignments.iter().enumerate() {
            if id != UNASSIGNED {
                clusters.entry(id).or_default().push(index);
            }
        }
        clusters.into_iter().collect()
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters().len()
    }

    pub fn cluster_sizes(&self) -> Vec<(i32, usize)> {
        self.clusters()
            .into_iter()
            .map(|(id, members)| (id, members.len()))
            .collect()
    }

    /// Moves every member of `from_id` to `into_id`.
    pub fn merge(&mut self, from_id: i32, into_id: i32) {
        if from_id == into_id {
            return;
        }
        for id in self.assignments.iter_mut() {
            if *id == from_id {
                *id = into_id;
            }
        }
    }
}

/// Largest merge height inside each internal node's subtree.
fn subtree_heights(steps: &[LinkageStep], n: usize) -> Vec<f64> {
    let mut heights: Vec<f64> = Vec::with_capacity(steps.len());
    for step in steps {
        let child_height = |label: usize| {
            if label < n {
                0.0
            } else {
                heights[label - n]
            }
        };
        let height = step
            .dissimilarity
            .max(child_height(step.cluster1))
            .max(child_height(step.cluster2));
        heights.push(height);
    }
    heights
}

/// Every maximal subtree whose height is within `threshold` becomes a cluster.
fn flat_cut(steps: &[LinkageStep], heights: &[f64], n: usize, threshold: f64) -> Vec<i32> {
    let mut labels = vec![UNASSIGNED; n];
    let mut next_label = 0;
    let root = n + steps.len() - 1;
    let mut stack = vec![(root, None)];
    while let Some((node, inherited)) = stack.pop() {
        let label = inherited.or_else(|| {
            if node < n || heights[node - n] <= threshold {
                next_label += 1;
                Some(next_label)
            } else {
                None
            }
        });
        if node < n {
            if let Some(label) = label {
                labels[node] = label;
            }
            continue;
        }
        let step = &steps[node - n];
        stack.push((step.cluster2, label));
        stack.push((step.cluster1, label));
    }
    labels
}

fn maxclust_cut(steps: &[LinkageStep], heights: &[f64], n: usize, max_clusters: usize) -> Vec<i32> {
    let mut candidates = vec![0.0];
    candidates.extend_from_slice(heights);
    candidates.sort_by(|a, b| a.total_cmp(b));
    candidates.dedup();
    for threshold in candidates {
        let labels = flat_cut(steps, heights, n, threshold);
        if count_labels(&labels) <= max_clusters {
            return labels;
        }
    }
    flat_cut(steps, heights, n, f64::INFINITY)
}

fn count_labels(labels: &[i32]) -> usize {
    let mut seen = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

fn relabel(labels: &[i32]) -> Vec<i32> {
    let mut mapping: FxHashMap<i32, i32> = FxHashMap::default();
    labels
        .iter()
        .map(|label| {
            let next = mapping.len() as i32 + 1;
            *mapping.entry(*label).or_insert(next)
        })
        .collect()
}
