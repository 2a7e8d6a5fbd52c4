use super::ClusterError;
use crate::align::{BioEditAligner, EditAligner, SeqAligner};
use rayon::{
    iter::{IntoParallelIterator, ParallelIterator},
    ThreadPoolBuilder,
};
use std::sync::Arc;

/// Symmetric matrix of pairwise alignment diffs with a zero diagonal, stored
/// as its condensed upper triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    condensed: Vec<f64>,
}

/// Index of pair `(i, j)`, `i < j`, in the condensed upper triangle.
#[inline(always)]
fn condensed_index(n: usize, i: usize, j: usize) -> usize {
    n * i - i * (i + 3) / 2 + j - 1
}

impl DistanceMatrix {
    pub fn from_condensed(n: usize, condensed: Vec<f64>) -> Result<Self, ClusterError> {
        let expected = n * n.saturating_sub(1) / 2;
        if condensed.len() != expected {
            return Err(ClusterError::InvalidParameter(format!(
                "condensed matrix of {} sequences needs {} values, got {}",
                n,
                expected,
                condensed.len()
            )));
        }
        Ok(DistanceMatrix { n, condensed })
    }

    /// Assembles the matrix from `(row, distances to rows row+1..n)` pairs
    /// delivered in any order. A row delivered twice must carry the same
    /// distances.
    pub fn from_rows<I>(n: usize, rows: I) -> Result<Self, ClusterError>
    where
        I: IntoIterator<Item = (usize, Vec<f64>)>,
    {
        let mut filled: Vec<Option<Vec<f64>>> = vec![None; n];
        for (row, dists) in rows {
            if row >= n || dists.len() != n - 1 - row {
                return Err(ClusterError::IncompleteMatrix { row });
            }
            match &filled[row] {
                Some(previous) if *previous != dists => {
                    return Err(ClusterError::DuplicateRow(row));
                }
                Some(_) => {}
                None => filled[row] = Some(dists),
            }
        }

        let mut condensed = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for (row, dists) in filled.into_iter().enumerate() {
            match dists {
                Some(dists) => condensed.extend(dists),
                // the last row has nothing to compare against
                None if row + 1 == n => {}
                None => return Err(ClusterError::IncompleteMatrix { row }),
            }
        }
        Ok(DistanceMatrix { n, condensed })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn condensed(&self) -> &[f64] {
        &self.condensed
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        match i.cmp(&j) {
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Less => self.condensed[condensed_index(self.n, i, j)],
            std::cmp::Ordering::Greater => self.condensed[condensed_index(self.n, j, i)],
        }
    }

    pub fn square(&self) -> Vec<Vec<f64>> {
        (0..self.n)
            .map(|i| (0..self.n).map(|j| self.get(i, j)).collect())
            .collect()
    }
}

/// Zig-zag row order (0, n-1, 1, n-2, ...) so that any contiguous chunk mixes
/// long and short rows.
pub fn row_order(n: usize) -> Vec<usize> {
    (0..n)
        .map(|k| if k % 2 == 0 { k / 2 } else { n - 1 - (k - 1) / 2 })
        .collect()
}

/// Splits `order` into at most `n_parts` contiguous batches of equal size.
pub fn partition_rows(order: &[usize], n_parts: usize) -> Vec<Vec<usize>> {
    if order.is_empty() {
        return Vec::new();
    }
    let chunk_size = order.len().div_ceil(n_parts.max(1));
    order.chunks(chunk_size).map(|c| c.to_vec()).collect()
}

/// A batch-able unit of distance matrix work. Sequences are shared read-only
/// between workers.
#[derive(Debug, Clone)]
pub struct RowJob<E = BioEditAligner> {
    seqs: Arc<Vec<Vec<u8>>>,
    aligner: SeqAligner<E>,
}

impl<E: EditAligner> RowJob<E> {
    pub fn new(seqs: Arc<Vec<Vec<u8>>>, aligner: SeqAligner<E>) -> Self {
        RowJob { seqs, aligner }
    }

    /// Distances from each row to every later row.
    pub fn run(&self, rows: &[usize]) -> Result<Vec<(usize, Vec<f64>)>, ClusterError> {
        let n = self.seqs.len();
        let mut results = Vec::with_capacity(rows.len());
        for &row in rows {
            let query = &self.seqs[row];
            let dists = ((row + 1)..n)
                .map(|col| {
                    self.aligner
                        .align(query, &self.seqs[col])
                        .map(|aln| aln.diff)
                })
                .collect::<Result<Vec<_>, _>>()?;
            results.push((row, dists));
        }
        Ok(results)
    }
}

/// Runs row batches and returns every computed row, in any order.
pub trait RowExecutor {
    fn n_parts(&self) -> usize;

    fn execute<E: EditAligner>(
        &self,
        job: &RowJob<E>,
        batches: Vec<Vec<usize>>,
    ) -> Result<Vec<(usize, Vec<f64>)>, ClusterError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl RowExecutor for SequentialExecutor {
    fn n_parts(&self) -> usize {
        1
    }

    fn execute<E: EditAligner>(
        &self,
        job: &RowJob<E>,
        batches: Vec<Vec<usize>>,
    ) -> Result<Vec<(usize, Vec<f64>)>, ClusterError> {
        let mut rows = Vec::new();
        for batch in batches {
            rows.extend(job.run(&batch)?);
        }
        Ok(rows)
    }
}

/// Local rayon pool, built for one matrix and dropped afterwards.
#[derive(Debug, Clone, Copy)]
pub struct ThreadPoolExecutor {
    num_threads: usize,
}

impl ThreadPoolExecutor {
    pub fn new(num_threads: usize) -> Self {
        ThreadPoolExecutor {
            num_threads: num_threads.max(1),
        }
    }
}

impl RowExecutor for ThreadPoolExecutor {
    fn n_parts(&self) -> usize {
        self.num_threads
    }

    fn execute<E: EditAligner>(
        &self,
        job: &RowJob<E>,
        batches: Vec<Vec<usize>>,
    ) -> Result<Vec<(usize, Vec<f64>)>, ClusterError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|i| format!("seqclust-{}", i))
            .build()
            .map_err(|e| ClusterError::ThreadPool(e.to_string()))?;

        let per_batch: Vec<Vec<(usize, Vec<f64>)>> = pool.install(|| {
            batches
                .into_par_iter()
                .map(|batch| -> Result<_, ClusterError> {
                    let rows = job.run(&batch)?;
                    log::debug!(
                        "Computed {} distance matrix rows on {}",
                        rows.len(),
                        std::thread::current().name().unwrap_or("worker")
                    );
                    Ok(rows)
                })
                .collect::<Result<Vec<_>, ClusterError>>()
        })?;
        Ok(per_batch.into_iter().flatten().collect())
    }
}

pub fn build<E: EditAligner, X: RowExecutor>(
    seqs: Arc<Vec<Vec<u8>>>,
    aligner: SeqAligner<E>,
    executor: &X,
) -> Result<DistanceMatrix, ClusterError> {
    let n = seqs.len();
    if n < 2 {
        return Err(ClusterError::TooFewObservations(n));
    }
    let batches = partition_rows(&row_order(n), executor.n_parts());
    log::debug!(
        "Computing distance matrix of {} sequences in {} batches",
        n,
        batches.len()
    );
    let job = RowJob::new(seqs, aligner);
    let rows = executor.execute(&job, batches)?;
    DistanceMatrix::from_rows(n, rows)
}
