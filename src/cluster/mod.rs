mod clustering;
mod consensus;
mod dist_matrix;
mod refine;

pub use clustering::{Clustering, Criterion, LinkageMethod, LinkageStep, UNASSIGNED};
pub use consensus::{ConsensusEngine, DwfaConsensus, MajorityVote, SeedChoice};
pub use dist_matrix::{
    build as build_dist_matrix, partition_rows, row_order, DistanceMatrix, RowExecutor, RowJob, SequentialExecutor,
    ThreadPoolExecutor,
};
pub use refine::{ClusterConsensus, ConsensusParams, SeqClustering};

use crate::align::AlignError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("hierarchical clustering needs at least 2 sequences, got {0}")]
    TooFewObservations(usize),
    #[error("sequences have not been clustered yet")]
    NotClustered,
    #[error("distance matrix has not been computed")]
    MissingDistanceMatrix,
    #[error("row {0} was reported twice with different distances")]
    DuplicateRow(usize),
    #[error("distance matrix row {row} is missing or malformed")]
    IncompleteMatrix { row: usize },
    #[error("{0}")]
    InvalidParameter(String),
    #[error("could not build thread pool: {0}")]
    ThreadPool(String),
    #[error(transparent)]
    Align(#[from] AlignError),
}
