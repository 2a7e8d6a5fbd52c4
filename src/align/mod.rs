mod aligner;
mod alignment;
mod cigar;
mod edit;

pub use aligner::{AlignMode, SeqAligner};
pub use alignment::{Alignment, Strand};
pub use cigar::{Cigar, CigarOp, CigarRun, FlatCigar};
pub use edit::{BioEditAligner, EditAligner, EditHit, EditMode};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("{which} sequence is empty")]
    EmptySequence { which: &'static str },
    #[error("invalid aligner configuration: {0}")]
    InvalidConfig(String),
    #[error("no alignment found between a {query_len} bp query and a {target_len} bp target")]
    NoAlignment { query_len: usize, target_len: usize },
    #[error("CIGAR {cigar} does not span the aligned sequences")]
    InconsistentCigar { cigar: String },
}
