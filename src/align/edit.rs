use super::{AlignError, Cigar};
use bio::alignment::pairwise::{Aligner, MatchParams, Scoring, MIN_SCORE};
use std::cell::RefCell;

/// Boundary handling of a unit-cost alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Both sequences end to end (NW)
    Global,
    /// Whole query inside any window of the target (HW)
    Infix,
    /// Whole query against a prefix of the target (SHW)
    Prefix,
}

/// Best unit-cost alignment of a query against a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditHit {
    pub edit_distance: usize,
    /// Aligned window on the target, end exclusive
    pub target_start: usize,
    pub target_end: usize,
    pub cigar: Cigar,
}

/// Unit-cost aligner consulted by [`super::SeqAligner`]. Implementations must
/// be deterministic for a given pair and mode and must consume the whole query.
pub trait EditAligner: Send + Sync {
    fn align(&self, query: &[u8], target: &[u8], mode: EditMode) -> Result<EditHit, AlignError>;
}

fn unit_cost_scoring() -> Scoring<MatchParams> {
    Scoring::from_scores(0, -1, 0, -1)
}

fn create_thread_local_edit_aligner() -> Aligner<MatchParams> {
    Aligner::with_scoring(unit_cost_scoring())
}

fn create_thread_local_prefix_aligner() -> Aligner<MatchParams> {
    let scoring = unit_cost_scoring()
        .xclip(MIN_SCORE)
        .yclip_prefix(MIN_SCORE)
        .yclip_suffix(0);
    Aligner::with_scoring(scoring)
}

thread_local! {
    // Global and infix alignments
    static THREAD_EDIT_ALIGNER: RefCell<Aligner<MatchParams>> = RefCell::new(create_thread_local_edit_aligner());
    // Free target suffix
    static THREAD_PREFIX_ALIGNER: RefCell<Aligner<MatchParams>> = RefCell::new(create_thread_local_prefix_aligner());
}

/// Dynamic-programming edit distance backed by rust-bio; one aligner per
/// thread is reused across calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct BioEditAligner;

impl EditAligner for BioEditAligner {
    fn align(&self, query: &[u8], target: &[u8], mode: EditMode) -> Result<EditHit, AlignError> {
        if query.is_empty() {
            return Err(AlignError::EmptySequence { which: "query" });
        }
        if target.is_empty() {
            return Err(AlignError::EmptySequence { which: "target" });
        }

        let aln = match mode {
            EditMode::Global => {
                THREAD_EDIT_ALIGNER.with(|cell| cell.borrow_mut().global(query, target))
            }
            EditMode::Infix => {
                THREAD_EDIT_ALIGNER.with(|cell| cell.borrow_mut().semiglobal(query, target))
            }
            EditMode::Prefix => {
                THREAD_PREFIX_ALIGNER.with(|cell| cell.borrow_mut().custom(query, target))
            }
        };

        let cigar = Cigar::from_bio_ops(&aln.operations);
        let target_start = aln.ystart;
        let target_end = target_start + cigar.target_len();
        if cigar.query_len() != query.len() || target_end > target.len() {
            return Err(AlignError::NoAlignment {
                query_len: query.len(),
                target_len: target.len(),
            });
        }
        Ok(EditHit {
            edit_distance: cigar.edit_distance(),
            target_start,
            target_end,
            cigar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_edit_distance() {
        let hit = BioEditAligner
            .align(b"ACGTACGT", b"ACGAACGT", EditMode::Global)
            .unwrap();
        assert_eq!(hit.edit_distance, 1);
        assert_eq!((hit.target_start, hit.target_end), (0, 8));
        assert_eq!(hit.cigar.to_string(), "3=1X4=");
    }

    #[test]
    fn test_global_indel() {
        let hit = BioEditAligner
            .align(b"ACGTTACGT", b"ACGTACGT", EditMode::Global)
            .unwrap();
        assert_eq!(hit.edit_distance, 1);
        assert_eq!(hit.cigar.aln_length(), 9);
        assert_eq!(hit.cigar.query_len(), 9);
        assert_eq!(hit.cigar.target_len(), 8);
    }

    #[test]
    fn test_infix_locates_query() {
        let hit = BioEditAligner
            .align(b"GATTACA", b"CCCCCGATTACACCCCC", EditMode::Infix)
            .unwrap();
        assert_eq!(hit.edit_distance, 0);
        assert_eq!((hit.target_start, hit.target_end), (5, 12));
        assert_eq!(hit.cigar.to_string(), "7=");
    }

    #[test]
    fn test_prefix_anchors_target_start() {
        let hit = BioEditAligner
            .align(b"GATTACA", b"GATTACATTTTTTT", EditMode::Prefix)
            .unwrap();
        assert_eq!(hit.edit_distance, 0);
        assert_eq!((hit.target_start, hit.target_end), (0, 7));

        let hit = BioEditAligner
            .align(b"GATTACA", b"CCGATTACA", EditMode::Prefix)
            .unwrap();
        assert_eq!(hit.target_start, 0);
        assert_eq!(hit.edit_distance, 2);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert_eq!(
            BioEditAligner.align(b"", b"ACGT", EditMode::Global),
            Err(AlignError::EmptySequence { which: "query" })
        );
        assert_eq!(
            BioEditAligner.align(b"ACGT", b"", EditMode::Infix),
            Err(AlignError::EmptySequence { which: "target" })
        );
    }
}
