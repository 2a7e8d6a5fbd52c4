use super::{
    AlignError, Alignment, BioEditAligner, EditAligner, EditHit, EditMode, Strand,
};
use crate::utils::{revcomp, rotate};
use std::{fmt, str::FromStr};

/// Alignment mode. Cyclic alignment is only defined for global alignment, so
/// it is carried by that variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMode {
    /// Query and target aligned end to end. With `cyclic`, the target is a
    /// circular sequence and the query must cover it exactly once.
    Global { cyclic: bool },
    /// Whole query against any window of the target
    Glocal,
    /// Whole query against a prefix of the target
    Prefix,
}

impl AlignMode {
    /// Builds a mode from its name, rejecting `cyclic` for anything but global.
    pub fn from_name(name: &str, cyclic: bool) -> Result<Self, AlignError> {
        let mode: AlignMode = name.parse()?;
        match (mode, cyclic) {
            (AlignMode::Global { .. }, _) => Ok(AlignMode::Global { cyclic }),
            (_, false) => Ok(mode),
            (_, true) => Err(AlignError::InvalidConfig(format!(
                "cyclic alignment requires global mode, got {}",
                mode
            ))),
        }
    }

    fn edit_mode(self) -> EditMode {
        match self {
            AlignMode::Global { .. } => EditMode::Global,
            AlignMode::Glocal => EditMode::Infix,
            AlignMode::Prefix => EditMode::Prefix,
        }
    }
}

impl FromStr for AlignMode {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(AlignMode::Global { cyclic: false }),
            "glocal" => Ok(AlignMode::Glocal),
            "prefix" => Ok(AlignMode::Prefix),
            _ => Err(AlignError::InvalidConfig(format!(
                "invalid mode {}, must be one of global, glocal or prefix",
                s
            ))),
        }
    }
}

impl fmt::Display for AlignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignMode::Global { cyclic: false } => write!(f, "global"),
            AlignMode::Global { cyclic: true } => write!(f, "global (cyclic)"),
            AlignMode::Glocal => write!(f, "glocal"),
            AlignMode::Prefix => write!(f, "prefix"),
        }
    }
}

/// Finds the best alignment of a query against a target, optionally trying the
/// target's reverse complement and resolving circular targets.
///
/// The aligner only holds configuration and can be shared across threads.
#[derive(Debug, Clone)]
pub struct SeqAligner<E = BioEditAligner> {
    mode: AlignMode,
    revcomp: bool,
    strand_prior: Strand,
    max_true_diff: f64,
    engine: E,
}

impl SeqAligner<BioEditAligner> {
    pub fn new(mode: AlignMode, revcomp: bool) -> Result<Self, AlignError> {
        Self::with_engine(mode, revcomp, BioEditAligner)
    }

    /// Global aligner, the configuration used for clustering.
    pub fn global(revcomp: bool, cyclic: bool) -> Self {
        SeqAligner {
            mode: AlignMode::Global { cyclic },
            revcomp,
            strand_prior: Strand::Forward,
            max_true_diff: 0.0,
            engine: BioEditAligner,
        }
    }
}

impl<E: EditAligner> SeqAligner<E> {
    pub fn with_engine(mode: AlignMode, revcomp: bool, engine: E) -> Result<Self, AlignError> {
        if revcomp && mode == AlignMode::Prefix {
            return Err(AlignError::InvalidConfig(
                "reverse complement cannot be considered for prefix alignment".into(),
            ));
        }
        Ok(SeqAligner {
            mode,
            revcomp,
            strand_prior: Strand::Forward,
            max_true_diff: 0.0,
            engine,
        })
    }

    /// Strand tried first; it also wins ties.
    pub fn with_strand_prior(mut self, strand: Strand) -> Result<Self, AlignError> {
        if strand == Strand::Reverse && !self.revcomp {
            return Err(AlignError::InvalidConfig(
                "a reverse strand prior requires reverse complement alignment".into(),
            ));
        }
        self.strand_prior = strand;
        Ok(self)
    }

    /// The other strand is skipped when the first one is already at most this
    /// dissimilar.
    pub fn with_max_true_diff(mut self, max_true_diff: f64) -> Result<Self, AlignError> {
        if !(0.0..=1.0).contains(&max_true_diff) {
            return Err(AlignError::InvalidConfig(format!(
                "max_true_diff must be within [0, 1], got {}",
                max_true_diff
            )));
        }
        self.max_true_diff = max_true_diff;
        Ok(self)
    }

    pub fn mode(&self) -> AlignMode {
        self.mode
    }

    pub fn revcomp(&self) -> bool {
        self.revcomp
    }

    pub fn cyclic(&self) -> bool {
        matches!(self.mode, AlignMode::Global { cyclic: true })
    }

    pub fn align(&self, query: &[u8], target: &[u8]) -> Result<Alignment, AlignError> {
        if query.is_empty() {
            return Err(AlignError::EmptySequence { which: "query" });
        }
        if target.is_empty() {
            return Err(AlignError::EmptySequence { which: "target" });
        }
        match self.mode {
            AlignMode::Global { cyclic: true } => self.align_cyclic(query, target),
            AlignMode::Global { cyclic: false } => {
                self.align_best_strand(query, target, EditMode::Global)
            }
            mode @ (AlignMode::Glocal | AlignMode::Prefix) => {
                if query.len() as f64 > 1.1 * target.len() as f64 {
                    log::warn!(
                        "Query ({} bp) is much longer than target ({} bp) for {} alignment",
                        query.len(),
                        target.len(),
                        mode
                    );
                }
                self.align_best_strand(query, target, mode.edit_mode())
            }
        }
    }

    fn align_best_strand(
        &self,
        query: &[u8],
        target: &[u8],
        mode: EditMode,
    ) -> Result<Alignment, AlignError> {
        let aln = self.run(query, target, self.strand_prior, mode)?;
        if self.revcomp && aln.diff > self.max_true_diff {
            let other = self.run(query, target, self.strand_prior.opposite(), mode)?;
            if other.diff < aln.diff {
                return Ok(other);
            }
        }
        Ok(aln)
    }

    /// Maps the query onto the doubled target, then moves the circle's
    /// breakpoint to the start or the end of that placement, whichever gives
    /// the better global alignment.
    fn align_cyclic(&self, query: &[u8], target: &[u8]) -> Result<Alignment, AlignError> {
        let target_len = target.len();
        let doubled = [target, target].concat();
        let mut aln = self.align_best_strand(query, &doubled, EditMode::Infix)?;

        if aln.b_end > target_len {
            aln.b_end -= target_len;
            if aln.b_start >= target_len {
                aln.b_start -= target_len;
            }
        }
        if aln.b_start == aln.b_end && aln.cigar.target_len() == target_len {
            aln.cyclic = true;
            return Ok(aln);
        }

        log::trace!(
            "Cyclic placement [{}, {}) does not cover the target once; realigning",
            aln.b_start,
            aln.b_end
        );
        let mut best = self.run_from_boundary(query, target, aln.b_start, aln.strand)?;
        if aln.b_start < aln.b_end {
            let from_end = self.run_from_boundary(query, target, aln.b_end, aln.strand)?;
            if from_end.diff < best.diff {
                best = from_end;
            }
        }
        Ok(best)
    }

    fn run_from_boundary(
        &self,
        query: &[u8],
        target: &[u8],
        boundary: usize,
        strand: Strand,
    ) -> Result<Alignment, AlignError> {
        let boundary = boundary % target.len();
        let rotated = rotate(target, boundary);
        let mut aln = self.run(query, &rotated, strand, EditMode::Global)?;
        aln.b_start = boundary;
        aln.b_end = boundary;
        aln.cyclic = true;
        Ok(aln)
    }

    fn run(
        &self,
        query: &[u8],
        target: &[u8],
        strand: Strand,
        mode: EditMode,
    ) -> Result<Alignment, AlignError> {
        let EditHit {
            edit_distance,
            target_start,
            target_end,
            cigar,
        } = match strand {
            Strand::Forward => self.engine.align(query, target, mode)?,
            Strand::Reverse => self.engine.align(query, &revcomp(target), mode)?,
        };
        let (b_start, b_end) = match strand {
            Strand::Forward => (target_start, target_end),
            Strand::Reverse => (target.len() - target_end, target.len() - target_start),
        };

        let length = cigar.aln_length();
        if length == 0 {
            return Err(AlignError::NoAlignment {
                query_len: query.len(),
                target_len: target.len(),
            });
        }
        Ok(Alignment {
            strand,
            a_start: 0,
            a_end: query.len(),
            b_start,
            b_end,
            cyclic: false,
            diff: edit_distance as f64 / length as f64,
            cigar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::Cigar;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"ACGT"[rng.random_range(0..4)]).collect()
    }

    fn substitute(seq: &[u8], positions: &[usize]) -> Vec<u8> {
        let mut seq = seq.to_vec();
        for &pos in positions {
            seq[pos] = if seq[pos] == b'A' { b'C' } else { b'A' };
        }
        seq
    }

    #[test]
    fn test_prefix_with_revcomp_is_rejected() {
        assert!(matches!(
            SeqAligner::new(AlignMode::Prefix, true),
            Err(AlignError::InvalidConfig(_))
        ));
        assert!(SeqAligner::new(AlignMode::Prefix, false).is_ok());
    }

    #[test]
    fn test_mode_from_name() {
        assert_eq!(
            AlignMode::from_name("global", true).unwrap(),
            AlignMode::Global { cyclic: true }
        );
        assert_eq!(AlignMode::from_name("glocal", false).unwrap(), AlignMode::Glocal);
        assert!(AlignMode::from_name("glocal", true).is_err());
        assert!(AlignMode::from_name("prefix", true).is_err());
        assert!(AlignMode::from_name("local", false).is_err());
    }

    #[test]
    fn test_reverse_prior_requires_revcomp() {
        assert!(SeqAligner::global(false, false)
            .with_strand_prior(Strand::Reverse)
            .is_err());
        assert!(SeqAligner::global(true, false)
            .with_max_true_diff(1.5)
            .is_err());
    }

    #[test]
    fn test_empty_sequences_are_rejected() {
        let aligner = SeqAligner::global(true, true);
        assert_eq!(
            aligner.align(b"", b"ACGT"),
            Err(AlignError::EmptySequence { which: "query" })
        );
        assert_eq!(
            aligner.align(b"ACGT", b""),
            Err(AlignError::EmptySequence { which: "target" })
        );
    }

    #[test]
    fn test_global_alignment_consumes_query() {
        let mut rng = StdRng::seed_from_u64(7);
        let aligner = SeqAligner::global(false, false);
        for _ in 0..20 {
            let q = random_seq(&mut rng, 30);
            let t = random_seq(&mut rng, 25);
            let aln = aligner.align(&q, &t).unwrap();
            assert_eq!(aln.a_aligned_seq(&q), &q[..]);
            assert_eq!((aln.b_start, aln.b_end), (0, t.len()));
            assert_eq!(aln.cigar.query_len(), q.len());
            assert_eq!(aln.cigar.target_len(), t.len());
            assert_eq!(aln.length(), aln.cigar.flatten().len());
            assert!((0.0..=1.0).contains(&aln.diff));
            assert!(aln.gapped_aligned_seqs(&q, &t).is_ok());
        }
    }

    #[test]
    fn test_diff_uses_alignment_length() {
        let aligner = SeqAligner::global(false, false);
        let aln = aligner.align(b"ACGTTACGT", b"ACGTACGT").unwrap();
        assert_eq!(aln.length(), 9);
        assert_eq!(aln.diff, 1.0 / 9.0);
    }

    #[test]
    fn test_reverse_strand_positions() {
        let aligner = SeqAligner::new(AlignMode::Glocal, true).unwrap();
        let target = b"TTTTTTGGCATCAGTTTTTT";
        // reverse complement of target[6..14]
        let query = revcomp(&target[6..14]);
        let aln = aligner.align(&query, target).unwrap();
        assert_eq!(aln.strand, Strand::Reverse);
        assert_eq!((aln.b_start, aln.b_end), (6, 14));
        assert_eq!(aln.diff, 0.0);
        assert_eq!(aln.b_aligned_seq(target), query);
    }

    #[test]
    fn test_ties_keep_forward_strand() {
        // a palindrome aligns equally well on both strands
        let aligner = SeqAligner::global(true, false);
        let aln = aligner.align(b"ACGT", b"ACGT").unwrap();
        assert_eq!(aln.strand, Strand::Forward);
        assert_eq!(aln.diff, 0.0);
    }

    #[test]
    fn test_strand_prior_skips_other_strand() {
        let target = b"GGCATCAGTACCGATT";
        let query = revcomp(target);
        let aligner = SeqAligner::global(true, false)
            .with_max_true_diff(1.0)
            .unwrap();
        // the forward strand is good enough under this tolerance
        assert_eq!(aligner.align(&query, target).unwrap().strand, Strand::Forward);

        let aligner = SeqAligner::global(true, false)
            .with_strand_prior(Strand::Reverse)
            .unwrap();
        let aln = aligner.align(&query, target).unwrap();
        assert_eq!(aln.strand, Strand::Reverse);
        assert_eq!(aln.diff, 0.0);
    }

    #[test]
    fn test_revcomp_symmetry() {
        let mut rng = StdRng::seed_from_u64(11);
        let aligner = SeqAligner::global(true, false);
        for _ in 0..10 {
            let t = random_seq(&mut rng, 40);
            let q = substitute(&t, &[3, 17, 30]);
            let fwd = aligner.align(&q, &t).unwrap();
            let rev = aligner.align(&revcomp(&q), &t).unwrap();
            assert_eq!(fwd.strand, Strand::Forward);
            assert_eq!(rev.strand, fwd.strand.opposite());
            assert_eq!(fwd.diff, rev.diff);
            assert_eq!(fwd.diff, 3.0 / 40.0);
        }
    }

    #[test]
    fn test_cyclic_boundary() {
        let target = b"ACGGTCATTGCAAGTCCTAG";
        assert_eq!(target.len(), 20);
        let query = rotate(target, 13);
        let aligner = SeqAligner::global(true, true);
        let aln = aligner.align(&query, target).unwrap();
        assert!(aln.is_cyclic());
        assert_eq!((aln.b_start, aln.b_end), (13, 13));
        assert_eq!(aln.diff, 0.0);
        assert_eq!(aln.strand, Strand::Forward);
        assert_eq!(aln.b_aligned_seq(target), query);
    }

    #[test]
    fn test_cyclic_rotations() {
        let mut rng = StdRng::seed_from_u64(3);
        let target = random_seq(&mut rng, 30);
        let aligner = SeqAligner::global(true, true);
        for k in 0..target.len() {
            let query = rotate(&target, k);
            let aln = aligner.align(&query, &target).unwrap();
            assert_eq!(aln.diff, 0.0, "rotation {}", k);
            assert!(aln.is_cyclic());
            assert_eq!(aln.b_start, aln.b_end);
            assert_eq!(aln.b_aligned_seq(&target), query);
        }
    }

    #[test]
    fn test_cyclic_reverse_strand() {
        let target = b"ACGGTCATTGCAAGTCCTAG";
        let query = revcomp(&rotate(target, 5));
        let aligner = SeqAligner::global(true, true);
        let aln = aligner.align(&query, target).unwrap();
        assert_eq!(aln.strand, Strand::Reverse);
        assert_eq!(aln.diff, 0.0);
        assert!(aln.is_cyclic());
        assert_eq!(aln.b_aligned_seq(target), query);
    }

    #[test]
    fn test_cyclic_with_mutation_realigns_globally() {
        let mut rng = StdRng::seed_from_u64(5);
        let target = random_seq(&mut rng, 40);
        // drop one base next to the breakpoint
        let mut query = rotate(&target, 10);
        query.remove(0);
        let aligner = SeqAligner::global(false, true);
        let aln = aligner.align(&query, &target).unwrap();
        assert!(aln.is_cyclic());
        assert_eq!(aln.b_start, aln.b_end);
        assert_eq!(aln.edit_distance(), 1);
        assert_eq!(aln.cigar.target_len(), target.len());
        assert_eq!(aln.cigar.query_len(), query.len());
        let (a, b) = aln.gapped_aligned_seqs(&query, &target).unwrap();
        assert_eq!(a.len(), b.len());
    }

    struct FixedEngine;

    impl EditAligner for FixedEngine {
        fn align(&self, query: &[u8], target: &[u8], _mode: EditMode) -> Result<EditHit, AlignError> {
            Ok(EditHit {
                edit_distance: 0,
                target_start: 0,
                target_end: target.len().min(query.len()),
                cigar: Cigar::from_runs(vec![(query.len(), crate::align::CigarOp::Match)]),
            })
        }
    }

    #[test]
    fn test_custom_engine() {
        let aligner = SeqAligner::with_engine(AlignMode::Glocal, false, FixedEngine).unwrap();
        let aln = aligner.align(b"ACG", b"ACGTT").unwrap();
        assert_eq!((aln.b_start, aln.b_end), (0, 3));
        assert_eq!(aln.diff, 0.0);
    }
}
