use crate::align::{AlignError, Alignment, CigarOp, SeqAligner};
use rustc_hash::FxHashMap;
use std::{collections::BTreeMap, fmt, str::FromStr};
use waffle_con::consensus::ConsensusDWFA;

const GAP: u8 = b'-';

/// Builds one consensus sequence from a group of sequences sharing strand and
/// phase. An `Err` means the engine produced no usable consensus.
pub trait ConsensusEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn consensus(&self, seqs: &[&[u8]]) -> Result<Vec<u8>, String>;
}

/// Consensus through dynamic WFA exploration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DwfaConsensus;

impl ConsensusEngine for DwfaConsensus {
    fn name(&self) -> &'static str {
        "dwfa"
    }

    fn consensus(&self, seqs: &[&[u8]]) -> Result<Vec<u8>, String> {
        if seqs.is_empty() {
            return Err("no sequences to build a consensus from".into());
        }
        let mut cdwfa: ConsensusDWFA = Default::default();
        for seq in seqs {
            cdwfa.add_sequence(seq).map_err(|e| e.to_string())?;
        }
        let consensuses = cdwfa.consensus().map_err(|e| e.to_string())?;
        match consensuses.first() {
            Some(cons) if !cons.sequence().is_empty() => Ok(cons.sequence().to_vec()),
            _ => Err("consensus engine returned no sequence".into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedChoice {
    /// First sequence as given
    #[default]
    AsGiven,
    /// Median sequence by length
    Median,
    Longest,
}

impl FromStr for SeedChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "as-given" => Ok(SeedChoice::AsGiven),
            "median" => Ok(SeedChoice::Median),
            "longest" => Ok(SeedChoice::Longest),
            _ => Err(format!(
                "invalid seed choice {} (expected as-given, median or longest)",
                s
            )),
        }
    }
}

impl fmt::Display for SeedChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedChoice::AsGiven => write!(f, "as-given"),
            SeedChoice::Median => write!(f, "median"),
            SeedChoice::Longest => write!(f, "longest"),
        }
    }
}

/// Seed first, then the remaining sequences in the order they are aligned.
fn seed_order(seqs: &[&[u8]], seed: SeedChoice) -> Vec<usize> {
    let mut order: Vec<usize> = (0..seqs.len()).collect();
    match seed {
        SeedChoice::AsGiven => {}
        SeedChoice::Longest => order.sort_by_key(|&i| std::cmp::Reverse(seqs[i].len())),
        SeedChoice::Median => {
            order.sort_by_key(|&i| std::cmp::Reverse(seqs[i].len()));
            let median = order.remove(order.len() / 2);
            order.insert(0, median);
        }
    }
    order
}

/// Alleles observed at a seed position `(pos, 0)` or at the `k`-th base
/// inserted before seed position `pos` (`(pos, k)`, `k >= 1`). Only symbols
/// that differ from the seed are counted.
type SiteCounts = BTreeMap<(usize, usize), FxHashMap<u8, usize>>;

/// Tallies the differences of every sequence in `others` against the seed.
/// Alignments are looked up in, or added to, `alignments` keyed by
/// `(seed, other)`.
pub fn count_discrepant_sites(
    seqs: &[&[u8]],
    seed: usize,
    others: &[usize],
    aligner: &SeqAligner,
    alignments: &mut FxHashMap<(usize, usize), Alignment>,
) -> Result<SiteCounts, AlignError> {
    let mut sites = SiteCounts::new();
    for &other in others {
        let aln = match alignments.entry((seed, other)) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(aligner.align(seqs[other], seqs[seed])?)
            }
        };
        let query = seqs[other];
        let (mut seed_pos, mut query_pos, mut extra_pos) = (aln.b_start, aln.a_start, 0);
        for op in aln.cigar.flatten().ops() {
            match op {
                CigarOp::Match => {
                    seed_pos += 1;
                    query_pos += 1;
                }
                CigarOp::Mismatch | CigarOp::Masked => {
                    *sites
                        .entry((seed_pos, 0))
                        .or_default()
                        .entry(query[query_pos])
                        .or_default() += 1;
                    seed_pos += 1;
                    query_pos += 1;
                }
                CigarOp::Del => {
                    *sites.entry((seed_pos, 0)).or_default().entry(GAP).or_default() += 1;
                    seed_pos += 1;
                }
                CigarOp::Ins => {
                    extra_pos += 1;
                    *sites
                        .entry((seed_pos, extra_pos))
                        .or_default()
                        .entry(query[query_pos])
                        .or_default() += 1;
                    query_pos += 1;
                }
            }
            if *op != CigarOp::Ins {
                extra_pos = 0;
            }
        }
    }
    Ok(sites)
}

/// Most frequent symbol at a site. `remainder` is the symbol implied for every
/// sequence without a counted difference; it wins ties, then the smallest byte.
fn vote(counts: &FxHashMap<u8, usize>, remainder: u8, total: usize) -> u8 {
    let observed: usize = counts.values().sum();
    let mut best = (remainder, total.saturating_sub(observed));
    let mut alleles: Vec<(u8, usize)> = counts.iter().map(|(&b, &c)| (b, c)).collect();
    alleles.sort_unstable();
    for (base, count) in alleles {
        if base != remainder && count > best.1 {
            best = (base, count);
        }
    }
    best.0
}

/// Majority vote over the global alignments of all sequences to a seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityVote {
    pub seed: SeedChoice,
}

impl MajorityVote {
    pub fn new(seed: SeedChoice) -> Self {
        MajorityVote { seed }
    }

    pub fn vote(&self, seqs: &[&[u8]]) -> Result<Vec<u8>, AlignError> {
        let order = seed_order(seqs, self.seed);
        let Some((&seed, others)) = order.split_first() else {
            return Ok(Vec::new());
        };
        if others.is_empty() {
            return Ok(seqs[seed].to_vec());
        }

        let aligner = SeqAligner::global(false, false);
        let mut alignments = FxHashMap::default();
        let sites = count_discrepant_sites(seqs, seed, others, &aligner, &mut alignments)?;

        let seed_seq = seqs[seed];
        let total = seqs.len();
        let no_counts = FxHashMap::default();
        let mut consensus = Vec::with_capacity(seed_seq.len());
        for pos in 0..=seed_seq.len() {
            let mut extra_pos = 1;
            while let Some(counts) = sites.get(&(pos, extra_pos)) {
                consensus.push(vote(counts, GAP, total));
                extra_pos += 1;
            }
            if let Some(&base) = seed_seq.get(pos) {
                let counts = sites.get(&(pos, 0)).unwrap_or(&no_counts);
                consensus.push(vote(counts, base, total));
            }
        }
        consensus.retain(|&b| b != GAP);
        Ok(consensus)
    }
}

impl ConsensusEngine for MajorityVote {
    fn name(&self) -> &'static str {
        "vote"
    }

    fn consensus(&self, seqs: &[&[u8]]) -> Result<Vec<u8>, String> {
        if seqs.is_empty() {
            return Err("no sequences to build a consensus from".into());
        }
        self.vote(seqs).map_err(|e| e.to_string())
    }
}
