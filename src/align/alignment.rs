use super::{AlignError, Cigar, CigarOp};
use crate::utils::revcomp;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn opposite(self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
        }
    }

    /// 0 for forward, 1 for reverse
    pub fn as_index(self) -> u8 {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 1,
        }
    }
}

/// Alignment of a query (`a`) against a target (`b`).
///
/// All positions are on the forward strand of their sequence and end exclusive,
/// so that `a[a_start..a_end]` is obtained by applying `cigar` to
/// [`Alignment::b_aligned_seq`]. A cyclic alignment covers the whole circular
/// target exactly once starting at `b_start`, in which case `b_start == b_end`.
/// The sequences themselves are not kept; views take them as arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub strand: Strand,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
    pub cyclic: bool,
    /// Edit distance divided by the alignment length
    pub diff: f64,
    pub cigar: Cigar,
}

impl Alignment {
    /// Alignment length including gaps.
    pub fn length(&self) -> usize {
        self.cigar.aln_length()
    }

    pub fn edit_distance(&self) -> usize {
        self.cigar.edit_distance()
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    pub fn a_aligned_seq<'a>(&self, a_seq: &'a [u8]) -> &'a [u8] {
        &a_seq[self.a_start..self.a_end]
    }

    /// The part of `b_seq` aligned to the query, in the query's orientation.
    pub fn b_aligned_seq(&self, b_seq: &[u8]) -> Vec<u8> {
        let seq = if self.cyclic {
            [&b_seq[self.b_start..], &b_seq[..self.b_end]].concat()
        } else {
            b_seq[self.b_start..self.b_end].to_vec()
        };
        match self.strand {
            Strand::Forward => seq,
            Strand::Reverse => revcomp(&seq),
        }
    }

    /// Both aligned sequences with `-` in gap columns.
    pub fn gapped_aligned_seqs(
        &self,
        a_seq: &[u8],
        b_seq: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), AlignError> {
        let a_aligned = self.a_aligned_seq(a_seq);
        let b_aligned = self.b_aligned_seq(b_seq);
        let inconsistent = || AlignError::InconsistentCigar {
            cigar: self.cigar.to_string(),
        };

        let mut a_gapped = Vec::with_capacity(self.length());
        let mut b_gapped = Vec::with_capacity(self.length());
        let (mut a_pos, mut b_pos) = (0, 0);
        for &op in self.cigar.flatten().ops() {
            match op {
                CigarOp::Match | CigarOp::Mismatch => {
                    a_gapped.push(*a_aligned.get(a_pos).ok_or_else(inconsistent)?);
                    b_gapped.push(*b_aligned.get(b_pos).ok_or_else(inconsistent)?);
                    a_pos += 1;
                    b_pos += 1;
                }
                CigarOp::Ins => {
                    a_gapped.push(*a_aligned.get(a_pos).ok_or_else(inconsistent)?);
                    b_gapped.push(b'-');
                    a_pos += 1;
                }
                CigarOp::Del => {
                    a_gapped.push(b'-');
                    b_gapped.push(*b_aligned.get(b_pos).ok_or_else(inconsistent)?);
                    b_pos += 1;
                }
                CigarOp::Masked => return Err(inconsistent()),
            }
        }
        if a_pos != a_aligned.len() || b_pos != b_aligned.len() {
            return Err(inconsistent());
        }
        Ok((a_gapped, b_gapped))
    }

    /// Renders the alignment in blocks of `width` columns. With `twist`, match
    /// columns are collapsed onto the middle line and only differences are
    /// shown on the sequence lines.
    pub fn pretty(
        &self,
        a_seq: &[u8],
        b_seq: &[u8],
        width: usize,
        twist: bool,
    ) -> Result<String, AlignError> {
        let (mut a_str, mut b_str) = self.gapped_aligned_seqs(a_seq, b_seq)?;
        let mut mid_str: Vec<u8> = self
            .cigar
            .flatten()
            .ops()
            .iter()
            .map(|op| op.as_char() as u8)
            .collect();
        // the position lines count bases, so keep the originals for that
        let (a_bases, b_bases) = (a_str.clone(), b_str.clone());
        if twist {
            for i in 0..mid_str.len() {
                if mid_str[i] == b'=' {
                    mid_str[i] = a_str[i];
                    a_str[i] = b' ';
                    b_str[i] = b' ';
                } else {
                    mid_str[i] = b' ';
                }
            }
        }

        let width = width.max(1);
        let b_len = b_seq.len().max(1);
        let n_digit = [self.a_start, self.a_end, self.b_start, self.b_end]
            .iter()
            .map(|x| x.to_string().len())
            .max()
            .unwrap_or(1);
        let mut a_pos = self.a_start;
        let mut b_pos = match self.strand {
            Strand::Forward => self.b_start % b_len,
            Strand::Reverse => (self.b_end + b_len - 1) % b_len,
        };

        let mut out = String::new();
        for start in (0..mid_str.len()).step_by(width) {
            let end = (start + width).min(mid_str.len());
            out.push_str(&format!(
                "a:{:>w$}  {}\n",
                a_pos,
                String::from_utf8_lossy(&a_str[start..end]),
                w = n_digit
            ));
            out.push_str(&format!(
                "  {:>w$}  {}\n",
                "",
                String::from_utf8_lossy(&mid_str[start..end]),
                w = n_digit
            ));
            out.push_str(&format!(
                "b:{:>w$}  {}\n\n",
                b_pos,
                String::from_utf8_lossy(&b_str[start..end]),
                w = n_digit
            ));
            a_pos += a_bases[start..end].iter().filter(|&&c| c != b'-').count();
            let b_step = b_bases[start..end].iter().filter(|&&c| c != b'-').count() % b_len;
            b_pos = match self.strand {
                Strand::Forward => (b_pos + b_step) % b_len,
                Strand::Reverse => (b_pos + b_len - b_step) % b_len,
            };
        }
        Ok(out)
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b_repr = if self.cyclic {
            format!("b[{}:] + b[:{}]", self.b_start, self.b_end)
        } else {
            format!("b[{}:{}]", self.b_start, self.b_end)
        };
        let b_repr = match self.strand {
            Strand::Forward => b_repr,
            Strand::Reverse => format!("*({})", b_repr),
        };
        write!(
            f,
            "a[{}:{}] ~ {} ({} bp, {:.2} %diff)",
            self.a_start,
            self.a_end,
            b_repr,
            self.length(),
            100.0 * self.diff
        )
    }
}
