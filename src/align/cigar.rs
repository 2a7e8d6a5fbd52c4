use bio::alignment::AlignmentOperation;
use itertools::Itertools;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOp {
    /// `=`
    Match,
    /// `X`
    Mismatch,
    /// `I`: base present in the query only
    Ins,
    /// `D`: base present in the target only
    Del,
    /// `N`: produced by interval masking
    Masked,
}

impl CigarOp {
    pub fn as_char(self) -> char {
        match self {
            CigarOp::Match => '=',
            CigarOp::Mismatch => 'X',
            CigarOp::Ins => 'I',
            CigarOp::Del => 'D',
            CigarOp::Masked => 'N',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(CigarOp::Match),
            'X' => Some(CigarOp::Mismatch),
            'I' => Some(CigarOp::Ins),
            'D' => Some(CigarOp::Del),
            'N' => Some(CigarOp::Masked),
            _ => None,
        }
    }

    /// Exchanges `I` and `D`, i.e. the roles of query and target.
    pub fn swapped(self) -> Self {
        match self {
            CigarOp::Ins => CigarOp::Del,
            CigarOp::Del => CigarOp::Ins,
            op => op,
        }
    }

    pub fn is_edit(self) -> bool {
        matches!(self, CigarOp::Mismatch | CigarOp::Ins | CigarOp::Del)
    }
}

pub type CigarRun = (usize, CigarOp);

/// Run-length encoded edit script that turns the aligned target into the
/// aligned query. Adjacent runs never share an operation and no run is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cigar {
    runs: Vec<CigarRun>,
}

impl Cigar {
    pub fn from_runs<I>(runs: I) -> Self
    where
        I: IntoIterator<Item = CigarRun>,
    {
        let runs = runs
            .into_iter()
            .filter(|(len, _)| *len > 0)
            .coalesce(|(len1, op1), (len2, op2)| {
                if op1 == op2 {
                    Ok((len1 + len2, op1))
                } else {
                    Err(((len1, op1), (len2, op2)))
                }
            })
            .collect();
        Cigar { runs }
    }

    /// Converts rust-bio operations (x = query, y = target); clips are dropped.
    pub fn from_bio_ops(ops: &[AlignmentOperation]) -> Self {
        Self::from_runs(ops.iter().filter_map(|op| match op {
            AlignmentOperation::Match => Some((1, CigarOp::Match)),
            AlignmentOperation::Subst => Some((1, CigarOp::Mismatch)),
            AlignmentOperation::Ins => Some((1, CigarOp::Ins)),
            AlignmentOperation::Del => Some((1, CigarOp::Del)),
            AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => None,
        }))
    }

    pub fn runs(&self) -> &[CigarRun] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Alignment length including gaps.
    pub fn aln_length(&self) -> usize {
        self.runs.iter().map(|(len, _)| len).sum()
    }

    pub fn edit_distance(&self) -> usize {
        self.runs
            .iter()
            .filter(|(_, op)| op.is_edit())
            .map(|(len, _)| len)
            .sum()
    }

    pub fn query_len(&self) -> usize {
        self.runs
            .iter()
            .filter(|(_, op)| *op != CigarOp::Del)
            .map(|(len, _)| len)
            .sum()
    }

    pub fn target_len(&self) -> usize {
        self.runs
            .iter()
            .filter(|(_, op)| *op != CigarOp::Ins)
            .map(|(len, _)| len)
            .sum()
    }

    /// Reverses the run order without swapping `I`/`D`; this is the CIGAR of
    /// the reverse-complemented pair.
    pub fn reverse(&self) -> Cigar {
        Cigar {
            runs: self.runs.iter().rev().copied().collect(),
        }
    }

    pub fn swap(&self) -> Cigar {
        Cigar {
            runs: self
                .runs
                .iter()
                .map(|&(len, op)| (len, op.swapped()))
                .collect(),
        }
    }

    pub fn flatten(&self) -> FlatCigar {
        FlatCigar {
            ops: self
                .runs
                .iter()
                .flat_map(|&(len, op)| std::iter::repeat(op).take(len))
                .collect(),
        }
    }

    /// Replaces the operations falling inside any of the 0-based, end-inclusive
    /// `intervals` with `N`. The position counter advances on every operation
    /// after the first one except `ignore_op`.
    pub fn mask_intvl(&self, intervals: &[(usize, usize)], ignore_op: CigarOp) -> FlatCigar {
        let intervals = intervals.iter().copied().sorted().collect_vec();
        let mut ops = self.flatten().ops;
        let mut index = 0;
        let mut pos = 0;
        for (i, op) in ops.iter_mut().enumerate() {
            if index >= intervals.len() {
                break;
            }
            if i != 0 && *op != ignore_op {
                pos += 1;
            }
            while index < intervals.len() && pos > intervals[index].1 {
                index += 1;
            }
            if let Some(&(start, end)) = intervals.get(index) {
                if start <= pos && pos <= end {
                    *op = CigarOp::Masked;
                }
            }
        }
        FlatCigar { ops }
    }
}

impl FromStr for Cigar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut runs = Vec::new();
        let mut len_digits = String::new();
        for c in s.chars() {
            if c.is_ascii_digit() {
                len_digits.push(c);
                continue;
            }
            let op = CigarOp::from_char(c)
                .ok_or_else(|| format!("Invalid CIGAR operation '{}' in {}", c, s))?;
            let len = if len_digits.is_empty() {
                1
            } else {
                len_digits
                    .parse()
                    .map_err(|e| format!("Invalid CIGAR length in {}: {}", s, e))?
            };
            runs.push((len, op));
            len_digits.clear();
        }
        if !len_digits.is_empty() {
            return Err(format!("CIGAR ends with a dangling length: {}", s));
        }
        Ok(Cigar::from_runs(runs))
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (len, op) in &self.runs {
            write!(f, "{}{}", len, op.as_char())?;
        }
        Ok(())
    }
}

/// One operation per alignment column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatCigar {
    ops: Vec<CigarOp>,
}

impl FlatCigar {
    pub fn ops(&self) -> &[CigarOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn reverse(&self) -> FlatCigar {
        FlatCigar {
            ops: self.ops.iter().rev().copied().collect(),
        }
    }

    pub fn swap(&self) -> FlatCigar {
        FlatCigar {
            ops: self.ops.iter().map(|op| op.swapped()).collect(),
        }
    }

    pub fn unflatten(&self) -> Cigar {
        Cigar::from_runs(self.ops.iter().map(|&op| (1, op)))
    }
}

impl FromStr for FlatCigar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ops = s
            .chars()
            .map(|c| CigarOp::from_char(c).ok_or_else(|| format!("Invalid CIGAR operation '{}'", c)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FlatCigar { ops })
    }
}

impl fmt::Display for FlatCigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            write!(f, "{}", op.as_char())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cigar(s: &str) -> Cigar {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_format() {
        let c = cigar("15=1X2D3=");
        assert_eq!(
            c.runs(),
            &[
                (15, CigarOp::Match),
                (1, CigarOp::Mismatch),
                (2, CigarOp::Del),
                (3, CigarOp::Match)
            ]
        );
        assert_eq!(c.to_string(), "15=1X2D3=");
        assert_eq!(cigar("=X=").to_string(), "1=1X1=");
        assert!("3=4".parse::<Cigar>().is_err());
        assert!("3M".parse::<Cigar>().is_err());
    }

    #[test]
    fn test_adjacent_runs_are_merged() {
        assert_eq!(cigar("2=3=1I").to_string(), "5=1I");
        assert_eq!(Cigar::from_runs(vec![(0, CigarOp::Del), (2, CigarOp::Match)]).to_string(), "2=");
    }

    #[test]
    fn test_lengths() {
        let c = cigar("15=1X2D3=4I");
        assert_eq!(c.aln_length(), 25);
        assert_eq!(c.edit_distance(), 7);
        assert_eq!(c.query_len(), 23);
        assert_eq!(c.target_len(), 21);
    }

    #[test]
    fn test_flatten_unflatten() {
        let c = cigar("15=1X2D3=");
        let flat = c.flatten();
        assert_eq!(flat.to_string(), "===============XDD===");
        assert_eq!(flat.len(), c.aln_length());
        assert_eq!(flat.unflatten(), c);
        for s in ["1=", "1I1D1I", "3X2=10D1=7I", "2N3="] {
            assert_eq!(cigar(s).flatten().unflatten(), cigar(s));
        }
        assert_eq!(FlatCigar::default().unflatten(), Cigar::default());
    }

    #[test]
    fn test_reverse_keeps_indels() {
        assert_eq!(cigar("3=1I2D").reverse().to_string(), "2D1I3=");
        assert_eq!(cigar("3=1I2D").flatten().reverse().to_string(), "DDI===");
    }

    #[test]
    fn test_swap() {
        assert_eq!(cigar("3=1I2D1X").swap().to_string(), "3=1D2I1X");
        assert_eq!(cigar("3=1I2D").swap().swap(), cigar("3=1I2D"));
        assert_eq!(cigar("1I2D").flatten().swap().to_string(), "DII");
    }

    #[test]
    fn test_mask_intvl() {
        let c = cigar("10=");
        assert_eq!(c.mask_intvl(&[(2, 4)], CigarOp::Del).to_string(), "==NNN=====");
        // both ends are inclusive
        assert_eq!(
            c.mask_intvl(&[(0, 0), (9, 9)], CigarOp::Del).to_string(),
            "N========N"
        );
        // overlapping the end of the alignment
        assert_eq!(c.mask_intvl(&[(8, 20)], CigarOp::Del).unflatten().to_string(), "8=2N");
    }

    #[test]
    fn test_mask_intvl_ignores_op() {
        // the deletions do not advance the position counter
        let c = cigar("3=2D3=");
        assert_eq!(c.mask_intvl(&[(3, 3)], CigarOp::Del).to_string(), "===DDN==");
        assert_eq!(c.mask_intvl(&[(3, 3)], CigarOp::Ins).to_string(), "===ND===");
    }

    #[test]
    fn test_mask_intvl_is_pure() {
        let c = cigar("6=");
        let first = c.mask_intvl(&[(0, 1)], CigarOp::Del);
        let second = c.mask_intvl(&[(4, 5)], CigarOp::Del);
        assert_eq!(first.to_string(), "NN====");
        assert_eq!(second.to_string(), "====NN");
        assert_eq!(c.to_string(), "6=");
    }

    #[test]
    fn test_from_bio_ops() {
        use AlignmentOperation::*;
        let ops = [Yclip(3), Match, Match, Subst, Ins, Del, Del, Match, Yclip(2)];
        assert_eq!(Cigar::from_bio_ops(&ops).to_string(), "2=1X1I2D1=");
    }
}
