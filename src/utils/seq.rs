use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid nucleotide byte {base:#04x} at position {pos}")]
pub struct InvalidBase {
    pub base: u8,
    pub pos: usize,
}

#[inline]
fn complement(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(b'T'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'T' => Some(b'A'),
        b'a' => Some(b't'),
        b'c' => Some(b'g'),
        b'g' => Some(b'c'),
        b't' => Some(b'a'),
        b'N' | b'n' | b'-' => Some(base),
        _ => None,
    }
}

/// Checks that every byte belongs to `ACGTNacgtn-`.
pub fn validate_seq(seq: &[u8]) -> Result<(), InvalidBase> {
    match seq.iter().position(|&b| complement(b).is_none()) {
        Some(pos) => Err(InvalidBase {
            base: seq[pos],
            pos,
        }),
        None => Ok(()),
    }
}

/// Reverse complement. Bytes outside the nucleotide alphabet are kept as-is;
/// callers that care run `validate_seq` first.
pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| complement(b).unwrap_or(b))
        .collect()
}

/// `seq[pos..] + seq[..pos]`
pub fn rotate(seq: &[u8], pos: usize) -> Vec<u8> {
    let pos = if seq.is_empty() { 0 } else { pos % seq.len() };
    let mut rotated = Vec::with_capacity(seq.len());
    rotated.extend_from_slice(&seq[pos..]);
    rotated.extend_from_slice(&seq[..pos]);
    rotated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revcomp() {
        assert_eq!(revcomp(b"ACGTTn-a"), b"t-nAACGT".to_vec());
        assert_eq!(revcomp(b""), Vec::<u8>::new());
        assert_eq!(revcomp(&revcomp(b"GATTACA")), b"GATTACA".to_vec());
    }

    #[test]
    fn test_validate_seq() {
        assert!(validate_seq(b"ACGTNacgtn-").is_ok());
        assert_eq!(
            validate_seq(b"ACGU"),
            Err(InvalidBase { base: b'U', pos: 3 })
        );
    }

    #[test]
    fn test_rotate() {
        assert_eq!(rotate(b"ABCDE", 2), b"CDEAB".to_vec());
        assert_eq!(rotate(b"ABCDE", 0), b"ABCDE".to_vec());
        assert_eq!(rotate(b"ABCDE", 5), b"ABCDE".to_vec());
    }
}
