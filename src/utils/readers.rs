use super::{file_error, validate_seq, Result};
use bio::io::fasta;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read as ioRead};
use std::path::Path;

/// A named input sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub name: String,
    pub seq: Vec<u8>,
}

fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".gzip")
}

pub fn open_fasta_reader(path: &Path) -> Result<fasta::Reader<BufReader<Box<dyn ioRead>>>> {
    let file = File::open(path).map_err(|e| file_error(path.display(), e))?;
    let inner: Box<dyn ioRead> = if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_none() {
            return Err(format!("Invalid gzip header: {}", path.to_string_lossy()));
        }
        Box::new(gz_decoder)
    } else {
        Box::new(file)
    };
    Ok(fasta::Reader::from_bufread(BufReader::new(inner)))
}

/// Reads every record of a (possibly gzipped) FASTA file. Empty records and
/// bases outside `ACGTNacgtn-` are rejected.
pub fn read_fasta(path: &Path) -> Result<Vec<SeqRecord>> {
    let reader = open_fasta_reader(path)?;
    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| format!("{}: record {}: {}", path.display(), index, e))?;
        let name = record.id().to_string();
        if record.seq().is_empty() {
            return Err(format!("{}: sequence {} is empty", path.display(), name));
        }
        validate_seq(record.seq())
            .map_err(|e| format!("{}: sequence {}: {}", path.display(), name, e))?;
        records.push(SeqRecord {
            name,
            seq: record.seq().to_vec(),
        });
    }
    log::debug!("Read {} sequences from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    #[test]
    fn test_read_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.fa");
        std::fs::write(&path, ">s1 first\nACGT\nAC\n>s2\nggtt\n").unwrap();
        let records = read_fasta(&path).unwrap();
        assert_eq!(
            records,
            vec![
                SeqRecord {
                    name: "s1".into(),
                    seq: b"ACGTAC".to_vec()
                },
                SeqRecord {
                    name: "s2".into(),
                    seq: b"ggtt".to_vec()
                },
            ]
        );
    }

    #[test]
    fn test_read_gzipped_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.fa.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b">s1\nACGT\n").unwrap();
        encoder.finish().unwrap();
        let records = read_fasta(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].seq, b"ACGT".to_vec());
    }

    #[test]
    fn test_invalid_bases_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.fa");
        std::fs::write(&path, ">s1\nACGU\n").unwrap();
        assert!(read_fasta(&path).is_err());
        assert!(read_fasta(&dir.path().join("missing.fa")).is_err());
    }
}
