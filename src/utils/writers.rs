use super::{file_error, Result};
use crate::cluster::ClusterConsensus;
use bio::io::fasta;
use std::{
    fs::File,
    io::{BufWriter, Write},
};

pub fn create_writer<T, F>(output_prefix: &str, output_suffix: &str, f: F) -> Result<T>
where
    F: FnOnce(&str) -> Result<T>,
{
    let output_path = format!("{}.{}", output_prefix, output_suffix);
    f(&output_path)
}

pub fn write_consensus_fasta(path: &str, consensus: &[ClusterConsensus]) -> Result<()> {
    let file = File::create(path).map_err(|e| file_error(path, e))?;
    let mut writer = fasta::Writer::new(file);
    for cons in consensus {
        let id = format!("cluster{}", cons.cluster_id);
        let desc = format!("size={} length={}", cons.cluster_size, cons.seq.len());
        writer
            .write(&id, Some(&desc), &cons.seq)
            .map_err(|e| file_error(path, e))?;
    }
    writer.flush().map_err(|e| file_error(path, e))
}

/// One `name<TAB>cluster_id` line per input sequence.
pub fn write_assignments(path: &str, names: &[String], assignments: &[i32]) -> Result<()> {
    let file = File::create(path).map_err(|e| file_error(path, e))?;
    let mut writer = BufWriter::new(file);
    for (name, cluster_id) in names.iter().zip(assignments) {
        writeln!(writer, "{}\t{}", name, cluster_id).map_err(|e| file_error(path, e))?;
    }
    writer.flush().map_err(|e| file_error(path, e))
}
