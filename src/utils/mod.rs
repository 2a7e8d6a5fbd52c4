mod readers;
mod seq;
mod util;
mod writers;

pub use readers::{open_fasta_reader, read_fasta, SeqRecord};
pub use seq::{revcomp, rotate, validate_seq, InvalidBase};
pub use util::{file_error, handle_error_and_exit, Result};
pub use writers::{create_writer, write_assignments, write_consensus_fasta};
