use crate::align::SeqAligner;
use crate::cli::AlignArgs;
use crate::utils::{read_fasta, Result, SeqRecord};
use std::io::{self, BufWriter, Write};

pub fn align(args: AlignArgs) -> Result<()> {
    let aligner = SeqAligner::new(args.align_mode()?, args.revcomp)
        .and_then(|aligner| aligner.with_max_true_diff(args.max_true_diff))
        .map_err(|e| e.to_string())?;
    let queries = read_fasta(&args.query_path)?;
    let targets = read_fasta(&args.target_path)?;
    log::info!(
        "Aligning {} queries against {} targets ({} mode)",
        queries.len(),
        targets.len(),
        aligner.mode()
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_alignments(&mut out, &aligner, &queries, &targets, &args)?;
    out.flush().map_err(|e| e.to_string())
}

/// One `query\ttarget\tsummary\tcigar` line per pair, each optionally followed
/// by the rendered alignment.
fn write_alignments<W: Write>(
    out: &mut W,
    aligner: &SeqAligner,
    queries: &[SeqRecord],
    targets: &[SeqRecord],
    args: &AlignArgs,
) -> Result<()> {
    for query in queries {
        for target in targets {
            let aln = aligner
                .align(&query.seq, &target.seq)
                .map_err(|e| format!("{} vs {}: {}", query.name, target.name, e))?;
            writeln!(out, "{}\t{}\t{}\t{}", query.name, target.name, aln, aln.cigar)
                .map_err(|e| e.to_string())?;
            if args.show {
                let rendered = aln
                    .pretty(&query.seq, &target.seq, args.width, args.twist)
                    .map_err(|e| e.to_string())?;
                writeln!(out, "{}", rendered).map_err(|e| e.to_string())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignMode;
    use crate::cli::{Cli, Command};
    use crate::utils::rotate;
    use clap::Parser;

    fn parse_align_args(query: &str, target: &str, extra: &[&str]) -> AlignArgs {
        let mut argv = vec!["seqclust", "align", "-q", query, "-r", target];
        argv.extend_from_slice(extra);
        let cli = Cli::try_parse_from(argv).unwrap();
        let Command::Align(args) = cli.command else {
            panic!("expected the align subcommand");
        };
        args
    }

    #[test]
    fn test_cyclic_alignment_summary() {
        let dir = tempfile::tempdir().unwrap();
        let target = b"ACGGTCATTGCAAGTCCTAG".to_vec();
        let query = rotate(&target, 13);
        let query_path = dir.path().join("query.fa");
        let target_path = dir.path().join("target.fa");
        std::fs::write(
            &query_path,
            format!(">q\n{}\n", String::from_utf8(query).unwrap()),
        )
        .unwrap();
        std::fs::write(
            &target_path,
            format!(">t\n{}\n", String::from_utf8(target).unwrap()),
        )
        .unwrap();

        let args = parse_align_args(
            query_path.to_str().unwrap(),
            target_path.to_str().unwrap(),
            &["--cyclic"],
        );
        assert_eq!(args.align_mode().unwrap(), AlignMode::Global { cyclic: true });
        let aligner = SeqAligner::new(args.align_mode().unwrap(), args.revcomp).unwrap();
        let queries = read_fasta(&args.query_path).unwrap();
        let targets = read_fasta(&args.target_path).unwrap();

        let mut out = Vec::new();
        write_alignments(&mut out, &aligner, &queries, &targets, &args).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "q\tt\ta[0:20] ~ b[13:] + b[:13] (20 bp, 0.00 %diff)\t20=\n"
        );
    }

    #[test]
    fn test_cyclic_requires_global_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.fa");
        std::fs::write(&path, ">s\nACGT\n").unwrap();
        let path = path.to_str().unwrap();
        let args = parse_align_args(path, path, &["--mode", "prefix", "--cyclic"]);
        assert!(args.align_mode().is_err());
        assert!(align(args).is_err());
    }
}
