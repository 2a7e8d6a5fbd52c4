use crate::align::SeqAligner;
use crate::cli::{ClusterArgs, EngineChoice};
use crate::cluster::{ConsensusEngine, ConsensusParams, DwfaConsensus, MajorityVote, SeqClustering};
use crate::utils::{
    create_writer, read_fasta, write_assignments, write_consensus_fasta, Result, SeqRecord,
};
use std::time;

pub fn cluster(args: ClusterArgs) -> Result<()> {
    let start_timer = time::Instant::now();

    let records = read_fasta(&args.input_path)?;
    log::info!(
        "Clustering {} sequences from {}",
        records.len(),
        args.input_path.display()
    );
    let (names, seqs): (Vec<String>, Vec<Vec<u8>>) = records
        .into_iter()
        .map(|SeqRecord { name, seq }| (name, seq))
        .unzip();

    let engine: Box<dyn ConsensusEngine> = match args.engine {
        EngineChoice::Dwfa => Box::new(DwfaConsensus),
        EngineChoice::Vote => Box::new(MajorityVote::new(args.seed_choice)),
    };
    let aligner = SeqAligner::global(args.revcomp, args.cyclic);
    let mut session = SeqClustering::new(seqs, aligner).with_engine(engine);

    session
        .calc_dist_mat(args.num_threads)
        .map_err(|e| e.to_string())?;
    session
        .cluster_hierarchical(args.threshold, args.method, args.criterion)
        .map_err(|e| e.to_string())?;

    let params = ConsensusParams {
        th_merge: args.th_merge,
        th_noisy: args.th_noisy,
        th_sync: args.th_sync,
        seed_choice: args.seed_choice,
    };
    session
        .generate_consensus(&params)
        .map_err(|e| e.to_string())?;
    log::info!(
        "Generated {} consensus sequences",
        session.consensus().len()
    );

    create_writer(&args.output_prefix, "consensus.fasta", |path| {
        write_consensus_fasta(path, session.consensus())
    })?;
    create_writer(&args.output_prefix, "assignments.tsv", |path| {
        write_assignments(path, &names, session.clustering().assignments())
    })?;

    log::info!("Total execution time: {:.2?}", start_timer.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    #[test]
    fn test_cluster_command_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fa");
        std::fs::write(
            &input,
            ">a\nACGTACGTTAGC\n>b\nACGTACGTTAGC\n>c\nACGTACGTTAGC\n>d\nTTTTGGGGCCCC\n",
        )
        .unwrap();
        let prefix = dir.path().join("out");
        let cli = Cli::try_parse_from([
            "seqclust",
            "cluster",
            "-i",
            input.to_str().unwrap(),
            "-o",
            prefix.to_str().unwrap(),
            "--method",
            "average",
            "--engine",
            "vote",
        ])
        .unwrap();
        let Command::Cluster(args) = cli.command else {
            panic!("expected the cluster subcommand");
        };
        cluster(args).unwrap();

        let fasta = std::fs::read_to_string(dir.path().join("out.consensus.fasta")).unwrap();
        assert_eq!(fasta, ">cluster1 size=3 length=12\nACGTACGTTAGC\n");
        let tsv = std::fs::read_to_string(dir.path().join("out.assignments.tsv")).unwrap();
        assert_eq!(tsv, "a\t1\nb\t1\nc\t1\nd\t2\n");
    }
}
