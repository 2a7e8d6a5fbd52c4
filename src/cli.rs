use crate::{
    align::AlignMode,
    cluster::{Criterion, LinkageMethod, SeedChoice},
    utils::Result,
};
use chrono::Datelike;
use clap::{ArgAction, ArgGroup, Parser, Subcommand, ValueEnum};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="seqclust",
          version=&**FULL_VERSION,
          about="Strand- and cycle-aware alignment and consensus clustering of DNA sequences",
          long_about = None,
          disable_help_subcommand = true,
          after_help = format!("Copyright (C) {}. This program comes with ABSOLUTELY NO WARRANTY.", chrono::Utc::now().year()),
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Cluster sequences and build one consensus per cluster")]
    Cluster(ClusterArgs),
    #[clap(about = "Align query sequences against target sequences")]
    Align(AlignArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineChoice {
    /// Dynamic WFA consensus, majority vote on failure
    Dwfa,
    /// Majority vote only
    Vote,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("cluster")))]
#[command(arg_required_else_help(true))]
pub struct ClusterArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "FASTA file with the sequences to cluster (optionally gzipped)")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub input_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(long = "revcomp")]
    #[clap(help = "Also consider the reverse complement of each sequence")]
    pub revcomp: bool,

    #[clap(long = "cyclic")]
    #[clap(help = "Treat sequences as circular")]
    pub cyclic: bool,

    #[clap(long = "method")]
    #[clap(value_name = "METHOD")]
    #[clap(help = "Linkage method (single, complete, average, weighted, ward, centroid, median)")]
    #[clap(default_value = "ward")]
    #[arg(value_parser = linkage_from_string)]
    pub method: LinkageMethod,

    #[clap(long = "criterion")]
    #[clap(value_name = "CRITERION")]
    #[clap(help = "Flat cut criterion (distance or maxclust)")]
    #[clap(default_value = "distance")]
    #[arg(value_parser = criterion_from_string)]
    pub criterion: Criterion,

    #[clap(long = "threshold")]
    #[clap(value_name = "THRESHOLD")]
    #[clap(help = "Distance threshold, or maximum number of clusters with maxclust")]
    #[clap(default_value = "0.1")]
    pub threshold: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "engine")]
    #[clap(value_name = "ENGINE")]
    #[clap(help = "Consensus engine")]
    #[clap(default_value = "dwfa")]
    #[clap(value_enum)]
    pub engine: EngineChoice,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "seed-choice")]
    #[clap(value_name = "SEED")]
    #[clap(help = "Seed of the majority vote (as-given, median or longest)")]
    #[clap(default_value = "as-given")]
    #[arg(value_parser = seed_from_string)]
    pub seed_choice: SeedChoice,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "th-merge")]
    #[clap(value_name = "DIFF")]
    #[clap(help = "Merge clusters whose consensus sequences differ by less than this")]
    #[clap(default_value = "0.05")]
    #[arg(value_parser = ensure_unit_float)]
    pub th_merge: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "th-noisy")]
    #[clap(value_name = "FRAC")]
    #[clap(help = "Drop clusters smaller than this fraction of all sequences")]
    #[clap(default_value = "0.01")]
    #[arg(value_parser = ensure_unit_float)]
    pub th_noisy: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "th-sync")]
    #[clap(value_name = "DIFF")]
    #[clap(help = "Synchronize the phase of consensus sequences differing by less than this")]
    #[clap(default_value = "0.3")]
    #[arg(value_parser = ensure_unit_float)]
    pub th_sync: f64,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("align")))]
#[command(arg_required_else_help(true))]
pub struct AlignArgs {
    #[clap(required = true)]
    #[clap(short = 'q')]
    #[clap(long = "query")]
    #[clap(help = "FASTA file with query sequences")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub query_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "target")]
    #[clap(help = "FASTA file with target sequences")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub target_path: PathBuf,

    #[clap(short = 'm')]
    #[clap(long = "mode")]
    #[clap(value_name = "MODE")]
    #[clap(help = "Alignment mode (global, glocal or prefix)")]
    #[clap(default_value = "global")]
    pub mode: String,

    #[clap(long = "revcomp")]
    #[clap(help = "Also consider the reverse complement of each target")]
    pub revcomp: bool,

    #[clap(long = "cyclic")]
    #[clap(help = "Treat targets as circular (global mode only)")]
    pub cyclic: bool,

    #[clap(long = "max-true-diff")]
    #[clap(value_name = "DIFF")]
    #[clap(help = "Skip the second strand when the first one is at most this dissimilar")]
    #[clap(default_value = "0.0")]
    #[arg(value_parser = ensure_unit_float)]
    pub max_true_diff: f64,

    #[clap(long = "show")]
    #[clap(help = "Print the alignments")]
    pub show: bool,

    #[clap(long = "twist")]
    #[clap(help = "Collapse matching columns when printing alignments")]
    pub twist: bool,

    #[clap(long = "width")]
    #[clap(value_name = "WIDTH")]
    #[clap(help = "Columns per printed alignment block")]
    #[clap(default_value = "100")]
    pub width: usize,
}

impl AlignArgs {
    pub fn align_mode(&self) -> Result<AlignMode> {
        AlignMode::from_name(&self.mode, self.cyclic).map_err(|e| e.to_string())
    }
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn linkage_from_string(s: &str) -> Result<LinkageMethod> {
    s.parse().map_err(|e: crate::cluster::ClusterError| e.to_string())
}

fn criterion_from_string(s: &str) -> Result<Criterion> {
    s.parse().map_err(|e: crate::cluster::ClusterError| e.to_string())
}

fn seed_from_string(s: &str) -> Result<SeedChoice> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cluster_args() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fa");
        std::fs::write(&input, ">s\nACGT\n").unwrap();
        let prefix = dir.path().join("out");
        let cli = Cli::try_parse_from([
            "seqclust",
            "-v",
            "cluster",
            "-i",
            input.to_str().unwrap(),
            "-o",
            prefix.to_str().unwrap(),
            "--revcomp",
            "--method",
            "average",
            "--engine",
            "vote",
            "--seed-choice",
            "median",
        ])
        .unwrap();
        assert_eq!(cli.verbosity, 1);
        match cli.command {
            Command::Cluster(args) => {
                assert!(args.revcomp);
                assert!(!args.cyclic);
                assert_eq!(args.method, LinkageMethod::Average);
                assert_eq!(args.criterion, Criterion::Distance);
                assert_eq!(args.engine, EngineChoice::Vote);
                assert_eq!(args.seed_choice, SeedChoice::Median);
                assert_eq!(args.num_threads, 1);
                assert_eq!(args.th_merge, 0.05);
            }
            Command::Align(_) => panic!("expected the cluster subcommand"),
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(ensure_unit_float("1.5").is_err());
        assert!(ensure_unit_float("0.3").is_ok());
        assert!(threads_in_range("0").is_err());
        assert!(linkage_from_string("nearest").is_err());
        assert!(check_file_exists("/no/such/file.fa").is_err());
        assert!(check_prefix_path("/no/such/dir/out").is_err());
    }
}
