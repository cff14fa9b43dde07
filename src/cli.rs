use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};

use crate::model::DEFAULT_TOP_K;

#[derive(Debug, Parser)]
#[command(
    name = "assessrank",
    about = "Recommend assessments for a hiring need"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the index from the catalog (no-op if already built)
    Build(BuildArgs),
    /// Recommend assessments for a query
    Recommend(RecommendArgs),
    /// Serve the HTTP API
    Serve(ServeArgs),
    /// Show index status
    Status(StatusArgs),
    /// Measure precision and recall against a labelled test set
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// Catalog JSON file (defaults to the configured or data-dir catalog)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct RecommendArgs {
    /// Free-text description of the hiring need
    pub query: String,

    /// Number of recommendations to ask for
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip the generation step and return retrieval results
    #[arg(long)]
    pub no_refine: bool,
}

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Listen address (overrides server.addr from config.toml)
    #[arg(long)]
    pub addr: Option<SocketAddr>,
}

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct EvaluateArgs {
    /// Test set: JSON array of {"query", "relevant_assessments"}
    pub file: PathBuf,

    /// Cutoff for precision@k and recall@k
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_recommend_defaults() {
        let cli = Cli::parse_from(["assessrank", "recommend", "java developer"]);
        match cli.command {
            Command::Recommend(args) => {
                assert_eq!(args.query, "java developer");
                assert_eq!(args.top_k, DEFAULT_TOP_K);
                assert!(!args.json);
                assert!(!args.no_refine);
            }
            _ => panic!("expected recommend command"),
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "assessrank",
            "serve",
            "--addr",
            "127.0.0.1:9000",
            "-vv",
            "--data-dir",
            "/tmp/ar",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/ar")));
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.addr, Some("127.0.0.1:9000".parse().unwrap()));
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["assessrank", "-q", "-v", "status"]).is_err());
    }

    #[test]
    fn evaluate_takes_file_and_k() {
        let cli = Cli::parse_from(["assessrank", "evaluate", "tests.json", "-k", "3"]);
        match cli.command {
            Command::Evaluate(args) => {
                assert_eq!(args.file, PathBuf::from("tests.json"));
                assert_eq!(args.top_k, 3);
            }
            _ => panic!("expected evaluate command"),
        }
    }
}
