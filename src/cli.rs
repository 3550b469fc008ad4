use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "spectral-audit",
    version,
    about = "Batch spectral analysis of an audio library into SQLite"
)]
pub struct Cli {
    /// Config file (defaults to ./spectral-audit.toml or the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze every audio file under a directory and store the statistics
    Analyze(AnalyzeArgs),

    /// Print the stored record for one track as JSON
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Root of the audio library
    pub input_dir: PathBuf,

    /// SQLite database file
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Worker threads (default: available parallelism)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Capacity of the path queue between the directory walk and the workers
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Capacity of the result queue between the workers and the database writer
    #[arg(long)]
    pub result_queue_capacity: Option<usize>,

    /// STFT window size in samples
    #[arg(long)]
    pub window_size: Option<usize>,

    /// STFT hop size in samples
    #[arg(long)]
    pub hop_size: Option<usize>,

    /// Tracks per database transaction
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// File extensions to analyze (comma-separated, case-insensitive)
    #[arg(long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Path of the track as it was analyzed
    pub path: PathBuf,

    /// SQLite database file
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_flags_parse() {
        let cli = Cli::parse_from([
            "spectral-audit",
            "analyze",
            "/music",
            "--workers",
            "4",
            "--extensions",
            "mp3,flac",
            "--json",
            "-c",
            "audit.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("audit.toml")));
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.input_dir, PathBuf::from("/music"));
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.extensions, vec!["mp3", "flac"]);
        assert!(args.json);
        assert!(args.db.is_none());
    }

    #[test]
    fn show_requires_path() {
        assert!(Cli::try_parse_from(["spectral-audit", "show"]).is_err());
        let cli = Cli::try_parse_from(["spectral-audit", "show", "a.mp3", "--db", "x.db"]).unwrap();
        assert!(matches!(cli.command, Command::Show(ShowArgs { .. })));
    }
}
