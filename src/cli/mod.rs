use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::dialect::DialectSet;

#[derive(Parser)]
#[command(name = "sqlfirewall")]
#[command(about = "SQL-injection request filter and reverse proxy")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "sqlfirewall.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the filtering reverse proxy
    Serve,
    /// Run a payload corpus through the detector and report misses
    Check {
        /// Directory of *.txt payload files
        #[arg(long)]
        corpus: PathBuf,
        /// Enabled dialects (e.g. "mssql,nosql" or "all")
        #[arg(long, default_value = "all")]
        dialects: DialectSet,
        /// Write missed payloads to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Test a single input string
    Test {
        /// Raw input, as it would appear in a parameter value
        text: String,
        #[arg(long, default_value = "all")]
        dialects: DialectSet,
    },
    /// List the compiled pattern catalog in evaluation order
    Patterns {
        #[arg(long, default_value = "all")]
        dialects: DialectSet,
    },
    /// Write the default configuration file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn parses_check_command() {
        let cli = Cli::try_parse_from([
            "sqlfirewall",
            "check",
            "--corpus",
            "Datas",
            "--dialects",
            "mssql,mysql",
            "--output",
            "missed.txt",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("sqlfirewall.toml"));
        match cli.command {
            Commands::Check {
                corpus,
                dialects,
                output,
            } => {
                assert_eq!(corpus, PathBuf::from("Datas"));
                assert_eq!(dialects, Dialect::MsSql | Dialect::MySql);
                assert_eq!(output, Some(PathBuf::from("missed.txt")));
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn dialects_default_to_all() {
        let cli = Cli::try_parse_from(["sqlfirewall", "test", "' or 1=1--"]).unwrap();
        match cli.command {
            Commands::Test { text, dialects } => {
                assert_eq!(text, "' or 1=1--");
                assert_eq!(dialects, DialectSet::all());
            }
            _ => panic!("expected test"),
        }
    }

    #[test]
    fn rejects_unknown_dialect() {
        assert!(Cli::try_parse_from(["sqlfirewall", "patterns", "--dialects", "sybase"]).is_err());
    }

    #[test]
    fn global_config_flag() {
        let cli = Cli::try_parse_from(["sqlfirewall", "-c", "/etc/fw.toml", "serve"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/fw.toml"));
        assert!(matches!(cli.command, Commands::Serve));
    }
}
