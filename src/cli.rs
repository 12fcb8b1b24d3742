use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use emi_trace::pipeline::limits::LimitClass;
use emi_trace::pipeline::table::FactorKind;

#[derive(Parser, Debug)]
#[command(
    name = "emi-trace",
    version,
    about = "Correct, mask and analyse EMI spectrum-analyzer traces",
    arg_required_else_help = true,
    after_help = "Examples:\n  emi-trace correct open.csv --library cal --profile profile.csv -o open_corrected.csv\n  emi-trace peaks open.csv --library cal --profile profile.csv --mask ambient.csv --limit cispr-b\n  emi-trace se open.csv shielded.csv -o se.csv\n"
)]
pub struct Cli {
    /// JSON settings file; missing fields take their defaults
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Override the number of peaks per trace
    #[arg(long, global = true)]
    pub num_peaks: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

/// Correction and mask context shared by the trace commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Calibration library root (default: the settings workspace)
    #[arg(long)]
    pub library: Option<PathBuf>,

    /// Equipment profile selecting tables from the library
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Extra correction table as KIND=PATH (antenna, cable, preamp, attenuator)
    #[arg(long = "table", value_parser = parse_table_arg)]
    pub tables: Vec<(FactorKind, PathBuf)>,

    /// Measurement distance (m) for the distance correction factor
    #[arg(long, requires = "distance_to")]
    pub distance_from: Option<String>,

    /// Limit distance (m) for the distance correction factor
    #[arg(long, requires = "distance_from")]
    pub distance_to: Option<String>,

    /// Mask band table (center, span in MHz)
    #[arg(long)]
    pub mask: Option<PathBuf>,
}

impl ContextArgs {
    pub fn has_correction(&self) -> bool {
        self.profile.is_some() || !self.tables.is_empty() || self.distance_from.is_some()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply correction and mask to a trace and write every column
    Correct {
        trace: PathBuf,
        #[command(flatten)]
        context: ContextArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract peaks from one or more traces
    Peaks {
        #[arg(required = true)]
        traces: Vec<PathBuf>,
        #[command(flatten)]
        context: ContextArgs,
        /// Report the margin of each peak against a limit line
        #[arg(long)]
        limit: Option<LimitClass>,
        /// Write the peak table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Difference a − b of two traces
    Delta {
        a: PathBuf,
        b: PathBuf,
        #[command(flatten)]
        context: ContextArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Smoothed difference (shielding effectiveness) of two traces
    Se {
        a: PathBuf,
        b: PathBuf,
        #[command(flatten)]
        context: ContextArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Row-wise maximum of several traces
    MaxHold {
        #[arg(required = true)]
        traces: Vec<PathBuf>,
        #[command(flatten)]
        context: ContextArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Dump the unified correction curve
    Curve {
        #[command(flatten)]
        context: ContextArgs,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_table_arg(s: &str) -> Result<(FactorKind, PathBuf), String> {
    let (kind, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=PATH, got '{s}'"))?;
    Ok((kind.parse()?, PathBuf::from(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn table_arguments_parse_kind_and_path() {
        let cli = Cli::try_parse_from([
            "emi-trace",
            "curve",
            "--table",
            "antenna=cal/bicon.csv",
            "--table",
            "Attenuator=att.csv",
        ])
        .unwrap();
        let Command::Curve { context, .. } = cli.command else {
            panic!("expected curve");
        };
        assert_eq!(context.tables.len(), 2);
        assert_eq!(context.tables[1].0, FactorKind::Attenuator);
        assert!(parse_table_arg("bicon.csv").is_err());
    }

    #[test]
    fn limit_names_parse() {
        let cli = Cli::try_parse_from(["emi-trace", "peaks", "a.csv", "--limit", "fcc-b"]).unwrap();
        assert!(matches!(cli.command, Command::Peaks { limit: Some(LimitClass::FccB), .. }));
    }
}
