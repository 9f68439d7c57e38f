//! Plotting command lines.
//!
//! A plot job is recognized by the shape of its command line and parsed into
//! a `PlotCommand` with every field validated up front. Anything that does
//! not parse, or only asks for help text, is not a job.

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::phase::LogDialect;

/// Plotting engine that owns a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotEngine {
    /// `chia plots create ...`
    Chia,
    /// The alternate fast plotter (madMAx `chia_plot`).
    MadMax,
}

impl PlotEngine {
    /// Grammar of the logs this engine writes.
    pub fn log_dialect(&self) -> LogDialect {
        match self {
            Self::Chia => LogDialect::ChiaPlotter,
            Self::MadMax => LogDialect::MadMax,
        }
    }
}

/// Reasons a command line is not a usable plot job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlotCommandError {
    #[error("empty command line")]
    Empty,

    #[error("not a plotting command line")]
    NotAPlotCommand,

    #[error("command line only requests help")]
    HelpRequested,

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("option {0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {option}: {value}")]
    InvalidValue { option: String, value: String },

    #[error("malformed command line: {0}")]
    Malformed(String),
}

impl From<clap::Error> for PlotCommandError {
    fn from(err: clap::Error) -> Self {
        let context = |kind| match err.get(kind) {
            Some(ContextValue::String(s)) => s.clone(),
            _ => String::new(),
        };
        // Rendered as `--size <SIZE>`; keep the option name.
        let option = || {
            context(ContextKind::InvalidArg)
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()
        };

        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                Self::HelpRequested
            }
            ErrorKind::UnknownArgument => {
                let arg = context(ContextKind::InvalidArg);
                if arg.starts_with('-') {
                    Self::UnknownOption(arg)
                } else {
                    Self::UnexpectedArgument(arg)
                }
            }
            ErrorKind::InvalidValue | ErrorKind::ValueValidation => {
                let value = context(ContextKind::InvalidValue);
                if value.is_empty() {
                    Self::MissingValue(option())
                } else {
                    Self::InvalidValue {
                        option: option(),
                        value,
                    }
                }
            }
            _ => Self::Malformed(err.kind().to_string()),
        }
    }
}

/// Construction parameters of a plot job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotCommand {
    pub engine: PlotEngine,
    /// Plot size class (`k`).
    pub size: u8,
    pub threads: u32,
    pub buckets: u32,
    /// Sort buffer in MiB; the fast engine has none.
    pub buffer_mib: Option<u32>,
    /// Number of plots the process produces in sequence.
    pub count: u32,
    pub tmp_dir: PathBuf,
    pub tmp2_dir: Option<PathBuf>,
    pub final_dir: PathBuf,
}

/// Options of `chia plots create`. Every option the engine takes is
/// accepted; only the ones that shape the job are read.
#[derive(Debug, Parser)]
#[command(name = "chia plots create", no_binary_name = true, args_override_self = true)]
#[allow(dead_code)]
struct ChiaCreateArgs {
    #[arg(short = 'k', long = "size", default_value_t = 32)]
    size: u8,

    #[arg(long = "override-k", alias = "override_k")]
    override_k: bool,

    #[arg(short = 'n', long = "num", default_value_t = 1)]
    num: u32,

    #[arg(short = 'b', long = "buffer", default_value_t = 3389)]
    buffer: u32,

    #[arg(short = 'r', long = "num_threads", alias = "num-threads", default_value_t = 2)]
    num_threads: u32,

    #[arg(short = 'u', long = "buckets", default_value_t = 128)]
    buckets: u32,

    #[arg(short = 'a', long = "alt_fingerprint", alias = "alt-fingerprint")]
    alt_fingerprint: Option<String>,

    #[arg(short = 'c', long = "pool_contract_address", alias = "pool-contract-address")]
    pool_contract_address: Option<String>,

    #[arg(short = 'f', long = "farmer_public_key", alias = "farmer-public-key")]
    farmer_public_key: Option<String>,

    #[arg(short = 'p', long = "pool_public_key", alias = "pool-public-key")]
    pool_public_key: Option<String>,

    #[arg(short = 't', long = "tmp_dir", alias = "tmp-dir", default_value = ".")]
    tmp_dir: PathBuf,

    #[arg(short = '2', long = "tmp2_dir", alias = "tmp2-dir")]
    tmp2_dir: Option<PathBuf>,

    #[arg(short = 'd', long = "final_dir", alias = "final-dir", default_value = ".")]
    final_dir: PathBuf,

    #[arg(short = 'i', long = "plotid")]
    plot_id: Option<String>,

    #[arg(short = 'm', long = "memo")]
    memo: Option<String>,

    #[arg(short = 'e', long = "nobitfield")]
    nobitfield: bool,

    #[arg(short = 'x', long = "exclude_final_dir", alias = "exclude-final-dir")]
    exclude_final_dir: bool,
}

/// Options of the madMAx `chia_plot` executable.
#[derive(Debug, Parser)]
#[command(name = "chia_plot", no_binary_name = true, args_override_self = true)]
#[allow(dead_code)]
struct MadMaxArgs {
    #[arg(short = 'k', long = "size", default_value_t = 32)]
    size: u8,

    #[arg(short = 'n', long = "count", default_value_t = 1)]
    count: u32,

    #[arg(short = 'r', long = "threads", default_value_t = 4)]
    threads: u32,

    #[arg(short = 'u', long = "buckets", default_value_t = 256)]
    buckets: u32,

    #[arg(short = 'v', long = "buckets3")]
    buckets3: Option<u32>,

    /// Defaults to the working directory, as the engine does.
    #[arg(short = 't', long = "tmpdir", default_value = ".")]
    tmpdir: PathBuf,

    #[arg(short = '2', long = "tmpdir2")]
    tmpdir2: Option<PathBuf>,

    /// Defaults to the tmp dir.
    #[arg(short = 'd', long = "finaldir")]
    finaldir: Option<PathBuf>,

    #[arg(short = 'w', long = "waitforcopy")]
    waitforcopy: bool,

    #[arg(short = 'G', long = "tmptoggle")]
    tmptoggle: bool,

    #[arg(short = 'K', long = "rmulti2")]
    rmulti2: Option<u32>,

    #[arg(short = 'x', long = "port")]
    port: Option<u16>,

    #[arg(short = 'c', long = "contract")]
    contract: Option<String>,

    #[arg(short = 'f', long = "farmerkey")]
    farmerkey: Option<String>,

    #[arg(short = 'p', long = "poolkey")]
    poolkey: Option<String>,
}

impl From<ChiaCreateArgs> for PlotCommand {
    fn from(args: ChiaCreateArgs) -> Self {
        Self {
            engine: PlotEngine::Chia,
            size: args.size,
            threads: args.num_threads,
            buckets: args.buckets,
            buffer_mib: Some(args.buffer),
            count: args.num,
            tmp_dir: args.tmp_dir,
            tmp2_dir: args.tmp2_dir,
            final_dir: args.final_dir,
        }
    }
}

impl From<MadMaxArgs> for PlotCommand {
    fn from(args: MadMaxArgs) -> Self {
        Self {
            engine: PlotEngine::MadMax,
            size: args.size,
            threads: args.threads,
            buckets: args.buckets,
            buffer_mib: None,
            count: args.count,
            final_dir: args.finaldir.unwrap_or_else(|| args.tmpdir.clone()),
            tmp2_dir: args.tmpdir2,
            tmp_dir: args.tmpdir,
        }
    }
}

/// Drops a leading interpreter (`python3 /usr/bin/chia ...`).
fn strip_interpreter(cmdline: &[String]) -> &[String] {
    match cmdline.first() {
        Some(first) if first.to_lowercase().contains("python") => &cmdline[1..],
        _ => cmdline,
    }
}

fn is_chia_create(cmdline: &[String]) -> bool {
    cmdline.len() >= 3
        && cmdline[0].ends_with("chia")
        && cmdline[1] == "plots"
        && cmdline[2] == "create"
}

fn is_alternate_engine(cmdline: &[String], alternate_engine_name: &str) -> bool {
    !alternate_engine_name.is_empty()
        && cmdline
            .first()
            .is_some_and(|exe| exe.ends_with(alternate_engine_name))
}

/// Whether a command line belongs to a plotting process of either engine.
pub fn is_plotting_cmdline(cmdline: &[String], alternate_engine_name: &str) -> bool {
    let cmdline = strip_interpreter(cmdline);
    is_chia_create(cmdline) || is_alternate_engine(cmdline, alternate_engine_name)
}

impl PlotCommand {
    /// Parses a full process command line with the owning engine's own
    /// option grammar.
    pub fn parse(
        cmdline: &[String],
        alternate_engine_name: &str,
    ) -> Result<Self, PlotCommandError> {
        if cmdline.is_empty() {
            return Err(PlotCommandError::Empty);
        }
        let cmdline = strip_interpreter(cmdline);

        if is_chia_create(cmdline) {
            Ok(ChiaCreateArgs::try_parse_from(&cmdline[3..])?.into())
        } else if is_alternate_engine(cmdline, alternate_engine_name) {
            Ok(MadMaxArgs::try_parse_from(&cmdline[1..])?.into())
        } else {
            Err(PlotCommandError::NotAPlotCommand)
        }
    }

    /// Grammar of this job's log.
    pub fn log_dialect(&self) -> LogDialect {
        self.engine.log_dialect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_is_plotting_cmdline() {
        assert!(is_plotting_cmdline(
            &argv("/usr/bin/chia plots create -k 32 -t /t -d /d"),
            "chia_plot"
        ));
        assert!(is_plotting_cmdline(
            &argv("python3 /venv/bin/chia plots create -t /t"),
            "chia_plot"
        ));
        assert!(is_plotting_cmdline(
            &argv("/opt/madmax/chia_plot -n 1 -t /t/"),
            "chia_plot"
        ));
        assert!(!is_plotting_cmdline(&argv("/usr/bin/chia plots check"), "chia_plot"));
        assert!(!is_plotting_cmdline(&argv("rsync -P a b"), "chia_plot"));
        assert!(!is_plotting_cmdline(&argv("/opt/madmax/chia_plot -t /t"), ""));
    }

    #[test]
    fn test_parse_chia_full() {
        let cmd = PlotCommand::parse(
            &argv("/venv/bin/chia plots create -k 32 -r 4 -u 128 -b 6000 -n 2 -t /farm/yards/901 -2 /farm/t2 -d /farm/wagons/801 -x"),
            "chia_plot",
        )
        .unwrap();
        assert_eq!(cmd.engine, PlotEngine::Chia);
        assert_eq!(cmd.size, 32);
        assert_eq!(cmd.threads, 4);
        assert_eq!(cmd.buckets, 128);
        assert_eq!(cmd.buffer_mib, Some(6000));
        assert_eq!(cmd.count, 2);
        assert_eq!(cmd.tmp_dir, PathBuf::from("/farm/yards/901"));
        assert_eq!(cmd.tmp2_dir, Some(PathBuf::from("/farm/t2")));
        assert_eq!(cmd.final_dir, PathBuf::from("/farm/wagons/801"));
        assert_eq!(cmd.log_dialect(), LogDialect::ChiaPlotter);
    }

    #[test]
    fn test_parse_chia_defaults_and_long_forms() {
        let cmd = PlotCommand::parse(
            &argv("chia plots create --tmp_dir=/t --final-dir /d --override-k"),
            "chia_plot",
        )
        .unwrap();
        assert_eq!(cmd.size, 32);
        assert_eq!(cmd.threads, 2);
        assert_eq!(cmd.buckets, 128);
        assert_eq!(cmd.buffer_mib, Some(3389));
        assert_eq!(cmd.count, 1);
        assert_eq!(cmd.final_dir, PathBuf::from("/d"));
        assert!(cmd.tmp2_dir.is_none());
    }

    #[test]
    fn test_parse_madmax() {
        let cmd = PlotCommand::parse(
            &argv("/opt/madmax/chia_plot -n 1 -r 16 -u 256 -t /mnt/nvme/ -2 /mnt/ram/ -d /mnt/dst/ -f abc -p def"),
            "chia_plot",
        )
        .unwrap();
        assert_eq!(cmd.engine, PlotEngine::MadMax);
        assert_eq!(cmd.threads, 16);
        assert_eq!(cmd.buffer_mib, None);
        assert_eq!(cmd.tmp2_dir, Some(PathBuf::from("/mnt/ram/")));
        assert_eq!(cmd.log_dialect(), LogDialect::MadMax);
    }

    #[test]
    fn test_parse_madmax_final_defaults_to_tmp() {
        let cmd = PlotCommand::parse(&argv("chia_plot -t /mnt/nvme/"), "chia_plot").unwrap();
        assert_eq!(cmd.final_dir, PathBuf::from("/mnt/nvme/"));
    }

    #[test]
    fn test_help_is_rejected() {
        let err = PlotCommand::parse(&argv("chia plots create -t /t --help"), "chia_plot")
            .unwrap_err();
        assert_eq!(err, PlotCommandError::HelpRequested);

        let err = PlotCommand::parse(&argv("chia_plot -h"), "chia_plot").unwrap_err();
        assert_eq!(err, PlotCommandError::HelpRequested);
    }

    #[test]
    fn test_tmp_dir_defaults_to_working_dir() {
        let cmd = PlotCommand::parse(&argv("chia plots create -k 32 -d /mnt/dst"), "chia_plot")
            .unwrap();
        assert_eq!(cmd.tmp_dir, PathBuf::from("."));
        assert_eq!(cmd.final_dir, PathBuf::from("/mnt/dst"));

        let cmd = PlotCommand::parse(&argv("/opt/madmax/chia_plot -n 1 -d /mnt/dst/"), "chia_plot")
            .unwrap();
        assert_eq!(cmd.tmp_dir, PathBuf::from("."));
        assert_eq!(cmd.final_dir, PathBuf::from("/mnt/dst/"));
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        assert!(matches!(
            PlotCommand::parse(&argv("chia plots create -t /t -k big"), "chia_plot"),
            Err(PlotCommandError::InvalidValue { ref value, .. }) if value == "big"
        ));
        assert!(matches!(
            PlotCommand::parse(&argv("chia plots create -t /t --frobnicate"), "chia_plot"),
            Err(PlotCommandError::UnknownOption(_))
        ));
        assert!(matches!(
            PlotCommand::parse(&argv("chia plots create -t /t stray"), "chia_plot"),
            Err(PlotCommandError::UnexpectedArgument(_))
        ));
        assert!(matches!(
            PlotCommand::parse(&argv("chia plots create -t"), "chia_plot"),
            Err(PlotCommandError::MissingValue(_))
        ));
        assert_eq!(
            PlotCommand::parse(&[], "chia_plot").unwrap_err(),
            PlotCommandError::Empty
        );
        assert_eq!(
            PlotCommand::parse(&argv("/bin/bash -c true"), "chia_plot").unwrap_err(),
            PlotCommandError::NotAPlotCommand
        );
    }

    #[test]
    fn test_repeated_option_last_wins() {
        let cmd = PlotCommand::parse(&argv("chia plots create -t /a -t /b"), "chia_plot").unwrap();
        assert_eq!(cmd.tmp_dir, PathBuf::from("/b"));
    }

    #[test]
    fn test_short_option_with_attached_value() {
        let cmd = PlotCommand::parse(&argv("chia plots create -k33 -t/t"), "chia_plot").unwrap();
        assert_eq!(cmd.size, 33);
        assert_eq!(cmd.tmp_dir, PathBuf::from("/t"));
    }
}
