use std::{env, path::Path, time::Duration};

use log::LevelFilter;
use tsp_mip_derive::{CliOptions, CliValue, KvDisplay};

use crate::{Error, Result, model::FormulationKind};

pub(crate) const DEFAULT_TIME_LIMIT_SECONDS: f64 = 600.0;
pub(crate) const DEFAULT_HEADER_LINES: usize = 7;

/// Runtime options for one solve run.
#[derive(Clone, Debug, CliOptions, KvDisplay)]
pub struct SolverOptions {
    /// TSP encoding handed to the engine.
    #[cli(long = "formulation", parse_with = "FormulationKind::parse")]
    pub formulation: FormulationKind,
    /// Also cut sub-tours at fractional relaxation nodes (flow
    /// formulation only).
    pub fractional_cuts: bool,
    /// Register the layer-flow strengthening cuts (time-indexed
    /// formulation only).
    pub layered_cuts: bool,
    /// Wall-clock budget in seconds. 0 disables the limit.
    #[cli(long = "time-limit")]
    pub time_limit: f64,
    /// Worker threads the engine may use.
    #[cli(long = "threads")]
    pub threads: usize,
    /// Lines skipped before the first cost-matrix row.
    #[cli(long = "header-lines")]
    pub header_lines: usize,
    /// Print the reconstructed tour arc by arc after the result line.
    pub trace_tour: bool,
    /// Structured logging level.
    #[cli(long = "log-level", parse_with = "LogLevel::parse")]
    pub log_level: LogLevel,
    /// Logging output format.
    #[cli(long = "log-format", parse_with = "LogFormat::parse")]
    pub log_format: LogFormat,
    /// Include timestamps in log lines.
    pub log_timestamp: bool,
    /// Optional output file path for logs. Empty means stderr.
    #[cli(long = "log-output")]
    pub log_output: String,
    /// Optional input file path for the cost matrix. Empty means stdin.
    #[cli(long = "input")]
    pub input: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, CliValue)]
#[cli_value(option = "log-level")]
pub enum LogLevel {
    Error,
    #[cli(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
            Self::Off => LevelFilter::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, CliValue)]
#[cli_value(option = "log-format")]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            formulation: FormulationKind::SingleCommodityFlow,
            fractional_cuts: false,
            layered_cuts: false,
            time_limit: DEFAULT_TIME_LIMIT_SECONDS,
            threads: 1,
            header_lines: DEFAULT_HEADER_LINES,
            trace_tour: false,
            log_level: LogLevel::Warn,
            log_format: LogFormat::Compact,
            log_timestamp: true,
            log_output: String::new(),
            input: String::new(),
        }
    }
}

impl SolverOptions {
    pub fn from_args() -> Result<Self> {
        Self::parse_from_iter(env::args().skip(1))
    }

    fn parse_from_iter<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut args = args
            .into_iter()
            .map(|arg| arg.as_ref().to_owned())
            .peekable();

        while let Some(arg) = args.next() {
            if arg == "--help" || arg == "-h" {
                return Err(Error::invalid_input(Self::usage()));
            }

            let Some(raw_name) = arg.strip_prefix("--") else {
                return Err(Error::invalid_input(format!(
                    "Unexpected argument: {arg}\n\n{}",
                    Self::usage()
                )));
            };

            if raw_name.is_empty() {
                return Err(Error::invalid_input(format!(
                    "Invalid option name: {arg}\n\n{}",
                    Self::usage()
                )));
            }

            let (name, value) = Self::split_arg(raw_name, &mut args);

            if options.apply_cli_option(&name, value.clone())? {
                continue;
            }

            match name.as_str() {
                "fractional-cuts" => {
                    options.fractional_cuts = match value {
                        Some(v) => parse_bool(&name, &v)?,
                        None => true,
                    };
                }
                "no-fractional-cuts" => {
                    reject_flag_value(&name, &value)?;
                    options.fractional_cuts = false;
                }
                "layered-cuts" => {
                    options.layered_cuts = match value {
                        Some(v) => parse_bool(&name, &v)?,
                        None => true,
                    };
                }
                "no-layered-cuts" => {
                    reject_flag_value(&name, &value)?;
                    options.layered_cuts = false;
                }
                "trace-tour" => {
                    options.trace_tour = match value {
                        Some(v) => parse_bool(&name, &v)?,
                        None => true,
                    };
                }
                "no-trace-tour" => {
                    reject_flag_value(&name, &value)?;
                    options.trace_tour = false;
                }
                "log-timestamp" => {
                    options.log_timestamp = match value {
                        Some(v) => parse_bool(&name, &v)?,
                        None => true,
                    };
                }
                "no-log-timestamp" => {
                    reject_flag_value(&name, &value)?;
                    options.log_timestamp = false;
                }
                _ => {
                    return Err(Error::invalid_input(format!(
                        "Unknown option: --{name}\n\n{}",
                        Self::usage()
                    )));
                }
            }
        }

        Ok(options)
    }

    pub fn usage() -> &'static str {
        concat!(
            "Usage:\n",
            "  tsp-mip [options] [--input matrix.txt]\n",
            "  tsp-mip [options] < matrix.txt\n\n",
            "Options:\n",
            "  --formulation <sequential|single-commodity-flow|time-indexed-flow>\n",
            "  --fractional-cuts[=<bool>]\n",
            "  --no-fractional-cuts\n",
            "  --layered-cuts[=<bool>]\n",
            "  --no-layered-cuts\n",
            "  --time-limit <seconds>\n",
            "  --threads <usize>\n",
            "  --header-lines <usize>\n",
            "  --trace-tour[=<bool>]\n",
            "  --no-trace-tour\n",
            "  --log-level <error|warn|info|debug|trace|off>\n",
            "  --log-format <compact|pretty>\n",
            "  --log-timestamp[=<bool>]\n",
            "  --no-log-timestamp\n",
            "  --log-output <path>\n",
            "  --input <path>\n",
            "  --help\n",
            "\n",
            "Examples:\n",
            "  tsp-mip --input ftv33.txt\n",
            "  tsp-mip --formulation=mtz --trace-tour --input ftv33.txt\n",
            "  tsp-mip --formulation=layered --layered-cuts --time-limit 120 < matrix.txt\n",
            "  tsp-mip --formulation=flow --fractional-cuts --log-level=info < matrix.txt\n",
            "  tsp-mip --threads=4 --time-limit=60 --input ftv33.txt\n",
        )
    }

    /// `--time-limit 0` means no limit.
    pub fn time_limit_duration(&self) -> Option<Duration> {
        if self.time_limit <= 0.0 {
            None
        } else {
            Some(Duration::from_secs_f64(self.time_limit))
        }
    }

    pub fn log_output_path(&self) -> Option<&Path> {
        let log_output = self.log_output.trim();
        if log_output.is_empty() || log_output == "-" {
            None
        } else {
            Some(Path::new(log_output))
        }
    }

    pub fn input_path(&self) -> Option<&Path> {
        let input = self.input.trim();
        if input.is_empty() || input == "-" {
            None
        } else {
            Some(Path::new(input))
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "TRUE" | "True" | "yes" | "YES" | "on" | "ON" => Ok(true),
        "0" | "false" | "FALSE" | "False" | "no" | "NO" | "off" | "OFF" => Ok(false),
        _ => Err(Error::invalid_input(format!(
            "Invalid boolean for --{name}: {value} (expected true/false)"
        ))),
    }
}

fn reject_flag_value(name: &str, value: &Option<String>) -> Result<()> {
    if value.is_some() {
        return Err(Error::invalid_input(format!(
            "Flag --{name} does not take a value"
        )));
    }
    Ok(())
}
