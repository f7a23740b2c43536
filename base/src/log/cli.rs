// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words logsys

//! Command logic behind the log-configuration CLI surface.
//!
//! The interactive shell itself lives outside this crate; these functions are
//! the testable cores of its commands. Each returns the text to print on
//! success, or a [`CommandError`] - render failures with [`error_line()`] to
//! get the conventional `Error: <reason>` form (exit code mapping is the
//! caller's: 0 on success, non-zero otherwise).
//!
//! | Command                 | Function                                      |
//! | :---------------------- | :-------------------------------------------- |
//! | `logsys` (listing)      | [`logsys_render`]                             |
//! | `logsys` (apply line)   | [`logsys_apply`]                              |
//! | `storeLogConf <file>`   | [`store_log_conf`]                            |
//! | `loadLogConf <file>`    | [`load_log_conf`]                             |
//! | `storeLogConfTxt <file>`| [`store_log_conf_txt`]                        |
//! | `loadLogConfTxt <file>` | [`load_log_conf_txt`]                         |
//! | `LogHistory [n] [clear]`| [`log_history`]                               |

use super::{ConfigError, HistoryBackend, LogFacilityCtrl, LogLevel, apply_log_src_configs,
            config_binary, config_text};
use std::{fs::File,
          io::{BufReader, BufWriter},
          path::Path};

/// Failures of the CLI command functions.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CommandError {
    /// The command line does not match the expected form.
    #[error("invalid arguments, usage: {usage}")]
    #[diagnostic(code(r3bl_base::log::cli_usage))]
    Usage {
        /// The expected form.
        usage: &'static str,
    },

    /// The level code is not one of `D I W E F N`.
    #[error("unknown log level '{letter}', expected one of D I W E F N")]
    #[diagnostic(code(r3bl_base::log::cli_unknown_level))]
    UnknownLevel {
        /// The offending code.
        letter: String,
    },

    /// A logger index is not in the listed range.
    #[error("log source index '{index}' is out of range")]
    #[diagnostic(code(r3bl_base::log::cli_bad_index))]
    BadIndex {
        /// The offending index token.
        index: String,
    },

    /// Reading/writing or parsing a configuration file failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Renders a [`CommandError`] the way the CLI prints it.
#[must_use]
pub fn error_line(error: &CommandError) -> String { format!("Error: {error}") }

const LOGSYS_USAGE: &str = "[set] <LVL> <index...|all> | lower <LVL> <index...|all> | raise <LVL> <index...|all>";

/// The `logsys` listing: one line per registered source with its index and
/// current level.
#[must_use]
pub fn logsys_render(ctrl: &dyn LogFacilityCtrl) -> String {
    let sources = ctrl.enumerate_log_sources();
    let mut out = String::from("Idx Level    Source");
    for (index, (name, level)) in sources.iter().enumerate() {
        out.push_str(&format!("\n{index:>3} {:<8} {name}", level.to_string()));
    }
    out
}

/// Applies one `logsys` command line: `[set]|lower|raise <LVL> <index...|all>`.
///
/// # Errors
///
/// [`CommandError::Usage`], [`CommandError::UnknownLevel`] or
/// [`CommandError::BadIndex`]. Indices are validated against the current
/// listing before anything is applied, so a bad line changes nothing.
pub fn logsys_apply(ctrl: &dyn LogFacilityCtrl, line: &str) -> Result<String, CommandError> {
    let mut tokens = line.split_whitespace().peekable();

    let verb = match tokens.peek() {
        Some(&"set") | Some(&"lower") | Some(&"raise") => {
            tokens.next().expect("peeked token exists")
        }
        _ => "set",
    };

    let level_token = tokens.next().ok_or(CommandError::Usage { usage: LOGSYS_USAGE })?;
    let level = parse_level_letter(level_token)?;

    let sources = ctrl.enumerate_log_sources();
    let targets: Vec<&str> = {
        let selectors: Vec<&str> = tokens.collect();
        if selectors.is_empty() {
            return Err(CommandError::Usage { usage: LOGSYS_USAGE });
        }
        if selectors == ["all"] {
            sources.iter().map(|(name, _)| name.as_str()).collect()
        } else {
            let mut names = Vec::new();
            for selector in selectors {
                let index: usize = selector.parse().map_err(|_| CommandError::BadIndex {
                    index: selector.to_owned(),
                })?;
                let (name, _) =
                    sources.get(index).ok_or_else(|| CommandError::BadIndex {
                        index: selector.to_owned(),
                    })?;
                names.push(name.as_str());
            }
            names
        }
    };

    for name in &targets {
        match verb {
            "set" => ctrl.set_log_level(name, level),
            "lower" => ctrl.lower_log_level(name, level),
            "raise" => ctrl.raise_log_level(name, level),
            _ => unreachable!(),
        };
    }

    Ok(format!("{} log source(s) updated", targets.len()))
}

fn parse_level_letter(token: &str) -> Result<LogLevel, CommandError> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) => {
            LogLevel::from_letter(letter).ok_or_else(|| CommandError::UnknownLevel {
                letter: token.to_owned(),
            })
        }
        _ => Err(CommandError::UnknownLevel {
            letter: token.to_owned(),
        }),
    }
}

/// `storeLogConf <file>`: snapshots all source levels into the binary form.
///
/// # Errors
///
/// [`CommandError::Config`] on I/O failure.
pub fn store_log_conf(ctrl: &dyn LogFacilityCtrl, path: &Path) -> Result<String, CommandError> {
    let entries = ctrl.enumerate_log_sources();
    let mut writer = BufWriter::new(File::create(path).map_err(ConfigError::Io)?);
    config_binary::write_log_config(&mut writer, &entries)?;
    Ok(format!("{} entry(s) stored", entries.len()))
}

/// `loadLogConf <file>`: restores source levels from the binary form. Unknown
/// source names are reported in the result text; missing names keep their
/// level.
///
/// # Errors
///
/// [`CommandError::Config`] on I/O or format failure.
pub fn load_log_conf(ctrl: &dyn LogFacilityCtrl, path: &Path) -> Result<String, CommandError> {
    let mut reader = BufReader::new(File::open(path).map_err(ConfigError::Io)?);
    let entries = config_binary::read_log_config(&mut reader)?;
    Ok(render_load_result(&entries, &apply_log_src_configs(ctrl, &entries)))
}

/// `storeLogConfTxt <file>`: snapshots all source levels into the text form.
///
/// # Errors
///
/// [`CommandError::Config`] on I/O failure.
pub fn store_log_conf_txt(
    ctrl: &dyn LogFacilityCtrl,
    path: &Path,
) -> Result<String, CommandError> {
    let entries = ctrl.enumerate_log_sources();
    let mut writer = BufWriter::new(File::create(path).map_err(ConfigError::Io)?);
    config_text::write_log_config_text(&mut writer, &entries)?;
    Ok(format!("{} entry(s) stored", entries.len()))
}

/// `loadLogConfTxt <file>`: restores source levels from the text form.
///
/// # Errors
///
/// [`CommandError::Config`] on I/O or format failure.
pub fn load_log_conf_txt(
    ctrl: &dyn LogFacilityCtrl,
    path: &Path,
) -> Result<String, CommandError> {
    let mut reader = BufReader::new(File::open(path).map_err(ConfigError::Io)?);
    let entries = config_text::read_log_config_text(&mut reader)?;
    Ok(render_load_result(&entries, &apply_log_src_configs(ctrl, &entries)))
}

fn render_load_result(
    entries: &[super::LogSrcConfig],
    unknown: &[String],
) -> String {
    let mut out = format!("{} entry(s) loaded", entries.len() - unknown.len());
    for name in unknown {
        out.push_str(&format!("\nunknown log source: {name}"));
    }
    out
}

/// `LogHistory [n] [clear]`: renders the last `count` recorded messages and
/// optionally clears the ring afterwards.
#[must_use]
pub fn log_history(backend: &HistoryBackend, count: Option<usize>, clear: bool) -> String {
    let rendered = backend.render(count);
    if clear {
        backend.clear();
    }
    rendered
}
