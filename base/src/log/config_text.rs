// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Text form of the persisted log configuration.
//!
//! One entry per line, `#` comments, whitespace-tolerant:
//!
//! ```text
//! # Log source configuration
//! # <source name> : <level>
//! MainLoop : debug
//! Storage  : warning
//! ```
//!
//! Level words are `debug info warning error fatal nothing`. A malformed line
//! aborts the read.

use super::{ConfigError, LogLevel, LogSrcConfig};
use nom::{IResult, Parser,
          bytes::complete::{tag, take_till1},
          character::complete::{alpha1, multispace0}};
use std::{io::{Read, Write},
          str::FromStr};

/// Writes `entries` as text, preceded by a header comment.
///
/// # Errors
///
/// [`ConfigError::Io`] on write failure.
pub fn write_log_config_text(
    writer: &mut dyn Write,
    entries: &[LogSrcConfig],
) -> Result<(), ConfigError> {
    writeln!(writer, "# Log source configuration")?;
    writeln!(writer, "# <source name> : <level>")?;
    for (name, level) in entries {
        writeln!(writer, "{name} : {level}")?;
    }
    Ok(())
}

/// Reads a text configuration back into a list. Comments and blank lines are
/// skipped; entry order is preserved.
///
/// # Errors
///
/// [`ConfigError::InvalidFormat`] at the first malformed line (the read aborts
/// there); [`ConfigError::Io`] on read failure or non-UTF-8 input.
pub fn read_log_config_text(reader: &mut dyn Read) -> Result<Vec<LogSrcConfig>, ConfigError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut entries = Vec::new();
    for (line_index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let entry = parse_entry(trimmed).ok_or_else(|| ConfigError::InvalidFormat {
            reason: format!("line {}: expected '<name> : <level>'", line_index + 1),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// `<name> : <level-word>` with surrounding whitespace tolerated.
fn parse_entry(line: &str) -> Option<LogSrcConfig> {
    let (remaining, (raw_name, word)) = entry_parts(line).ok()?;
    if !remaining.is_empty() {
        return None;
    }

    let name = raw_name.trim();
    if name.is_empty() {
        return None;
    }

    let level = LogLevel::from_str(word).ok()?;
    Some((name.to_owned(), level))
}

fn entry_parts(line: &str) -> IResult<&str, (&str, &str)> {
    let (remaining, (raw_name, _colon, _ws, word, _trailing)) =
        (take_till1(|c| c == ':'), tag(":"), multispace0, alpha1, multispace0)
            .parse(line)?;
    Ok((remaining, (raw_name, word)))
}
