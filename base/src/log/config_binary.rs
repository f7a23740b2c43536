// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Binary form of the persisted log configuration.
//!
//! Little-endian layout:
//!
//! ```text
//! u32  magic-version (0x00000001)
//! u64  entry count
//! per entry:
//!   u32  name length in byte
//!   ...  UTF-8 name
//!   u8   level code (0..=5)
//! ```

use super::{ConfigError, LogLevel, LogSrcConfig};
use std::io::{Read, Write};

/// Magic-version word at the start of every binary configuration.
pub const LOG_CONFIG_MAGIC: u32 = 0x0000_0001;

/// Writes `entries` in the binary layout.
///
/// # Errors
///
/// [`ConfigError::Io`] on write failure; [`ConfigError::InvalidFormat`] for a
/// source name longer than `u32::MAX` byte.
pub fn write_log_config(
    writer: &mut dyn Write,
    entries: &[LogSrcConfig],
) -> Result<(), ConfigError> {
    writer.write_all(&LOG_CONFIG_MAGIC.to_le_bytes())?;
    writer.write_all(&(entries.len() as u64).to_le_bytes())?;

    for (name, level) in entries {
        let bytes = name.as_bytes();
        let length = u32::try_from(bytes.len()).map_err(|_| ConfigError::InvalidFormat {
            reason: format!("source name of {} byte exceeds the format limit", bytes.len()),
        })?;
        writer.write_all(&length.to_le_bytes())?;
        writer.write_all(bytes)?;
        writer.write_all(&[*level as u8])?;
    }
    Ok(())
}

/// Reads a binary configuration back into a list.
///
/// # Errors
///
/// [`ConfigError::BadMagic`] for an unknown version word;
/// [`ConfigError::InvalidFormat`] for bad level codes or non-UTF-8 names;
/// [`ConfigError::Io`] on read failure (truncation included).
pub fn read_log_config(reader: &mut dyn Read) -> Result<Vec<LogSrcConfig>, ConfigError> {
    let magic = read_u32(reader)?;
    if magic != LOG_CONFIG_MAGIC {
        return Err(ConfigError::BadMagic { found: magic });
    }

    let count = read_u64(reader)?;
    let mut entries = Vec::new();

    for _ in 0..count {
        let length = read_u32(reader)? as usize;
        let mut name_bytes = Vec::new();
        name_bytes
            .try_reserve_exact(length)
            .map_err(|_| ConfigError::InvalidFormat {
                reason: format!("source name length {length} exceeds available memory"),
            })?;
        name_bytes.resize(length, 0);
        reader.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes).map_err(|_| ConfigError::InvalidFormat {
            reason: "source name is not valid UTF-8".to_owned(),
        })?;

        let code = read_u8(reader)?;
        let level = LogLevel::from_repr(code).ok_or_else(|| ConfigError::InvalidFormat {
            reason: format!("invalid log level code {code}"),
        })?;

        entries.push((name, level));
    }

    Ok(entries)
}

fn read_u8(reader: &mut dyn Read) -> std::io::Result<u8> {
    let mut buffer = [0u8; 1];
    reader.read_exact(&mut buffer)?;
    Ok(buffer[0])
}

fn read_u32(reader: &mut dyn Read) -> std::io::Result<u32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(u32::from_le_bytes(buffer))
}

fn read_u64(reader: &mut dyn Read) -> std::io::Result<u64> {
    let mut buffer = [0u8; 8];
    reader.read_exact(&mut buffer)?;
    Ok(u64::from_le_bytes(buffer))
}
