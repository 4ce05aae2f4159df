//! Typed environment variable lookups
//!
//! Unset variables yield `None`; set-but-unparseable variables are an error
//! rather than being silently replaced by a default.

use crate::error::{CommonError, Result};
use std::str::FromStr;

/// Read a string variable, treating empty values as unset.
pub fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable.
pub fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CommonError::invalid_env(name, raw.clone(), e)),
        None => Ok(None),
    }
}

/// Read a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`).
pub fn flag(name: &str) -> Result<Option<bool>> {
    let Some(raw) = var(name) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(CommonError::invalid_env(name, raw, "expected a boolean")),
    }
}
