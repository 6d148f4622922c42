//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::resolvers::{parse_literal, ResolveError, Resolvers};
use crate::config::schema::LauncherConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment switch that asks the loader for full error context.
pub const FULL_ERROR_ENV: &str = "SWARM_FULL_ERROR";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },

    #[error("invalid override '{0}': expected dotted.key=value")]
    Override(String),

    #[error("interpolation failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full error context is on unless `SWARM_FULL_ERROR=0`.
pub fn full_error_enabled() -> bool {
    std::env::var(FULL_ERROR_ENV).map_or(true, |v| v != "0")
}

/// Load, override, interpolate and validate configuration from a TOML file.
pub fn load_config(
    path: &Path,
    overrides: &[String],
    resolvers: &Resolvers,
) -> Result<LauncherConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &content, overrides, resolvers)
}

/// Same as [`load_config`] but from an in-memory document.
pub fn parse_config(
    path: &Path,
    content: &str,
    overrides: &[String],
    resolvers: &Resolvers,
) -> Result<LauncherConfig, ConfigError> {
    let mut document: toml::Table = content.parse().map_err(|e| parse_error(path, e))?;

    for item in overrides {
        apply_override(&mut document, item)?;
    }
    resolvers.interpolate(&mut document)?;

    let config = toml::Value::Table(document)
        .try_into::<LauncherConfig>()
        .map_err(|e| parse_error(path, e))?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(path = %path.display(), overrides = overrides.len(), "Configuration parsed");
    Ok(config)
}

fn parse_error(path: &Path, err: toml::de::Error) -> ConfigError {
    let detail = if full_error_enabled() {
        err.to_string()
    } else {
        format!("{} (unset {} for full context)", err.message(), FULL_ERROR_ENV)
    };
    ConfigError::Parse {
        path: path.to_path_buf(),
        detail,
    }
}

/// Apply a `dotted.key=value` override, creating intermediate tables.
pub fn apply_override(document: &mut toml::Table, item: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Override(item.to_string());

    let (key, raw) = item.split_once('=').ok_or_else(invalid)?;
    let segments: Vec<&str> = key.trim().split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid());
    }

    let (last, parents) = segments.split_last().ok_or_else(invalid)?;
    let mut table = document;
    for segment in parents {
        let entry = table
            .entry(segment.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        table = entry.as_table_mut().ok_or_else(invalid)?;
    }

    table.insert(last.to_string(), parse_literal(raw.trim()));
    Ok(())
}
