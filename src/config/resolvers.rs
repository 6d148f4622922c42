//! Custom value resolvers for `${name:arg}` interpolation.
//!
//! String values in the config document may reference a resolver. When the
//! whole value is a single reference, the resolved text is re-read as a TOML
//! literal so `${env:ROUNDS,8}` can feed an integer field. References embedded
//! in longer strings are substituted as text.

use std::collections::HashMap;

use thiserror::Error;

/// A resolver receives the text after the colon and returns the replacement.
pub type ResolverFn = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Errors raised while interpolating config values.
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("unterminated interpolation in {0:?}")]
    Unterminated(String),

    #[error("unknown resolver '{0}'")]
    UnknownResolver(String),

    #[error("resolver '{resolver}' failed: {message}")]
    Failed { resolver: String, message: String },
}

/// Registry of named resolvers.
pub struct Resolvers {
    resolvers: HashMap<String, ResolverFn>,
}

impl Resolvers {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// Registry preloaded with `env` and `cpu_count`.
    pub fn with_builtins() -> Self {
        let mut resolvers = Self::new();
        resolvers.register("env", resolve_env);
        resolvers.register("cpu_count", |_| {
            std::thread::available_parallelism()
                .map(|n| n.get().to_string())
                .map_err(|e| e.to_string())
        });
        resolvers
    }

    /// Register (or replace) a resolver.
    pub fn register<F>(&mut self, name: &str, resolver: F)
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.resolvers.insert(name.to_string(), Box::new(resolver));
    }

    /// Interpolate every string value in the table, recursively.
    pub fn interpolate(&self, table: &mut toml::Table) -> Result<(), ResolveError> {
        for (_, value) in table.iter_mut() {
            self.interpolate_value(value)?;
        }
        Ok(())
    }

    fn interpolate_value(&self, value: &mut toml::Value) -> Result<(), ResolveError> {
        match value {
            toml::Value::String(s) if s.contains("${") => {
                *value = self.resolve(s)?;
            }
            toml::Value::Array(items) => {
                for item in items {
                    self.interpolate_value(item)?;
                }
            }
            toml::Value::Table(table) => self.interpolate(table)?,
            _ => {}
        }
        Ok(())
    }

    fn resolve(&self, input: &str) -> Result<toml::Value, ResolveError> {
        let trimmed = input.trim();
        let single = trimmed.starts_with("${")
            && trimmed.ends_with('}')
            && trimmed[2..].find('}') == Some(trimmed.len() - 3);

        let text = self.resolve_str(input)?;
        if single {
            return Ok(parse_literal(&text));
        }
        Ok(toml::Value::String(text))
    }

    /// Substitute every `${...}` reference in `input`.
    pub fn resolve_str(&self, input: &str) -> Result<String, ResolveError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| ResolveError::Unterminated(input.to_string()))?;

            let reference = &after[..end];
            let (name, arg) = reference.split_once(':').unwrap_or((reference, ""));
            let name = name.trim();
            let resolver = self
                .resolvers
                .get(name)
                .ok_or_else(|| ResolveError::UnknownResolver(name.to_string()))?;
            let resolved = resolver(arg.trim()).map_err(|message| ResolveError::Failed {
                resolver: name.to_string(),
                message,
            })?;
            out.push_str(&resolved);

            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl Default for Resolvers {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Read `text` as a TOML literal, falling back to a plain string.
///
/// Numbers, booleans, arrays, inline tables and quoted strings are literals.
/// Anything TOML would read as a datetime, or would cut short at a `#`
/// comment, stays the string it was written as.
pub(crate) fn parse_literal(text: &str) -> toml::Value {
    let fallback = || toml::Value::String(text.to_string());
    if has_comment(text) {
        return fallback();
    }
    match format!("v = {}", text)
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut t| t.remove("v"))
    {
        Some(toml::Value::Datetime(_)) | None => fallback(),
        Some(value) => value,
    }
}

/// True if `text` has a `#` outside any quoted string.
fn has_comment(text: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in text.chars() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return true,
            None => {}
        }
    }
    false
}

/// `${env:NAME}` or `${env:NAME,default}`.
fn resolve_env(arg: &str) -> Result<String, String> {
    let (name, default) = match arg.split_once(',') {
        Some((name, default)) => (name.trim(), Some(default.trim())),
        None => (arg, None),
    };
    match (std::env::var(name), default) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_string()),
        (Err(_), None) => Err(format!("environment variable {} is not set", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_default_becomes_integer() {
        let resolvers = Resolvers::with_builtins();
        let mut table: toml::Table =
            r#"rounds = "${env:SWARM_TEST_UNSET_ROUNDS,8}""#.parse().unwrap();
        resolvers.interpolate(&mut table).unwrap();
        assert_eq!(table["rounds"].as_integer(), Some(8));
    }

    #[test]
    fn test_embedded_reference_stays_string() {
        let mut resolvers = Resolvers::new();
        resolvers.register("name", |arg| Ok(format!("node-{}", arg)));
        let out = resolvers.resolve_str("run/${name:7}/ckpt").unwrap();
        assert_eq!(out, "run/node-7/ckpt");
    }

    #[test]
    fn test_nested_tables_and_arrays() {
        let mut resolvers = Resolvers::new();
        resolvers.register("peer", |arg| Ok(format!("10.0.0.{}:38331", arg)));
        let mut table: toml::Table = r#"
            [swarm]
            initial_peers = ["${peer:1}", "${peer:2}"]
        "#
        .parse()
        .unwrap();
        resolvers.interpolate(&mut table).unwrap();

        let peers = table["swarm"]["initial_peers"].as_array().unwrap();
        assert_eq!(peers[0].as_str(), Some("10.0.0.1:38331"));
        assert_eq!(peers[1].as_str(), Some("10.0.0.2:38331"));
    }

    #[test]
    fn test_errors() {
        let resolvers = Resolvers::with_builtins();
        assert_eq!(
            resolvers.resolve_str("${nope:x}"),
            Err(ResolveError::UnknownResolver("nope".into()))
        );
        assert!(matches!(
            resolvers.resolve_str("${env:x"),
            Err(ResolveError::Unterminated(_))
        ));
        assert!(matches!(
            resolvers.resolve_str("${env:SWARM_TEST_SURELY_UNSET_VAR}"),
            Err(ResolveError::Failed { .. })
        ));
    }

    #[test]
    fn test_literal_rules() {
        assert_eq!(parse_literal("8"), toml::Value::Integer(8));
        assert_eq!(parse_literal("true"), toml::Value::Boolean(true));
        assert_eq!(
            parse_literal("[1, 2]"),
            toml::Value::Array(vec![toml::Value::Integer(1), toml::Value::Integer(2)])
        );
        assert_eq!(parse_literal(r#""a # b""#), toml::Value::String("a # b".into()));
        assert_eq!(parse_literal("joiner"), toml::Value::String("joiner".into()));
    }

    #[test]
    fn test_dates_and_comments_stay_strings() {
        assert_eq!(parse_literal("2024-01-01"), toml::Value::String("2024-01-01".into()));
        assert_eq!(parse_literal("1 # b"), toml::Value::String("1 # b".into()));
        assert_eq!(parse_literal("a # b"), toml::Value::String("a # b".into()));
        assert_eq!(parse_literal("[1, 2] # two"), toml::Value::String("[1, 2] # two".into()));
    }

    #[test]
    fn test_cpu_count() {
        let resolvers = Resolvers::with_builtins();
        let count: usize = resolvers.resolve_str("${cpu_count}").unwrap().parse().unwrap();
        assert!(count >= 1);
    }
}
