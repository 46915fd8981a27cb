//! Generator input: the struct schema and the functions to compile.
//!
//! ```json
//! {
//!   "contract_name": "OrderEncoder",
//!   "structs":   { "Order": { "type": "record(uint256 id, string[] tags)" } },
//!   "functions": { "encodeOrder": { "template": "{\"id\":{{toString .obj0.id}}}", "inputs": ["Order"] } }
//! }
//! ```
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CompileError;
use crate::path_de::{PathDeError, from_str_with_path};
use crate::schema::SchemaRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub contract_name: String,
    #[serde(default)]
    pub structs: IndexMap<String, StructDef>,
    #[serde(default)]
    pub functions: IndexMap<String, FunctionDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StructDef {
    #[serde(rename = "type")]
    pub type_expr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionDef {
    pub template: String,
    /// Struct names; input `k` is bound to `obj{k}`.
    #[serde(default)]
    pub inputs: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: PathDeError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    pub fn from_json(src: &str) -> Result<Self, ConfigError> {
        let config: Config = from_str_with_path(src)
            .map_err(|source| ConfigError::Parse { path: PathBuf::from("<inline>"), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: Config = from_str_with_path(&src)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !is_ident(&self.contract_name) {
            return Err(ConfigError::Invalid(format!(
                "contract_name `{}` is not a valid identifier",
                self.contract_name
            )));
        }
        if let Some(name) = self.functions.keys().find(|name| !is_ident(name)) {
            return Err(ConfigError::Invalid(format!("function name `{name}` is not a valid identifier")));
        }
        Ok(())
    }

    /// Schema registry over every configured struct.
    pub fn registry(&self) -> Result<SchemaRegistry, CompileError> {
        SchemaRegistry::from_sources(
            self.structs
                .iter()
                .map(|(name, def)| (name.as_str(), def.type_expr.as_str())),
        )
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "contract_name": "OrderEncoder",
        "structs": {
            "Order": { "type": "record(uint256 id, Item[] items)" },
            "Item": { "type": "record(string name, uint64 qty)" }
        },
        "functions": {
            "encodeOrder": { "template": "{{toString .obj0.id}}", "inputs": ["Order"] }
        }
    }"#;

    #[test]
    fn parses_in_declaration_order() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.contract_name, "OrderEncoder");
        assert_eq!(config.structs.keys().collect::<Vec<_>>(), ["Order", "Item"]);
        assert_eq!(config.functions["encodeOrder"].inputs, vec!["Order".to_string()]);
    }

    #[test]
    fn registry_resolves_cross_references() {
        let registry = Config::from_json(SAMPLE).unwrap().registry().unwrap();
        assert_eq!(
            registry.resolve("Order").unwrap().to_string(),
            "record(uint256 id, record(string name, uint64 qty)[] items)",
        );
    }

    #[test]
    fn parse_errors_carry_the_json_path() {
        let err = Config::from_json(r#"{"contract_name": "X", "functions": {"f": {"template": 3}}}"#).unwrap_err();
        let ConfigError::Parse { source, .. } = err else { panic!("expected parse error") };
        assert_eq!(source.path, "functions.f.template");
    }

    #[test]
    fn unknown_keys_and_bad_names_are_rejected() {
        assert!(matches!(
            Config::from_json(r#"{"contract_name": "X", "extra": 1}"#),
            Err(ConfigError::Parse { .. }),
        ));
        assert!(matches!(
            Config::from_json(r#"{"contract_name": "not valid"}"#),
            Err(ConfigError::Invalid(_)),
        ));
        assert!(matches!(
            Config::from_json(r#"{"contract_name": "X", "functions": {"1f": {"template": ""}}}"#),
            Err(ConfigError::Invalid(_)),
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
