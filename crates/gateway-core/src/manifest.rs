//! Named query manifest: SQL templates loaded from disk, validated once,
//! and cached in memory (spec §4.8).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use gateway_error::{GatewayError, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::identifiers::{quote_table_ref, validate_identifier};
use crate::validators::{validate_readonly_prefix, validate_sql_is_safe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Date,
    Bool,
    List,
    TableRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    #[serde(default = "default_param_type")]
    pub param_type: ParamType,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub description: String,
}

fn default_param_type() -> ParamType {
    ParamType::String
}

fn default_true() -> bool {
    true
}

impl QueryParameter {
    fn type_matches(&self, value: &JsonValue) -> bool {
        match self.param_type {
            ParamType::String | ParamType::TableRef | ParamType::Date => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::Bool => value.is_boolean(),
            ParamType::List => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    file: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: String,
    #[serde(default)]
    parameters: Vec<QueryParameter>,
    #[serde(default)]
    #[allow(dead_code)]
    cache_ttl: u64,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    queries: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Clone)]
pub struct QueryDefinition {
    pub key: String,
    pub sql: String,
    pub parameters: Vec<QueryParameter>,
    pub tags: Vec<String>,
}

impl QueryDefinition {
    pub fn table_ref_params(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.param_type == ParamType::TableRef)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Applies declared defaults, rejects unknown parameter names, and
    /// type-checks every provided value.
    pub fn apply_and_validate(&self, provided: &BTreeMap<String, JsonValue>) -> Result<BTreeMap<String, JsonValue>> {
        let known: BTreeMap<&str, &QueryParameter> = self.parameters.iter().map(|p| (p.name.as_str(), p)).collect();

        for key in provided.keys() {
            if !known.contains_key(key.as_str()) {
                return Err(GatewayError::validation_field(
                    "Unknown query parameter",
                    format!("'{key}' is not declared for query '{}'", self.key),
                    key,
                ));
            }
        }

        let mut resolved = BTreeMap::new();
        for param in &self.parameters {
            match provided.get(&param.name) {
                Some(value) => {
                    if !param.type_matches(value) {
                        return Err(GatewayError::validation_field(
                            "Query parameter has the wrong type",
                            format!("'{}' expected {:?}", param.name, param.param_type),
                            param.name.clone(),
                        ));
                    }
                    resolved.insert(param.name.clone(), value.clone());
                }
                None => {
                    if let Some(default) = &param.default {
                        resolved.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        return Err(GatewayError::validation_field(
                            "Missing required query parameter",
                            format!("'{}' is required for query '{}'", param.name, self.key),
                            param.name.clone(),
                        ));
                    }
                }
            }
        }

        Ok(resolved)
    }

    /// Substitutes `table_ref`-typed parameters directly into the SQL text
    /// (quoted, three-level) since identifiers cannot be bound as
    /// placeholders; returns the rewritten SQL with those tokens removed
    /// from the bound-parameter set.
    pub fn substitute_table_refs(&self, sql: &str, params: &mut BTreeMap<String, JsonValue>) -> Result<String> {
        let mut sql = sql.to_string();
        for name in self.table_ref_params() {
            if let Some(JsonValue::String(value)) = params.remove(name) {
                let quoted = quote_table_ref(&value)?;
                sql = sql.replace(&format!(":{name}"), &quoted);
            }
        }
        Ok(sql)
    }
}

pub struct QueryLoader {
    queries_dir: PathBuf,
    definitions: DashMap<String, QueryDefinition>,
    manifest_path: PathBuf,
}

impl QueryLoader {
    pub fn new(queries_dir: impl Into<PathBuf>) -> Self {
        let queries_dir = queries_dir.into();
        let manifest_path = queries_dir.join("manifest.json");
        Self {
            queries_dir,
            definitions: DashMap::new(),
            manifest_path,
        }
    }

    pub fn reload(&self) -> Result<()> {
        self.definitions.clear();
        let manifest_text = fs::read_to_string(&self.manifest_path).map_err(|e| {
            GatewayError::validation("Could not load the query manifest", format!("reading manifest.json: {e}"))
        })?;
        let manifest: ManifestFile = serde_json::from_str(&manifest_text).map_err(|e| {
            GatewayError::validation("Query manifest is malformed", format!("parsing manifest.json: {e}"))
        })?;

        for (key, entry) in manifest.queries {
            self.validate_key(&key)?;
            for param in &entry.parameters {
                validate_identifier(&param.name)?;
            }

            let sql_path: PathBuf = self.queries_dir.join(&entry.file);
            let sql = fs::read_to_string(&sql_path).map_err(|e| {
                GatewayError::validation("Could not load a named query file", format!("reading {:?}: {e}", sql_path))
            })?;
            validate_readonly_prefix(&sql)?;
            validate_sql_is_safe(&sql)?;

            self.definitions.insert(
                key.clone(),
                QueryDefinition {
                    key,
                    sql,
                    parameters: entry.parameters,
                    tags: entry.tags,
                },
            );
        }

        Ok(())
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        for segment in key.split('.') {
            validate_identifier(segment)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<QueryDefinition> {
        if self.definitions.is_empty() {
            self.reload()?;
        }
        self.definitions.get(key).map(|r| r.clone()).ok_or_else(|| {
            GatewayError::NotFound {
                user_message: "The requested query does not exist".to_string(),
                internal_message: format!("no manifest entry for key '{key}'"),
                resource: Some(key.to_string()),
            }
        })
    }

    pub fn list_by_tag(&self, tag: &str) -> Vec<QueryDefinition> {
        self.definitions.iter().filter(|e| e.tags.iter().any(|t| t == tag)).map(|e| e.value().clone()).collect()
    }
}

pub fn default_queries_dir() -> PathBuf {
    Path::new("queries").to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_parameter_is_rejected() {
        let def = QueryDefinition {
            key: "analytics.foo".to_string(),
            sql: "SELECT 1".to_string(),
            parameters: vec![],
            tags: vec![],
        };
        let mut provided = BTreeMap::new();
        provided.insert("bogus".to_string(), serde_json::json!(1));
        assert!(def.apply_and_validate(&provided).is_err());
    }

    #[test]
    fn loader_reads_manifest_and_sql_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"queries": {"schema.list_tables": {"file": "list_tables.sql", "description": "", "parameters": []}}}"#,
        )
        .unwrap();
        let mut f = fs::File::create(dir.path().join("list_tables.sql")).unwrap();
        write!(f, "SELECT table_name FROM information_schema.tables").unwrap();

        let loader = QueryLoader::new(dir.path());
        let def = loader.get("schema.list_tables").unwrap();
        assert!(def.sql.contains("information_schema"));
    }
}
