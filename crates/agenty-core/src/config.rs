//! YAML configuration with fragment merging and env-var overrides
//!
//! The main file `agenty.yaml` is discovered in a fixed search path.
//! Sibling `agenty.*.yaml` fragments are merged in sorted order, then any
//! files named in the `include:` list (relative to the main file). Env
//! vars prefixed `AGENTY_` override scalar settings last.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_yaml::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub port: u16,
    pub debug: bool,
    pub allowed_paths: Vec<String>,
    pub db: DatabaseConfig,
    pub embedding: Option<EmbeddingConfig>,
    pub auth: AuthConfig,
    pub include: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            debug: false,
            allowed_paths: Vec::new(),
            db: DatabaseConfig::default(),
            embedding: None,
            auth: AuthConfig::default(),
            include: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: String::new(),
            database: "agenty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub username: String,
    pub password: String,
}

const CONFIG_NAME: &str = "agenty.yaml";

fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("."),
        PathBuf::from("./config"),
        PathBuf::from("./configs"),
        PathBuf::from("/etc/agenty"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(Path::new(&home).join(".agenty"));
    }
    paths
}

impl AppConfig {
    /// Load from the default search path; missing config files fall back
    /// to defaults (env overrides still apply).
    pub fn load() -> Result<Self> {
        Self::load_with_paths(&default_search_paths())
    }

    pub fn load_with_paths(search_paths: &[PathBuf]) -> Result<Self> {
        let main_file = search_paths
            .iter()
            .map(|dir| dir.join(CONFIG_NAME))
            .find(|path| path.is_file());

        let mut config = match main_file {
            Some(path) => {
                tracing::info!(path = %path.display(), "using config file");
                Self::load_from_file(&path)?
            }
            None => {
                tracing::warn!("no config file found, using defaults");
                Self::default()
            }
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut merged: Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        let dir = path.parent().unwrap_or(Path::new("."));
        let mut seen = BTreeSet::new();
        seen.insert(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));

        for fragment in discover_fragments(dir, path)? {
            merge_file(&mut merged, &fragment, &mut seen)?;
        }

        // Resolve the include list after fragments so fragments can add to it.
        let includes: Vec<String> = merged
            .get("include")
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        for include in includes {
            merge_file(&mut merged, &dir.join(include), &mut seen)?;
        }

        let config: AppConfig = serde_yaml::from_value(merged).context("invalid configuration")?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("invalid port number: {}", self.port);
        }
        if self.auth.enabled && (self.auth.username.is_empty() || self.auth.password.is_empty()) {
            bail!("auth is enabled but username or password is empty");
        }
        if let Some(embedding) = &self.embedding {
            if !embedding.api_key.is_empty() && embedding.dimensions == 0 {
                bail!("embedding dimensions must be positive");
            }
        }
        Ok(())
    }
}

/// Sibling `agenty.*.yaml` fragments next to the main config, sorted by
/// file name.
fn discover_fragments(dir: &Path, main_file: &Path) -> Result<Vec<PathBuf>> {
    let mut fragments = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(fragments),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path == main_file || !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("agenty.") && name.ends_with(".yaml") {
            fragments.push(path);
        }
    }

    fragments.sort();
    Ok(fragments)
}

fn merge_file(base: &mut Value, path: &Path, seen: &mut BTreeSet<PathBuf>) -> Result<()> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !seen.insert(canonical) {
        return Ok(());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config fragment {}", path.display()))?;
    let overlay: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config fragment {}", path.display()))?;
    merge_values(base, overlay);
    Ok(())
}

/// Recursive mapping merge; scalars and sequences in the overlay win.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay) => *base_slot = overlay,
    }
}

/// Apply `AGENTY_*` env overrides. The lookup is injected so tests can run
/// without mutating the process environment.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("AGENTY_PORT").and_then(|v| v.parse().ok()) {
        config.port = port;
    }
    if let Some(debug) = lookup("AGENTY_DEBUG").and_then(|v| v.parse().ok()) {
        config.debug = debug;
    }
    if let Some(host) = lookup("AGENTY_DB_HOST") {
        config.db.host = host;
    }
    if let Some(port) = lookup("AGENTY_DB_PORT").and_then(|v| v.parse().ok()) {
        config.db.port = port;
    }
    if let Some(username) = lookup("AGENTY_DB_USERNAME") {
        config.db.username = username;
    }
    if let Some(password) = lookup("AGENTY_DB_PASSWORD") {
        config.db.password = password;
    }
    if let Some(database) = lookup("AGENTY_DB_DATABASE") {
        config.db.database = database;
    }
    if let Some(api_key) = lookup("AGENTY_EMBEDDING_API_KEY") {
        config.embedding.get_or_insert_with(Default::default).api_key = api_key;
    }
    if let Some(base_url) = lookup("AGENTY_EMBEDDING_BASE_URL") {
        config.embedding.get_or_insert_with(Default::default).base_url = base_url;
    }
    if let Some(model) = lookup("AGENTY_EMBEDDING_MODEL") {
        config.embedding.get_or_insert_with(Default::default).model = model;
    }
    if let Some(dimensions) = lookup("AGENTY_EMBEDDING_DIMENSIONS").and_then(|v| v.parse().ok()) {
        config
            .embedding
            .get_or_insert_with(Default::default)
            .dimensions = dimensions;
    }
    if let Some(enabled) = lookup("AGENTY_AUTH_ENABLED").and_then(|v| v.parse().ok()) {
        config.auth.enabled = enabled;
    }
    if let Some(username) = lookup("AGENTY_AUTH_USERNAME") {
        config.auth.username = username;
    }
    if let Some(password) = lookup("AGENTY_AUTH_PASSWORD") {
        config.auth.password = password;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn main_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("agenty.yaml"),
            "port: 9090\nallowedPaths:\n  - /work\n",
        )
        .unwrap();

        let config = AppConfig::load_with_paths(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.allowed_paths, vec!["/work"]);
        assert_eq!(config.db.host, "localhost");
    }

    #[test]
    fn fragments_merge_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("agenty.yaml"), "port: 8080\n").unwrap();
        fs::write(
            dir.path().join("agenty.db.yaml"),
            "db:\n  host: db.internal\n  password: secret\n",
        )
        .unwrap();
        fs::write(dir.path().join("agenty.zz.yaml"), "db:\n  host: final.host\n").unwrap();

        let config = AppConfig::load_with_paths(&[dir.path().to_path_buf()]).unwrap();
        // Later fragment (sorted) wins; earlier keys survive.
        assert_eq!(config.db.host, "final.host");
        assert_eq!(config.db.password, "secret");
    }

    #[test]
    fn include_list_is_resolved_relative_to_main_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("agenty.yaml"),
            "include:\n  - extra.yaml\nport: 8080\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("extra.yaml"),
            "embedding:\n  apiKey: ek-123\n  dimensions: 768\n",
        )
        .unwrap();

        let config = AppConfig::load_with_paths(&[dir.path().to_path_buf()]).unwrap();
        let embedding = config.embedding.unwrap();
        assert_eq!(embedding.api_key, "ek-123");
        assert_eq!(embedding.dimensions, 768);
    }

    #[test]
    fn env_overrides_beat_file_values() {
        let mut config = AppConfig {
            port: 8080,
            ..Default::default()
        };
        let env: HashMap<&str, &str> = [
            ("AGENTY_PORT", "9999"),
            ("AGENTY_DB_PASSWORD", "from-env"),
            ("AGENTY_DEBUG", "true"),
            ("AGENTY_AUTH_ENABLED", "true"),
            ("AGENTY_AUTH_USERNAME", "admin"),
            ("AGENTY_AUTH_PASSWORD", "pw"),
        ]
        .into_iter()
        .collect();

        apply_env_overrides(&mut config, lookup_from(&env));

        assert_eq!(config.port, 9999);
        assert_eq!(config.db.password, "from-env");
        assert!(config.debug);
        assert!(config.auth.enabled);
    }

    #[test]
    fn embedding_env_overrides_create_the_section() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> =
            [("AGENTY_EMBEDDING_API_KEY", "ek-9")].into_iter().collect();

        apply_env_overrides(&mut config, lookup_from(&env));
        assert_eq!(config.embedding.unwrap().api_key, "ek-9");
    }

    #[test]
    fn auth_enabled_requires_credentials() {
        let config = AppConfig {
            port: 8080,
            auth: AuthConfig {
                enabled: true,
                username: String::new(),
                password: String::new(),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
