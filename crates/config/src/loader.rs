use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::PairlinkConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "pairlink.toml",
    "pairlink.yaml",
    "pairlink.yml",
    "pairlink.json",
];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Restrict config discovery to `path`; project-local and user-global
/// locations are skipped while an override is set.
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(path);
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<PairlinkConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./pairlink.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/pairlink/pairlink.{toml,yaml,yml,json}` (user-global)
///
/// Returns `PairlinkConfig::default()` if no file is found or the one found
/// cannot be parsed.
pub fn discover_and_load() -> PairlinkConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return PairlinkConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            PairlinkConfig::default()
        },
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return find_in_dir(&dir);
    }

    // Project-local
    if let Some(path) = find_in_dir(Path::new(".")) {
        return Some(path);
    }

    // User-global: ~/.config/pairlink/
    config_dir().and_then(|dir| find_in_dir(&dir))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/pairlink/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("pairlink"))
}

/// Render `config` as pretty TOML.
pub fn to_toml_string(config: &PairlinkConfig) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<PairlinkConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn loads_each_supported_format() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("pairlink.toml");
        std::fs::write(&toml_path, "[server]\nport = 4001\n").unwrap();
        assert_eq!(load_config(&toml_path).unwrap().server.port, 4001);

        let yaml_path = dir.path().join("pairlink.yaml");
        std::fs::write(&yaml_path, "session:\n  code_prefix: \"ROOM-\"\n").unwrap();
        assert_eq!(load_config(&yaml_path).unwrap().session.code_prefix, "ROOM-");

        let json_path = dir.path().join("pairlink.json");
        std::fs::write(&json_path, r#"{"server":{"bind":"0.0.0.0"}}"#).unwrap();
        assert_eq!(load_config(&json_path).unwrap().server.bind, "0.0.0.0");
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairlink.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn toml_is_preferred_over_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pairlink.json"), "{}").unwrap();
        std::fs::write(dir.path().join("pairlink.toml"), "").unwrap();
        assert_eq!(
            find_in_dir(dir.path()),
            Some(dir.path().join("pairlink.toml"))
        );
    }

    #[test]
    fn override_dir_isolates_discovery() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pairlink.toml"),
            "[session]\ncode_bytes = 4\n",
        )
        .unwrap();
        set_config_dir(dir.path().to_path_buf());
        let cfg = discover_and_load();
        clear_config_dir();
        assert_eq!(cfg.session.code_bytes, 4);
    }

    #[test]
    fn rendered_toml_round_trips() {
        let cfg = PairlinkConfig::default();
        let rendered = to_toml_string(&cfg).unwrap();
        let parsed: PairlinkConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, cfg);
    }
}
