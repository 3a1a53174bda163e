use std::path::{Path, PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::PostwatchConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "postwatch.toml",
    "postwatch.yaml",
    "postwatch.yml",
    "postwatch.json",
];

/// Environment variables consulted for the bot token, in order.
const TOKEN_ENV_VARS: &[&str] = &["POSTWATCH_TELEGRAM_TOKEN", "BOT_TOKEN"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<PostwatchConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load the effective configuration.
///
/// An explicit path must exist and parse. Otherwise the standard locations
/// are searched; with no file found the defaults are used. Environment
/// overrides are applied last. Returns the config and the file it came from.
pub fn load(explicit: Option<&Path>) -> Result<(PostwatchConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    let mut config = match &path {
        Some(p) => {
            debug!(path = %p.display(), "loading config");
            load_config(p)?
        },
        None => {
            debug!("no config file found, using defaults");
            PostwatchConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    Ok((config, path))
}

/// Fill the bot token from the environment when the config leaves it empty.
pub fn apply_env_overrides(config: &mut PostwatchConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut PostwatchConfig, lookup: impl Fn(&str) -> Option<String>) {
    if !config.telegram.token.expose_secret().is_empty() {
        return;
    }
    if let Some((var, token)) = TOKEN_ENV_VARS
        .iter()
        .find_map(|var| lookup(var).filter(|v| !v.is_empty()).map(|v| (var, v)))
    {
        debug!(var, "telegram token taken from environment");
        config.telegram.token = Secret::new(token);
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/postwatch/
    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/postwatch/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "postwatch").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<PostwatchConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
