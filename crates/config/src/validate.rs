//! Configuration validation.
//!
//! Checks a config file against the known schema, flags unknown or misspelled
//! fields, and reports settings that would break ingestion or delivery.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use secrecy::ExposeSecret;

use crate::{env_subst::substitute_env, loader::apply_env_overrides, schema::PostwatchConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "semantic", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "pipeline.fanout_limit"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let section = |keys: &[&'static str]| Struct(keys.iter().map(|k| (*k, Leaf)).collect());

    Struct(HashMap::from([
        (
            "telegram",
            section(&[
                "token",
                "poll_timeout_secs",
                "channel_allowlist",
                "history_per_chat",
            ]),
        ),
        (
            "pipeline",
            section(&[
                "album_scan_window",
                "album_scan_limit",
                "album_memory",
                "fanout_limit",
            ]),
        ),
        ("subscribers", section(&["path"])),
        ("media", section(&["staging_dir"])),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered default file
/// if `path` is `None`. Environment overrides are applied before the
/// semantic checks, so a token supplied via `BOT_TOKEN` counts.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        let mut diagnostics = vec![Diagnostic::new(
            Severity::Info,
            "file-ref",
            "",
            "no config file found; using defaults",
        )];
        let mut config = PostwatchConfig::default();
        apply_env_overrides(&mut config);
        check_semantics(&config, &mut diagnostics);
        return ValidationResult {
            diagnostics,
            config_path: None,
        };
    };

    let content = match std::fs::read_to_string(&actual_path) {
        Ok(c) => substitute_env(&c),
        Err(e) => {
            return ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    format!("failed to read config file: {e}"),
                )],
                config_path: Some(actual_path),
            };
        },
    };

    let ext = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("toml");
    let parsed = match ext {
        "toml" => toml::from_str::<toml::Value>(&content).map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::from_str::<toml::Value>(&content).map_err(|e| e.to_string()),
        "json" => serde_json::from_str::<toml::Value>(&content).map_err(|e| e.to_string()),
        other => Err(format!("unsupported config format: .{other}")),
    };

    let mut result = match parsed {
        Ok(value) => validate_value(value, true),
        Err(message) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("syntax error: {message}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without touching the file system or environment.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    match toml::from_str::<toml::Value>(toml_str) {
        Ok(value) => validate_value(value, false),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            )],
            config_path: None,
        },
    }
}

fn validate_value(value: toml::Value, with_env: bool) -> ValidationResult {
    let mut diagnostics = Vec::new();

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match value.try_into::<PostwatchConfig>() {
        Ok(mut config) => {
            if with_env {
                apply_env_overrides(&mut config);
            }
            check_semantics(&config, &mut diagnostics);
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known: Vec<&str> = fields.keys().copied().collect();
    for (key, child) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child, child_schema, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            " at top level"
        } else {
            ""
        };
        let message = match suggest(key, &known, 3) {
            Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
            None => format!("unknown field{level}"),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "unknown-field",
            path,
            message,
        ));
    }
}

fn check_semantics(config: &PostwatchConfig, diagnostics: &mut Vec<Diagnostic>) {
    let telegram = &config.telegram;
    if telegram.token.expose_secret().trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "telegram.token",
            "bot token is empty; set it here or via BOT_TOKEN",
        ));
    }
    if telegram.poll_timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "semantic",
            "telegram.poll_timeout_secs",
            "0 disables long polling; getUpdates will be called in a tight loop",
        ));
    }
    for (i, entry) in telegram.channel_allowlist.iter().enumerate() {
        let entry = entry.trim();
        let looks_valid = entry.starts_with('@')
            || entry.contains("t.me/")
            || entry.parse::<i64>().is_ok()
            || entry == "*";
        if !looks_valid {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "semantic",
                format!("telegram.channel_allowlist[{i}]"),
                format!("\"{entry}\" is not an @handle, t.me link or chat id"),
            ));
        }
    }

    let pipeline = &config.pipeline;
    if pipeline.album_scan_window < 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "pipeline.album_scan_window",
            "must not be negative",
        ));
    } else if pipeline.album_scan_window == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "semantic",
            "pipeline.album_scan_window",
            "0 disables sibling lookup; albums will be delivered as single photos",
        ));
    } else {
        let span = usize::try_from(pipeline.album_scan_window)
            .unwrap_or(usize::MAX)
            .saturating_mul(2)
            .saturating_add(1);
        if telegram.history_per_chat < span {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "semantic",
                "telegram.history_per_chat",
                format!(
                    "smaller than the album scan span ({span}); album parts may be missed"
                ),
            ));
        }
        if pipeline.album_scan_limit == 0 {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "semantic",
                "pipeline.album_scan_limit",
                "0 returns no siblings; albums will be delivered as single photos",
            ));
        }
    }
    if pipeline.fanout_limit == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "pipeline.fanout_limit",
            "must be at least 1",
        ));
    }
    if pipeline.album_memory == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "pipeline.album_memory",
            "must be at least 1; completed albums must be remembered to emit them once",
        ));
    }

    if let Some(parent) = config
        .subscribers
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "file-ref",
            "subscribers.path",
            format!("directory {} does not exist yet; it will be created", parent.display()),
        ));
    }
}
