use std::{io::Write, path::Path};

use {
    anyhow::Result,
    postwatch_config::{Severity, ValidationResult, validate},
};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Validate the config file and print diagnostics to stderr. Exits with
/// status 1 when any error is found.
pub fn check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(path);
    let mut stderr = std::io::stderr().lock();
    report(&result, verbose, &mut stderr)?;
    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

/// Refuse to start on a config with error diagnostics.
pub fn ensure_valid(result: &ValidationResult) -> Result<()> {
    let errors: Vec<String> = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| {
            if d.path.is_empty() {
                d.message.clone()
            } else {
                format!("{}: {}", d.path, d.message)
            }
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("invalid configuration: {}", errors.join("; "))
    }
}

fn report(result: &ValidationResult, verbose: bool, out: &mut impl Write) -> std::io::Result<()> {
    match &result.config_path {
        Some(path) => writeln!(out, "Checking {}\n", path.display())?,
        None => writeln!(out, "No config file found; checking defaults.\n")?,
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };
        if d.path.is_empty() {
            writeln!(out, "  {BOLD}{color}{label}{RESET} {}", d.message)?;
        } else {
            writeln!(out, "  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message)?;
        }
        shown += 1;
    }
    if shown > 0 {
        writeln!(out)?;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        writeln!(out, "No issues found.")
    } else {
        writeln!(out, "{errors} error(s), {warnings} warning(s)")
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn render(result: &ValidationResult, verbose: bool) -> String {
        let mut out = Vec::new();
        report(result, verbose, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn reports_errors_and_suggestions() {
        let result = validate::validate_toml_str(
            r#"
[telegram]
token = ""

[pipeline]
fanout_limt = 4
"#,
        );
        let text = render(&result, false);
        assert!(text.contains("telegram.token"));
        assert!(text.contains("fanout_limit"));
        assert!(text.contains("error(s)"));
    }

    #[test]
    fn ensure_valid_rejects_zero_album_memory() {
        let result = validate::validate_toml_str(
            "[telegram]\ntoken = \"1:a\"\n\n[pipeline]\nalbum_memory = 0\n",
        );
        let err = ensure_valid(&result).unwrap_err();
        assert!(err.to_string().contains("pipeline.album_memory"));

        let ok = validate::validate_toml_str("[telegram]\ntoken = \"1:a\"\n");
        assert!(ensure_valid(&ok).is_ok());
    }

    #[test]
    fn clean_file_reports_no_issues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postwatch.toml");
        std::fs::write(&path, "[telegram]\ntoken = \"123:abc\"\n").unwrap();

        let result = validate::validate(Some(&path));
        let text = render(&result, false);
        assert!(text.starts_with(&format!("Checking {}", path.display())));
        assert!(text.trim_end().ends_with("No issues found."), "{text}");
    }
}
