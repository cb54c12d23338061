//! Failure artifacts written next to the generated code
//!
//! `failed_<id>_attempt<N>.txt` holds one rejected attempt together with the
//! full raw response; `failed_<id>.txt` summarizes an exhausted idea.

use std::path::{Path, PathBuf};
use tracing::debug;
use vfd_core::Result;

const RULE_WIDTH: usize = 60;

fn section(title: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!("{}\n{}\n{}", rule, title, rule)
}

pub fn attempt_path(output_dir: &Path, function_id: &str, attempt: usize) -> PathBuf {
    output_dir.join(format!("failed_{}_attempt{}.txt", function_id, attempt))
}

pub fn summary_path(output_dir: &Path, function_id: &str) -> PathBuf {
    output_dir.join(format!("failed_{}.txt", function_id))
}

/// Record one failed attempt
pub fn write_attempt(
    output_dir: &Path,
    function_id: &str,
    idea: &str,
    attempt: usize,
    error: &str,
    raw_response: &str,
) -> Result<PathBuf> {
    let path = attempt_path(output_dir, function_id, attempt);
    let body = format!(
        "Description: {}\n\n{}\n\n{}\n\n{}\n\n{}",
        idea,
        section(&format!("ATTEMPT {}", attempt)),
        error,
        section("RESPONSE"),
        raw_response
    );
    std::fs::create_dir_all(output_dir)?;
    std::fs::write(&path, body)?;
    debug!("Full response saved to {}", path.display());
    Ok(path)
}

/// Record an idea that used up its attempt budget
pub fn write_summary(
    output_dir: &Path,
    function_id: &str,
    idea: &str,
    attempts: usize,
    errors: &[String],
    last_response: &str,
) -> Result<PathBuf> {
    let path = summary_path(output_dir, function_id);
    let listed: Vec<String> = errors.iter().map(|e| format!("- {}", e)).collect();
    let body = format!(
        "Description: {}\nFunction: {}\n\n{}\n\n{}\n\n{}\n\n{}",
        idea,
        function_id,
        section(&format!("ALL {} ATTEMPTS FAILED", attempts)),
        listed.join("\n"),
        section("LAST RESPONSE"),
        last_response
    );
    std::fs::create_dir_all(output_dir)?;
    std::fs::write(&path, body)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_attempt_artifact_layout() {
        let dir = TempDir::new().unwrap();
        let path = write_attempt(
            dir.path(),
            "anim_1_1000",
            "falling snow",
            2,
            "Sanitize: Missing write_frame",
            "fn nope() {}",
        )
        .unwrap();

        assert!(path.ends_with("failed_anim_1_1000_attempt2.txt"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("Description: falling snow\n\n"));
        assert!(text.contains(&format!("{}\nATTEMPT 2\n", "=".repeat(60))));
        assert!(text.contains("Sanitize: Missing write_frame"));
        assert!(text.ends_with("RESPONSE\n============================================================\n\nfn nope() {}"));
    }

    #[test]
    fn test_summary_lists_errors() {
        let dir = TempDir::new().unwrap();
        let errors = vec!["Gen[4]: Timeout".to_string(), "Syntax: Line 2: x".to_string()];
        let path = write_summary(dir.path(), "anim_1_1000", "rain", 5, &errors, "").unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("ALL 5 ATTEMPTS FAILED"));
        assert!(text.contains("- Gen[4]: Timeout\n- Syntax: Line 2: x"));
    }
}
