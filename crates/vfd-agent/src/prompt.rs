//! Prompt assembly and per-attempt sampling

use crate::types::GenerationRequest;
use std::path::Path;
use vfd_core::{Result, VfdError};

/// Starting temperature for the first attempt
const BASE_TEMPERATURE: f64 = 0.85;
/// Decrease per attempt
const TEMPERATURE_STEP: f64 = 0.05;
/// Temperature never drops below this
const MIN_TEMPERATURE: f64 = 0.6;

/// Later attempts sample more conservatively
pub fn temperature_for(attempt: usize) -> f64 {
    (BASE_TEMPERATURE - TEMPERATURE_STEP * attempt as f64).max(MIN_TEMPERATURE)
}

/// Load the system prompt
pub fn load_prompt(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        VfdError::Prompt(format!("Prompt file {} unreadable: {}", path.display(), e))
    })?;
    if text.trim().is_empty() {
        return Err(VfdError::Prompt(format!(
            "Prompt file {} is empty",
            path.display()
        )));
    }
    Ok(text)
}

pub(crate) fn render(request: &GenerationRequest) -> String {
    let mut retry_context = String::new();
    if request.attempt > 1 && !request.prior_errors.is_empty() {
        retry_context.push_str("\n\nPREVIOUS ATTEMPT FAILED:\n");
        let summary: Vec<String> = request
            .prior_errors
            .iter()
            .map(|e| format!("- {}", e))
            .collect();
        retry_context.push_str(&summary.join("\n"));
        retry_context.push_str("\n\nFix the error above and generate corrected code.");
    }

    format!(
        "{}\n\nCreate: {}\nFunction: {}{}\n\nONLY output code.",
        request.prompt, request.description, request.function_id, retry_context
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temperature_decay() {
        assert!((temperature_for(1) - 0.80).abs() < 1e-9);
        assert!((temperature_for(3) - 0.70).abs() < 1e-9);
        assert!((temperature_for(5) - 0.60).abs() < 1e-9);
        assert!((temperature_for(9) - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_first_attempt_has_no_retry_context() {
        let request = GenerationRequest::new("SYSTEM", "falling snow", "anim_1_1000", 1)
            .with_prior_errors(vec!["stale".into()]);
        let text = request.render();
        assert!(text.starts_with("SYSTEM\n\nCreate: falling snow\nFunction: anim_1_1000"));
        assert!(!text.contains("PREVIOUS ATTEMPT FAILED"));
        assert!(text.ends_with("ONLY output code."));
    }

    #[test]
    fn test_retry_context_lists_errors() {
        let request = GenerationRequest::new("SYSTEM", "falling snow", "anim_1_1000", 3)
            .with_prior_errors(vec!["Sanitize: Missing write_frame".into(), "Syntax: Line 4: x".into()]);
        let text = request.render();
        assert!(text.contains(
            "PREVIOUS ATTEMPT FAILED:\n- Sanitize: Missing write_frame\n- Syntax: Line 4: x\n\nFix the error"
        ));
    }

    #[test]
    fn test_load_prompt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompt.txt");
        assert!(matches!(load_prompt(&path), Err(VfdError::Prompt(_))));

        std::fs::write(&path, "   \n").unwrap();
        assert!(matches!(load_prompt(&path), Err(VfdError::Prompt(_))));

        std::fs::write(&path, "Write Rhai.").unwrap();
        assert_eq!(load_prompt(&path).unwrap(), "Write Rhai.");
    }
}
