//! Extract the entry point from raw model output
//!
//! A finite sequence of textual checks. Nothing here executes code; a
//! candidate that fails any check never reaches the engine.

use thiserror::Error;

/// Call every animation has to make
pub const REQUIRED_CALL: &str = "write_frame";

/// Default minimum length of the extracted function
pub const DEFAULT_MIN_BODY_CHARS: usize = 50;

/// Why a raw response was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("No function found")]
    NoFunctionFound,

    #[error("Missing write_frame")]
    MissingRequiredCall,

    #[error("Code too short ({length} chars)")]
    TooShort { length: usize },
}

/// Source text that passed sanitization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedCode {
    entry_point: String,
    source: String,
}

impl CleanedCode {
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Full script, prelude included
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        self.source
    }
}

/// Textual sanitizer for generated scripts
#[derive(Debug, Clone)]
pub struct Sanitizer {
    min_body_chars: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BODY_CHARS)
    }
}

impl Sanitizer {
    pub fn new(min_body_chars: usize) -> Self {
        Self { min_body_chars }
    }

    pub fn clean(&self, raw: &str, target: &str) -> Result<CleanedCode, SanitizeError> {
        let lines: Vec<&str> = raw
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect();

        let (start, definition) = find_definition(&lines, target)?;

        let mut body = definition;
        for line in &lines[start + 1..] {
            body.push('\n');
            body.push_str(line);
        }
        let body = body.trim_end();

        if !body.contains(REQUIRED_CALL) {
            return Err(SanitizeError::MissingRequiredCall);
        }
        let length = body.chars().count();
        if length < self.min_body_chars {
            return Err(SanitizeError::TooShort { length });
        }

        Ok(CleanedCode {
            entry_point: target.to_string(),
            source: format!("{}{}\n", prelude(target), body),
        })
    }
}

/// Header comment naming the entry point and the host API
fn prelude(target: &str) -> String {
    format!(
        "// Animation entry point: {target}(animator, duration)\n\
         // Host API: animator.write_frame(line1, line2), animator.frame_sleep(seconds),\n\
         //           animator.frame_rate, animator.elapsed, rand_float(), rand_int(lo, hi)\n\n"
    )
}

/// Index of the definition line and its text, renamed to `target` if needed
fn find_definition(lines: &[&str], target: &str) -> Result<(usize, String), SanitizeError> {
    let exact = lines.iter().position(|line| {
        line.trim_start()
            .strip_prefix("fn ")
            .and_then(|rest| rest.trim_start().strip_prefix(target))
            .is_some_and(|rest| !rest.starts_with(is_ident_char))
    });
    if let Some(index) = exact {
        return Ok((index, lines[index].to_string()));
    }

    lines
        .iter()
        .position(|line| line.contains("fn ") && line.to_lowercase().contains("animator"))
        .map(|index| (index, rename_definition(lines[index], target)))
        .ok_or(SanitizeError::NoFunctionFound)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace the identifier following `fn ` with `target`
fn rename_definition(line: &str, target: &str) -> String {
    let Some(fn_at) = line.find("fn ") else {
        return line.to_string();
    };
    let after = &line[fn_at + 3..];
    let name_start = after.len() - after.trim_start().len();
    let name_len: usize = after[name_start..]
        .chars()
        .take_while(|c| is_ident_char(*c))
        .map(char::len_utf8)
        .sum();

    format!(
        "{}fn {}{}",
        &line[..fn_at],
        target,
        &after[name_start + name_len..]
    )
}
