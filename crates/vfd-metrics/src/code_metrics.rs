//! Static metrics over accepted animation code
//!
//! Purely textual and only ever used for telemetry; nothing here gates
//! acceptance.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Hex characters kept from the content hash
const HASH_CHARS: usize = 16;
/// Display characters listed verbatim in the metrics
const UNIQUE_CHARS_SHOWN: usize = 50;

const FAMILIES: &[(&str, &str)] = &[
    ("rotational", "|/-\\<^>v"),
    ("density", ".oO@*#%+"),
    ("organic", ".oO*~-"),
    ("structural", "[](){}=_"),
    ("arrows", "<>^v"),
];

const PATTERN_KEYWORDS: &[(&str, &[&str])] = &[
    ("cross_row", &["bally", "row", "y in", "y ="]),
    ("cascade", &["drops", "fall", "rain", "cascade"]),
    ("wave", &["phase", "sin", "cos", "wave"]),
    ("mirror", &["mirror", "symmetric", "reflect"]),
    ("bounce", &["bounce", "vel", "velocity"]),
    ("spiral", &["spiral", "rotate", "spin"]),
    ("particle", &["particle", "entities"]),
];

const MOTION_INDICATORS: &[&str] = &[
    "frame", "velocity", "vel", "position", "move", "offset", "step", "increment", "speed",
    "delta",
];

/// Telemetry metrics for one script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub code_length: usize,
    pub code_hash: String,
    pub lines_total: usize,
    pub lines_code: usize,
    pub functions_count: usize,
    pub loops_count: usize,
    pub conditionals_count: usize,
    pub unique_chars_count: usize,
    pub unique_chars: String,
    pub character_families: Vec<String>,
    pub character_families_count: usize,
    pub spatial_patterns: Vec<String>,
    pub spatial_patterns_count: usize,
    pub uses_both_rows: bool,
    pub uses_full_width: bool,
    pub has_motion_logic: bool,
    pub estimated_width_percent: f64,
    pub function_name: String,
    pub function_name_in_code: bool,
}

fn string_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["'`]([^"'`\\]*)["'`]"#).expect("valid regex"))
}

fn function_def() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bfn\s+\w+\s*\(").expect("valid regex"))
}

fn loop_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(for|while|loop|do)\b").expect("valid regex"))
}

fn if_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bif\b").expect("valid regex"))
}

fn range_bound() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\.=?\s*(\d+)").expect("valid regex"))
}

fn x_bound() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bx\s*<\s*(\d+)").expect("valid regex"))
}

/// Extract metrics from cleaned code
pub fn analyze_code(code: &str, function_name: &str) -> CodeMetrics {
    let lines: Vec<&str> = code.split('\n').collect();
    let lines_code = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with("//"))
        .count();

    let chars = display_characters(code);
    let families = character_families(&chars);
    let patterns = spatial_patterns(code);

    CodeMetrics {
        code_length: code.chars().count(),
        code_hash: content_hash(code),
        lines_total: lines.len(),
        lines_code,
        functions_count: function_def().find_iter(code).count(),
        loops_count: loop_keyword().find_iter(code).count(),
        conditionals_count: if_keyword().find_iter(code).count(),
        unique_chars_count: chars.len(),
        unique_chars: chars.iter().take(UNIQUE_CHARS_SHOWN).collect(),
        character_families_count: families.len(),
        character_families: families,
        spatial_patterns_count: patterns.len(),
        spatial_patterns: patterns,
        uses_both_rows: code.contains("line1") && code.contains("line2"),
        uses_full_width: code.contains("0..20") || code.contains("* 20"),
        has_motion_logic: has_motion_logic(code),
        estimated_width_percent: estimate_width_coverage(code),
        function_name: function_name.to_string(),
        function_name_in_code: code.contains(function_name),
    }
}

fn content_hash(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_CHARS);
    hash
}

/// Non-whitespace characters appearing inside string literals
fn display_characters(code: &str) -> BTreeSet<char> {
    string_literal()
        .captures_iter(code)
        .filter_map(|c| c.get(1))
        .flat_map(|m| m.as_str().chars())
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn character_families(chars: &BTreeSet<char>) -> Vec<String> {
    FAMILIES
        .iter()
        .filter(|(_, members)| members.chars().any(|c| chars.contains(&c)))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn spatial_patterns(code: &str) -> Vec<String> {
    let lower = code.to_lowercase();
    let found: Vec<String> = PATTERN_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(name, _)| name.to_string())
        .collect();
    if found.is_empty() {
        vec!["unknown".to_string()]
    } else {
        found
    }
}

fn has_motion_logic(code: &str) -> bool {
    let lower = code.to_lowercase();
    MOTION_INDICATORS.iter().any(|m| lower.contains(m))
}

/// Rough share of the display width the code addresses
fn estimate_width_coverage(code: &str) -> f64 {
    if code.contains("0..20") || code.contains("pad(20") {
        return 100.0;
    }

    let max_bound = |re: &Regex| {
        re.captures_iter(code)
            .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
            .max()
    };
    if let Some(max) = max_bound(range_bound()) {
        return (max as f64 / 20.0 * 100.0).min(100.0);
    }
    if let Some(max) = max_bound(x_bound()) {
        return (max as f64 / 20.0 * 100.0).min(100.0);
    }
    50.0
}
