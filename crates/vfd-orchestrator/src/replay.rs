//! Loading previously generated animations for replay
//!
//! Every `anim_*.rhai` file in the directory is bound with its file stem as
//! the entry point and run once through the sandbox. Files that no longer
//! bind or fail validation are skipped with a warning.

use crate::animation::Animation;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vfd_core::{Result, VfdError};
use vfd_validation::{Program, SandboxValidator};

/// An animation and the file it came from
#[derive(Debug, Clone)]
pub struct ReplayItem {
    pub animation: Animation,
    pub source: PathBuf,
}

/// Sorted script paths in `dir`
pub fn find_scripts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(VfdError::Config(format!(
            "Replay directory not found: {}",
            dir.display()
        )));
    }

    let pattern = format!(
        "{}/anim_*.rhai",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| VfdError::Config(format!("Invalid replay pattern: {}", e)))?
        .filter_map(|entry| entry.ok())
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(VfdError::Config(format!(
            "No animation files found in {}",
            dir.display()
        )));
    }
    info!("Found {} animations to replay", paths.len());
    Ok(paths)
}

/// Bind and validate every script; blocks for up to one hang timeout per file
pub fn load_scripts(paths: &[PathBuf], validator: &SandboxValidator) -> Vec<ReplayItem> {
    paths
        .iter()
        .filter_map(|path| match load_one(path, validator) {
            Ok(animation) => Some(ReplayItem {
                animation,
                source: path.clone(),
            }),
            Err(e) => {
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                warn!("Skipping {}: {}", name, e);
                None
            }
        })
        .collect()
}

fn load_one(path: &Path, validator: &SandboxValidator) -> Result<Animation> {
    let entry_point = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| VfdError::Script(format!("{} has no file name", path.display())))?;
    let source = std::fs::read_to_string(path)?;
    let program =
        Program::bind(&source, &entry_point).map_err(|e| VfdError::Script(e.to_string()))?;
    validator
        .validate(&program)
        .map_err(|e| VfdError::Script(e.to_string()))?;
    Ok(Animation::new(entry_point.clone(), entry_point, program))
}
