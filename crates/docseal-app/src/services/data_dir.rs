// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

use docseal_core::error::Result;

/// Environment variable that overrides the data directory outright.
pub const DATA_DIR_ENV: &str = "DOCSEAL_DATA_DIR";

/// Resolve the data directory from the environment, creating it if needed.
///
/// `$DOCSEAL_DATA_DIR`, else `$XDG_DATA_HOME/docseal`, else
/// `$HOME/.local/share/docseal`.
pub fn data_dir() -> Result<PathBuf> {
    let dir = resolve(
        std::env::var_os(DATA_DIR_ENV).map(PathBuf::from),
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    );
    ensure(&dir)?;
    Ok(dir)
}

/// Create `dir` (and parents) if it does not exist.
pub fn ensure(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

fn resolve(explicit: Option<PathBuf>, xdg: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit.filter(|d| !d.as_os_str().is_empty()) {
        return dir;
    }
    let base = xdg
        .filter(|d| !d.as_os_str().is_empty())
        .or_else(|| home.map(|h| h.join(".local").join("share")))
        // Last resort
        .unwrap_or_else(std::env::temp_dir);
    base.join("docseal")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let dir = resolve(
            Some("/srv/docseal".into()),
            Some("/xdg".into()),
            Some("/home/u".into()),
        );
        assert_eq!(dir, PathBuf::from("/srv/docseal"));
    }

    #[test]
    fn xdg_then_home() {
        assert_eq!(
            resolve(None, Some("/xdg".into()), Some("/home/u".into())),
            PathBuf::from("/xdg/docseal")
        );
        assert_eq!(
            resolve(None, None, Some("/home/u".into())),
            PathBuf::from("/home/u/.local/share/docseal")
        );
    }

    #[test]
    fn empty_values_are_ignored() {
        assert_eq!(
            resolve(Some("".into()), Some("".into()), Some("/home/u".into())),
            PathBuf::from("/home/u/.local/share/docseal")
        );
    }
}
