//! Path comparison helpers.
//!
//! Folder matching is a case-insensitive string prefix test against the folder
//! path normalised to end in exactly one separator, so `C:\App` matches
//! `c:\app\bin\x.dll` but not `C:\Apple\x.dll`.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// A folder path prepared for prefix matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPrefix {
    lowered: String,
}

impl FolderPrefix {
    /// Normalise `folder` to carry exactly one trailing separator.
    pub fn new(folder: &Path) -> Self {
        let raw = folder.to_string_lossy();
        let trimmed = raw.trim_end_matches(is_separator);
        let mut prefix = String::with_capacity(trimmed.len() + 1);
        prefix.push_str(trimmed);
        prefix.push(MAIN_SEPARATOR);
        Self {
            lowered: fold(&prefix),
        }
    }

    /// The normalised prefix, lowercased.
    pub fn as_str(&self) -> &str {
        &self.lowered
    }

    /// Whether `path` lives under this folder.
    pub fn contains(&self, path: &Path) -> bool {
        self.contains_str(&path.to_string_lossy())
    }

    /// Whether the textual `path` lives under this folder.
    pub fn contains_str(&self, path: &str) -> bool {
        fold(path).starts_with(&self.lowered)
    }
}

#[cfg(windows)]
fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

#[cfg(not(windows))]
fn is_separator(c: char) -> bool {
    c == '/'
}

/// Lowercase, with Windows' alternate separator folded onto the main one.
fn fold(path: &str) -> String {
    let lowered = path.to_lowercase();
    if cfg!(windows) {
        lowered.replace('/', "\\")
    } else {
        lowered
    }
}

/// Case-insensitive path equality.
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    fold(&a.to_string_lossy()) == fold(&b.to_string_lossy())
}

/// Render a path the way records carry it.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Drop the `\\?\` prefix `canonicalize` adds on Windows.
pub fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    #[cfg(windows)]
    {
        let text = path.to_string_lossy();
        if let Some(rest) = text.strip_prefix(r"\\?\UNC\") {
            return PathBuf::from(format!(r"\\{}", rest));
        }
        if let Some(rest) = text.strip_prefix(r"\\?\") {
            return PathBuf::from(rest);
        }
        path
    }

    #[cfg(not(windows))]
    {
        path
    }
}

/// Whether a file target should also be matched against running executables.
///
/// The extension decides; on Unix an execute permission bit also counts.
pub fn looks_executable(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if extensions.iter().any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext)) {
            return true;
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = path.metadata() {
            return metadata.is_file() && metadata.permissions().mode() & 0o111 != 0;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sep(s: &str) -> String {
        s.replace('/', &MAIN_SEPARATOR.to_string())
    }

    #[test]
    fn test_prefix_single_trailing_separator() {
        let a = FolderPrefix::new(Path::new(&sep("/opt/App")));
        let b = FolderPrefix::new(Path::new(&sep("/opt/App///")));
        assert_eq!(a, b);
        assert!(a.as_str().ends_with(MAIN_SEPARATOR));
        assert!(!a.as_str().ends_with(&format!("{0}{0}", MAIN_SEPARATOR)));
    }

    #[test]
    fn test_prefix_case_insensitive() {
        let prefix = FolderPrefix::new(Path::new(&sep("/opt/App")));
        assert!(prefix.contains(Path::new(&sep("/OPT/app/bin/tool"))));
        assert!(prefix.contains_str(&sep("/opt/APP/lib.so")));
    }

    #[test]
    fn test_prefix_rejects_sibling() {
        let prefix = FolderPrefix::new(Path::new(&sep("/opt/App")));
        assert!(!prefix.contains(Path::new(&sep("/opt/Apple/tool"))));
        assert!(!prefix.contains(Path::new(&sep("/opt/App"))));
    }

    #[test]
    fn test_paths_equal() {
        assert!(paths_equal(Path::new("/a/B.exe"), Path::new("/A/b.EXE")));
        assert!(!paths_equal(Path::new("/a/b.exe"), Path::new("/a/c.exe")));
    }

    #[test]
    fn test_looks_executable_by_extension() {
        let exts = vec!["exe".to_string(), ".COM".to_string()];
        assert!(looks_executable(Path::new("/nowhere/setup.EXE"), &exts));
        assert!(looks_executable(Path::new("/nowhere/run.com"), &exts));
        assert!(!looks_executable(Path::new("/nowhere/readme.txt"), &exts));
    }

    #[cfg(unix)]
    #[test]
    fn test_looks_executable_by_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, b"#!/bin/sh\n").unwrap();
        assert!(!looks_executable(&file, &[]));

        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(looks_executable(&file, &[]));
    }
}
