//! Source tree scanner

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, instrument, trace, warn};
use walkdir::{DirEntry, WalkDir};

use codescope_core::domain::analysis::SourceFile;

use crate::domain::{AcquisitionError, ScanResult};

/// Bytes inspected for a NUL when deciding whether a file is binary
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

const IGNORED_DIRECTORIES: &[&str] = &[
    "node_modules",
    "target",
    "vendor",
    "venv",
    "__pycache__",
    "dist",
    "build",
    "coverage",
];

/// Walk `root` and load every analysable source file.
///
/// Hidden and vendored directories are skipped, as are files matching
/// `exclude_patterns` (matched against the `/`-separated path relative to
/// `root`), files over `max_file_size` bytes, binary files, and files whose
/// extension maps to no known language. A file that cannot be read is
/// logged and skipped; only a missing root or a bad pattern fails the scan.
#[instrument(skip(exclude_patterns), fields(root = %root.display()))]
pub fn scan_directory(
    root: &Path,
    max_file_size: u64,
    exclude_patterns: &[String],
) -> Result<ScanResult, AcquisitionError> {
    if !root.is_dir() {
        return Err(AcquisitionError::MissingPath(
            root.to_string_lossy().to_string(),
        ));
    }

    let excludes = build_glob_set(exclude_patterns)?;
    let mut files = Vec::new();
    let mut skipped = 0usize;

    let walker = WalkDir::new(root).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|e| e.depth() == 0 || !is_ignored(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = relative_path(root, entry.path());
        if excludes.is_match(&relative) {
            trace!(file = %relative, "Excluded by pattern");
            skipped += 1;
            continue;
        }

        let Some(language) = detect_language(entry.path()) else {
            skipped += 1;
            continue;
        };

        let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
        if size > max_file_size {
            trace!(file = %relative, size, "Skipping file - exceeds size limit");
            skipped += 1;
            continue;
        }

        let Some(bytes) = read_source(entry.path()) else {
            skipped += 1;
            continue;
        };
        if is_binary(&bytes) {
            trace!(file = %relative, "Skipping binary file");
            skipped += 1;
            continue;
        }
        let Ok(content) = String::from_utf8(bytes) else {
            trace!(file = %relative, "Skipping non UTF-8 file");
            skipped += 1;
            continue;
        };

        files.push(SourceFile::new(relative, language, content));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(files = files.len(), skipped, "Directory scan completed");
    Ok(ScanResult::from_files(files))
}

fn read_source(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Skipping unreadable file");
            None
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, AcquisitionError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| AcquisitionError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| AcquisitionError::InvalidPattern {
        pattern: patterns.join(","),
        message: e.to_string(),
    })
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.') || IGNORED_DIRECTORIES.contains(&s))
            .unwrap_or(false)
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Language name for a file, from its extension or well-known file name.
pub fn detect_language(path: &Path) -> Option<&'static str> {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        match name {
            "Dockerfile" => return Some("Dockerfile"),
            "Makefile" => return Some("Makefile"),
            _ => {}
        }
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".min.js") || lower.ends_with(".min.css") {
            return None;
        }
    }

    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let language = match extension.as_str() {
        "rs" => "Rust",
        "ts" | "tsx" | "mts" | "cts" => "TypeScript",
        "js" | "jsx" | "mjs" | "cjs" => "JavaScript",
        "py" | "pyi" => "Python",
        "go" => "Go",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "scala" => "Scala",
        "rb" => "Ruby",
        "php" => "PHP",
        "cs" => "C#",
        "c" | "h" => "C",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => "C++",
        "swift" => "Swift",
        "m" | "mm" => "Objective-C",
        "dart" => "Dart",
        "ex" | "exs" => "Elixir",
        "erl" | "hrl" => "Erlang",
        "hs" => "Haskell",
        "lua" => "Lua",
        "pl" | "pm" => "Perl",
        "r" => "R",
        "sql" => "SQL",
        "sh" | "bash" | "zsh" => "Shell",
        "ps1" => "PowerShell",
        "vue" => "Vue",
        "svelte" => "Svelte",
        "html" | "htm" => "HTML",
        "css" | "scss" | "sass" | "less" => "CSS",
        "tf" | "hcl" => "HCL",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        "gradle" => "Gradle",
        "proto" => "Protocol Buffers",
        "graphql" | "gql" => "GraphQL",
        _ => return None,
    };
    Some(language)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[rstest]
    #[case("src/main.rs", Some("Rust"))]
    #[case("web/App.TSX", Some("TypeScript"))]
    #[case("scripts/deploy.sh", Some("Shell"))]
    #[case("Dockerfile", Some("Dockerfile"))]
    #[case("static/app.min.js", None)]
    #[case("README.md", None)]
    #[case("LICENSE", None)]
    fn test_detect_language(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(detect_language(Path::new(path)), expected);
    }

    #[test]
    fn test_scan_filters_and_orders_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/lib.rs", b"pub fn a() {}\npub fn b() {}\n");
        write(root, "src/app.py", b"print('hi')\n");
        write(root, "node_modules/pkg/index.js", b"module.exports = 1;\n");
        write(root, ".git/config", b"[core]\n");
        write(root, "src/generated/api.rs", b"// generated\n");
        write(root, "assets/logo.rs", b"\x00\x01\x02");
        write(root, "notes.md", b"# Notes\n");
        write(root, "big.rs", &vec![b'a'; 2048]);

        let result = scan_directory(root, 1024, &["**/generated/**".to_string()]).unwrap();
        let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(paths, vec!["src/app.py", "src/lib.rs"]);
        assert_eq!(result.total_files, 2);
        assert_eq!(result.total_lines, 3);
        assert_eq!(result.languages_by_line_count["Rust"], 2);
        assert_eq!(result.languages_by_line_count["Python"], 1);
    }

    #[test]
    fn test_unreadable_source_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/lib.rs", b"pub fn a() {}\n");

        assert!(read_source(&dir.path().join("src/gone.rs")).is_none());
        assert!(read_source(&dir.path().join("src")).is_none());
        assert!(read_source(&dir.path().join("src/lib.rs")).is_some());
    }

    #[test]
    fn test_scan_rejects_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let err = scan_directory(dir.path(), 1024, &["src/[".to_string()]).unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidPattern { .. }));
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            scan_directory(&missing, 1024, &[]),
            Err(AcquisitionError::MissingPath(_))
        ));
    }
}
