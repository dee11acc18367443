//! HTML input discovery: expand scan globs, drop excluded paths.
//!
//! A bad pattern never aborts the scan. Each failure is recorded in
//! [`Discovery::pattern_errors`] and the remaining patterns still run, so an
//! empty result ("nothing matched") stays distinguishable from a broken scan.

use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A scan or exclude pattern that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub pattern: String,
    pub detail: String,
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pattern, self.detail)
    }
}

/// Result of a discovery scan.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Absolute, deduplicated, lexicographically sorted HTML paths.
    pub files: Vec<PathBuf>,
    pub pattern_errors: Vec<PatternError>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths relative to `root` for display; paths outside `root` are kept as is.
    pub fn relative_listing(&self, root: &Path) -> Vec<PathBuf> {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        self.files
            .iter()
            .map(|f| {
                f.strip_prefix(&root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| f.clone())
            })
            .collect()
    }
}

// Exclude globs behave like shell fnmatch: `*` may cross directory separators.
const EXCLUDE_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Scan `include` globs, dropping anything matched by an `exclude` glob.
pub fn discover(include: &[String], exclude: &[String]) -> Discovery {
    let mut pattern_errors = Vec::new();

    let excludes: Vec<Pattern> = exclude
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!("Ignoring invalid exclude pattern '{}': {}", p, e);
                pattern_errors.push(PatternError {
                    pattern: p.clone(),
                    detail: e.to_string(),
                });
                None
            }
        })
        .collect();

    let mut found = BTreeSet::new();

    for pattern in include {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Error scanning pattern '{}': {}", pattern, e);
                pattern_errors.push(PatternError {
                    pattern: pattern.clone(),
                    detail: e.to_string(),
                });
                continue;
            }
        };

        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    // Unreadable directory below the pattern root; keep going.
                    warn!("Error scanning pattern '{}': {}", pattern, e);
                    pattern_errors.push(PatternError {
                        pattern: pattern.clone(),
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            if !is_html_file(&path) {
                continue;
            }

            let abs = match std::path::absolute(&path) {
                Ok(abs) => abs,
                Err(e) => {
                    warn!("Cannot resolve '{}': {}", path.display(), e);
                    continue;
                }
            };

            if is_excluded(&abs, &excludes) {
                debug!("Excluded {}", abs.display());
                continue;
            }

            found.insert(abs);
        }
    }

    let files: Vec<PathBuf> = found.into_iter().collect();
    if files.is_empty() {
        info!("No HTML files found ({} patterns scanned)", include.len());
    } else {
        info!("Found {} HTML files", files.len());
    }

    Discovery {
        files,
        pattern_errors,
    }
}

fn is_html_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}

fn is_excluded(path: &Path, excludes: &[Pattern]) -> bool {
    excludes
        .iter()
        .any(|pattern| pattern.matches_path_with(path, EXCLUDE_OPTIONS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, "<html></html>").unwrap();
        p
    }

    fn patterns(root: &Path) -> Vec<String> {
        let r = root.display();
        vec![format!("{r}/*.html"), format!("{r}/**/*.html")]
    }

    #[test]
    fn overlapping_patterns_are_deduplicated_and_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.html");
        touch(dir.path(), "a.html");
        touch(dir.path(), "sub/c.html");
        touch(dir.path(), "notes.txt");

        let d = discover(&patterns(dir.path()), &[]);
        let names: Vec<_> = d
            .relative_listing(dir.path())
            .into_iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.html", "b.html", "sub/c.html"]);
        assert!(d.pattern_errors.is_empty());
        assert!(d.files.iter().all(|f| f.is_absolute()));
    }

    #[test]
    fn repeated_scans_are_identical() {
        let dir = TempDir::new().unwrap();
        for name in ["z.html", "m/x.html", "a/b/c.html"] {
            touch(dir.path(), name);
        }
        let first = discover(&patterns(dir.path()), &[]);
        let second = discover(&patterns(dir.path()), &[]);
        assert_eq!(first.files, second.files);
    }

    #[test]
    fn exclude_wins_over_include() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "keep.html");
        touch(dir.path(), "node_modules/pkg/readme.html");
        touch(dir.path(), "output/old.html");

        let excludes = vec!["**/node_modules/**".to_string(), "**/output/**".to_string()];
        let d = discover(&patterns(dir.path()), &excludes);
        assert_eq!(d.files.len(), 1);
        assert!(d.files[0].ends_with("keep.html"));
    }

    #[test]
    fn empty_tree_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let d = discover(&patterns(dir.path()), &[]);
        assert!(d.is_empty());
        assert!(d.pattern_errors.is_empty());
    }

    #[test]
    fn bad_pattern_is_reported_and_others_still_scan() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "report.html");

        let mut include = vec!["[unclosed".to_string()];
        include.extend(patterns(dir.path()));
        let d = discover(&include, &["***bad".to_string()]);

        assert_eq!(d.files.len(), 1);
        assert_eq!(d.pattern_errors.len(), 2);
        assert_eq!(d.pattern_errors[0].pattern, "***bad");
        assert_eq!(d.pattern_errors[1].pattern, "[unclosed");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "UPPER.HTML");
        let d = discover(&[format!("{}/*", dir.path().display())], &[]);
        assert_eq!(d.files.len(), 1);
    }
}
