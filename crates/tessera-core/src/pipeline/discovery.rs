//! Finding source images when a directory is given as input.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::InputConfig;

/// Discovers image files in directories.
pub struct FileDiscovery {
    config: InputConfig,
}

impl FileDiscovery {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// Supported image files at `path`, sorted by path.
    ///
    /// A file path is returned as-is when its extension is supported. A
    /// directory is walked recursively. Previously written `*_result.*`
    /// outputs are skipped so rerunning over a folder does not re-tile them.
    pub fn discover(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_file() {
            return if self.is_supported(path) {
                vec![path.to_path_buf()]
            } else {
                vec![]
            };
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.is_supported(p) && !is_result_file(p))
            .collect();

        files.sort();
        files
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Default output name for a source: `board.jpg` -> `board_result.png`.
pub fn result_path_for(source: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tessera");
    let name = format!("{stem}_result.png");
    match out_dir {
        Some(dir) => dir.join(name),
        None => source.with_file_name(name),
    }
}

fn is_result_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with("_result"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        let discovery = FileDiscovery::new(InputConfig::default());

        assert!(discovery.is_supported(Path::new("board.jpg")));
        assert!(discovery.is_supported(Path::new("board.JPG")));
        assert!(discovery.is_supported(Path::new("board.png")));
        assert!(discovery.is_supported(Path::new("board.tiff")));
        assert!(!discovery.is_supported(Path::new("notes.txt")));
        assert!(!discovery.is_supported(Path::new("no_extension")));
    }

    #[test]
    fn test_discover_directory_sorted_and_skips_results() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.png", "a.jpg", "a_result.png", "readme.md", "nested/c.bmp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = FileDiscovery::new(InputConfig::default()).discover(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "nested/c.bmp"]);
    }

    #[test]
    fn test_result_path_for() {
        assert_eq!(
            result_path_for(Path::new("/scans/board.jpg"), None),
            PathBuf::from("/scans/board_result.png")
        );
        assert_eq!(
            result_path_for(Path::new("/scans/board.jpg"), Some(Path::new("/out"))),
            PathBuf::from("/out/board_result.png")
        );
    }
}
