use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Files above this size are skipped
const MAX_FILE_SIZE_BYTES: u64 = 32 * 1024 * 1024;

/// Finds input documents with one extension under a directory (.gitignore aware)
pub struct FileScanner {
    root: PathBuf,
    extension: &'static str,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, extension: &'static str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension,
        }
    }

    /// Matching files in sorted order, so runs are reproducible
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true);

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !self.matches(path) {
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > MAX_FILE_SIZE_BYTES {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                MAX_FILE_SIZE_BYTES
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::debug!(
            "Found {} .{} files in {}",
            files.len(),
            self.extension,
            self.root.display()
        );
        files
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension))
    }
}
