//! Shared helpers for the ferrocopy integration tests and benchmarks
//!
//! Builds source trees with deterministic contents and compares them against
//! copied destinations.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test data generation patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestDataPattern {
    /// All zeros, highly compressible
    Zeros,
    /// Repeating text, compressible
    Text,
    /// Pseudo-random bytes, incompressible
    Random,
}

/// Generate `size` bytes following `pattern`. The same arguments always
/// produce the same bytes.
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Text => b"ferrocopy moves bytes between devices. "
            .iter()
            .copied()
            .cycle()
            .take(size)
            .collect(),
        TestDataPattern::Random => {
            // xorshift64, seeded so benchmarks and tests are reproducible
            let mut state = 0x9E37_79B9_7F4A_7C15u64;
            (0..size)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 24) as u8
                })
                .collect()
        }
    }
}

/// Write a file of `size` bytes at `path`, creating parent directories.
pub fn write_file(path: &Path, size: usize, pattern: TestDataPattern) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, generate_test_data(size, pattern))?;
    Ok(path.to_path_buf())
}

/// Builder for source trees
#[derive(Debug, Default)]
pub struct TreeBuilder {
    files: Vec<(PathBuf, usize, TestDataPattern)>,
    dirs: Vec<PathBuf>,
}

impl TreeBuilder {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file relative to the tree root
    pub fn file(mut self, relative: impl Into<PathBuf>, size: usize, pattern: TestDataPattern) -> Self {
        self.files.push((relative.into(), size, pattern));
        self
    }

    /// Add an empty directory relative to the tree root
    pub fn dir(mut self, relative: impl Into<PathBuf>) -> Self {
        self.dirs.push(relative.into());
        self
    }

    /// Materialize the tree under `root`
    pub fn build(&self, root: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(root)?;
        for dir in &self.dirs {
            fs::create_dir_all(root.join(dir))?;
        }
        for (relative, size, pattern) in &self.files {
            write_file(&root.join(relative), *size, *pattern)?;
        }
        Ok(root.to_path_buf())
    }
}

/// A scratch directory holding a `src` tree and a `dst` path
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create an empty scratch directory
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Scratch root
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Conventional source path
    pub fn source(&self) -> PathBuf {
        self.root().join("src")
    }

    /// Conventional destination path
    pub fn destination(&self) -> PathBuf {
        self.root().join("dst")
    }
}

/// The three-file tree used by most scenarios: an empty file, 1 KiB at the
/// top level and 10 MiB inside one subdirectory.
pub fn standard_tree() -> TreeBuilder {
    TreeBuilder::new()
        .file("empty.bin", 0, TestDataPattern::Zeros)
        .file("small.txt", 1024, TestDataPattern::Text)
        .file("sub/large.bin", 10 * 1024 * 1024, TestDataPattern::Random)
}

/// Relative paths of every regular file under `root`, sorted.
pub fn list_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    collect_files(root, root, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

/// Whether both trees hold the same files with the same bytes.
pub fn trees_equal(left: &Path, right: &Path) -> io::Result<bool> {
    let files = list_files(left)?;
    if files != list_files(right)? {
        return Ok(false);
    }
    for relative in &files {
        if fs::read(left.join(relative))? != fs::read(right.join(relative))? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_data_is_deterministic() {
        for pattern in [TestDataPattern::Zeros, TestDataPattern::Text, TestDataPattern::Random] {
            let a = generate_test_data(4096, pattern);
            assert_eq!(a.len(), 4096);
            assert_eq!(a, generate_test_data(4096, pattern));
        }
        assert!(generate_test_data(0, TestDataPattern::Random).is_empty());
    }

    #[test]
    fn test_tree_roundtrip() {
        let workspace = Workspace::new().unwrap();
        let tree = TreeBuilder::new()
            .file("a.txt", 10, TestDataPattern::Text)
            .file("nested/b.bin", 100, TestDataPattern::Random)
            .dir("empty");
        tree.build(&workspace.source()).unwrap();
        tree.build(&workspace.destination()).unwrap();

        assert_eq!(
            list_files(&workspace.source()).unwrap(),
            vec![PathBuf::from("a.txt"), PathBuf::from("nested/b.bin")]
        );
        assert!(trees_equal(&workspace.source(), &workspace.destination()).unwrap());

        fs::write(workspace.destination().join("a.txt"), b"changed").unwrap();
        assert!(!trees_equal(&workspace.source(), &workspace.destination()).unwrap());
    }
}
