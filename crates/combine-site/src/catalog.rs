//! Content discovery by filesystem walking.
//!
//! Each content root is walked depth-first: the files of a directory come
//! first (sorted by name), then its subdirectories in name order. Symlinked
//! files and directories are followed; a directory already visited through
//! another link is skipped, so symlink loops terminate.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::file::File;

/// Error returned when a content root cannot be loaded.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Configured content root does not exist.
    #[error("Content path does not exist: {}", .0.display())]
    RootNotFound(PathBuf),
    /// Content root exists but cannot be listed.
    #[error("Cannot read content path {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One content root and the files found under it.
#[derive(Debug)]
pub struct ContentDirectory {
    path: PathBuf,
    files: Vec<File>,
}

impl ContentDirectory {
    /// Walk `path` and collect its files.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.is_dir() {
            return Err(CatalogError::RootNotFound(path.to_path_buf()));
        }

        let mut files = Vec::new();
        let mut visited = HashSet::new();
        walk(path, path, &mut visited, &mut files).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(root = %path.display(), files = files.len(), "Scanned content directory");
        Ok(Self {
            path: path.to_path_buf(),
            files,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }
}

/// Ordered content roots, highest precedence first.
#[derive(Debug, Default)]
pub struct Catalog {
    directories: Vec<ContentDirectory>,
}

impl Catalog {
    /// Load every root in order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::RootNotFound`] for the first root that is missing.
    pub fn load(roots: &[PathBuf]) -> Result<Self, CatalogError> {
        let directories = roots
            .iter()
            .map(|root| ContentDirectory::load(root))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { directories })
    }

    pub fn directories(&self) -> &[ContentDirectory] {
        &self.directories
    }

    /// All files in catalog order: root order, then walk order.
    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.directories.iter().flat_map(|d| d.files.iter())
    }

    pub fn len(&self) -> usize {
        self.directories.iter().map(|d| d.files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map an absolute path to a path relative to the first root containing it.
    pub fn content_relative_path(&self, path: &Path) -> Option<String> {
        self.directories.iter().find_map(|d| {
            let relative = path.strip_prefix(&d.path).ok()?;
            let segments: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect();
            Some(segments.join("/"))
        })
    }
}

fn walk(
    root: &Path,
    dir: &Path,
    visited: &mut HashSet<PathBuf>,
    files: &mut Vec<File>,
) -> std::io::Result<()> {
    let canonical = fs::canonicalize(dir)?;
    if !visited.insert(canonical) {
        tracing::debug!(dir = %dir.display(), "Skipping already visited directory");
        return Ok(());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    entries.sort();

    // fs::metadata follows symlinks
    let (dirs, regular): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .filter_map(|p| fs::metadata(&p).ok().map(|m| (p, m)))
        .partition(|(_, m)| m.is_dir());

    files.extend(
        regular
            .into_iter()
            .filter(|(_, m)| m.is_file())
            .map(|(p, _)| File::new(root, p)),
    );

    for (subdir, _) in dirs {
        if let Err(e) = walk(root, &subdir, visited, files) {
            tracing::warn!(dir = %subdir.display(), error = %e, "Failed to scan directory");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn relative_paths(catalog: &Catalog) -> Vec<&str> {
        catalog.files().map(File::content_relative_path).collect()
    }

    #[test]
    fn test_walk_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("a/nested")).unwrap();
        fs::write(root.join("z.html"), "").unwrap();
        fs::write(root.join("index.html"), "").unwrap();
        fs::write(root.join("a/page.md"), "").unwrap();
        fs::write(root.join("a/nested/deep.txt"), "").unwrap();
        fs::write(root.join("b/style.css"), "").unwrap();

        let catalog = Catalog::load(&[root.to_path_buf()]).unwrap();
        assert_eq!(
            relative_paths(&catalog),
            ["index.html", "z.html", "a/page.md", "a/nested/deep.txt", "b/style.css"]
        );
    }

    #[test]
    fn test_roots_in_order() {
        let site = tempfile::tempdir().unwrap();
        let content = site.path().join("content");
        let theme = site.path().join("theme");
        fs::create_dir_all(&content).unwrap();
        fs::create_dir_all(&theme).unwrap();
        fs::write(content.join("index.html"), "").unwrap();
        fs::write(theme.join("base.template.html"), "").unwrap();
        fs::write(theme.join("index.html"), "").unwrap();

        let catalog = Catalog::load(&[content, theme.clone()]).unwrap();
        assert_eq!(
            relative_paths(&catalog),
            ["index.html", "base.template.html", "index.html"]
        );
        assert_eq!(catalog.directories()[1].path(), theme);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_missing_root() {
        let err = Catalog::load(&[PathBuf::from("/nonexistent/content")]).unwrap_err();
        assert!(matches!(err, CatalogError::RootNotFound(_)));
    }

    #[test]
    fn test_content_relative_path() {
        let site = tempfile::tempdir().unwrap();
        let content = site.path().join("content");
        fs::create_dir_all(content.join("docs")).unwrap();

        let catalog = Catalog::load(&[content.clone()]).unwrap();
        assert_eq!(
            catalog.content_relative_path(&content.join("docs/intro.md")).as_deref(),
            Some("docs/intro.md")
        );
        assert_eq!(catalog.content_relative_path(&site.path().join("combine.yml")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_follows_symlinks_without_looping() {
        let site = tempfile::tempdir().unwrap();
        let content = site.path().join("content");
        let shared = site.path().join("shared");
        fs::create_dir_all(&content).unwrap();
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("logo.svg"), "").unwrap();
        std::os::unix::fs::symlink(&shared, content.join("assets")).unwrap();
        std::os::unix::fs::symlink(&content, content.join("loop")).unwrap();

        let catalog = Catalog::load(&[content]).unwrap();
        assert_eq!(relative_paths(&catalog), ["assets/logo.svg"]);
    }
}
