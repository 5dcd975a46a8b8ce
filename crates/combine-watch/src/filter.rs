//! Paths the watcher never acts on.

use std::ffi::OsStr;
use std::path::{Component, Path};

use combine_config::Config;

/// Directory names whose contents are never site sources.
const NOISE_DIRS: &[&str] = &["node_modules", ".cache", ".venv", "env", ".git"];

/// Extensions of files still being written by another program.
const TRANSIENT_EXTENSIONS: &[&str] = &["crdownload", "part", "download", "swp", "swx", "tmp"];

/// Output extensions a browser can pick up without a page rebuild.
const ASSET_EXTENSIONS: &[&str] = &["css", "js"];

/// How a changed path is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathClass {
    /// A candidate source change.
    Source,
    /// A stylesheet or script written into the output directory.
    OutputAsset,
    /// Noise.
    Ignored,
}

/// Classify `path` against the current configuration.
pub fn classify(path: &Path, config: &Config) -> PathClass {
    if path.starts_with(&config.output_path) {
        return if has_extension(path, ASSET_EXTENSIONS) {
            PathClass::OutputAsset
        } else {
            PathClass::Ignored
        };
    }

    let relative = path.strip_prefix(&config.project_dir).unwrap_or(path);
    let in_noise_dir = relative.components().any(|component| match component {
        Component::Normal(name) => NOISE_DIRS.iter().any(|dir| name == OsStr::new(dir)),
        _ => false,
    });
    if in_noise_dir || is_transient(path) {
        return PathClass::Ignored;
    }

    PathClass::Source
}

fn is_transient(path: &Path) -> bool {
    let backup = path
        .file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.ends_with('~'));
    backup || has_extension(path, TRANSIENT_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::default_with_base(Path::new("/site"))
    }

    #[test]
    fn test_output_dir() {
        let config = config();
        assert_eq!(
            classify(Path::new("/site/output/about/index.html"), &config),
            PathClass::Ignored
        );
        assert_eq!(
            classify(Path::new("/site/output/assets/site.css"), &config),
            PathClass::OutputAsset
        );
        assert_eq!(
            classify(Path::new("/site/output/app.js"), &config),
            PathClass::OutputAsset
        );
    }

    #[test]
    fn test_noise_dirs() {
        let config = config();
        for path in [
            "/site/node_modules/pkg/index.js",
            "/site/.git/index",
            "/site/.venv/lib/x.py",
            "/site/content/.cache/x.html",
            "/site/env/bin/python",
        ] {
            assert_eq!(classify(Path::new(path), &config), PathClass::Ignored, "{path}");
        }
    }

    #[test]
    fn test_noise_dir_above_project_not_matched() {
        let config = Config::default_with_base(Path::new("/home/env/site"));
        assert_eq!(
            classify(Path::new("/home/env/site/content/index.html"), &config),
            PathClass::Source
        );
    }

    #[test]
    fn test_transient_files() {
        let config = config();
        for path in [
            "/site/content/photo.jpg.crdownload",
            "/site/content/video.mp4.part",
            "/site/content/.index.html.swp",
            "/site/content/index.html~",
        ] {
            assert_eq!(classify(Path::new(path), &config), PathClass::Ignored, "{path}");
        }
    }

    #[test]
    fn test_sources() {
        let config = config();
        assert_eq!(
            classify(Path::new("/site/content/index.html"), &config),
            PathClass::Source
        );
        assert_eq!(classify(Path::new("/site/combine.yml"), &config), PathClass::Source);
        assert_eq!(
            classify(Path::new("/site/theme/src/app.css"), &config),
            PathClass::Source
        );
    }
}
