//! Filesystem watch loop.
//!
//! A notify watcher feeds change events into a channel. A dedicated thread
//! takes them one at a time and runs the full decision and rebuild for each
//! before accepting the next, so events arriving during a build queue up.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use combine_site::Site;
use notify::{RecursiveMode, Watcher};

use crate::decision::{ChangeHandler, Handled};
use crate::event::ChangeEvent;

/// Error returned when watching cannot start.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to watch {}: {source}", .path.display())]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("Failed to create watcher: {0}")]
    Create(#[source] notify::Error),
    #[error("Failed to start watch thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// Handle to stop watching.
///
/// Dropping the handle signals the watch thread to exit once the event in
/// progress, if any, is fully handled.
pub struct WatchHandle {
    _shutdown: mpsc::Sender<()>,
}

/// Watch the site's project directory and content roots.
///
/// `on_change` is called on the watch thread after every event has been
/// handled, including ignored ones.
pub fn watch<F>(site: Arc<Site>, mut on_change: F) -> Result<WatchHandle, WatchError>
where
    F: FnMut(&ChangeEvent, &Handled) + Send + 'static,
{
    let (event_tx, event_rx) = mpsc::channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        match res {
            Ok(event) => {
                for change in ChangeEvent::from_notify(&event) {
                    // receiver gone means the watch thread has exited
                    let _ = event_tx.send(change);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Filesystem watch error"),
        }
    })
    .map_err(WatchError::Create)?;

    for path in watch_roots(&site) {
        watcher
            .watch(&path, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Notify {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), "Watching for changes");
    }

    let mut handler = ChangeHandler::new(site);
    std::thread::Builder::new()
        .name("combine-watch".to_owned())
        .spawn(move || {
            let _watcher = watcher;

            loop {
                match shutdown_rx.try_recv() {
                    Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
                    Err(mpsc::TryRecvError::Empty) => {}
                }

                match event_rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(event) => {
                        let handled = handler.handle(&event);
                        on_change(&event, &handled);
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("Watch thread stopped");
        })
        .map_err(WatchError::Thread)?;

    Ok(WatchHandle {
        _shutdown: shutdown_tx,
    })
}

/// The project directory plus content roots outside it.
fn watch_roots(site: &Site) -> Vec<PathBuf> {
    let state = site.state();
    let config = state.config();
    let project_dir = config.project_dir.clone();

    let mut roots = vec![project_dir.clone()];
    roots.extend(
        config
            .content_paths
            .iter()
            .filter(|p| !p.starts_with(&project_dir))
            .cloned(),
    );
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use combine_config::CliSettings;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Instant;

    static_assertions::assert_impl_all!(WatchHandle: Send);

    #[test]
    fn test_watch_roots_include_external_content() {
        let project = tempfile::tempdir().unwrap();
        let external = tempfile::tempdir().unwrap();
        fs::create_dir(project.path().join("content")).unwrap();
        fs::write(
            project.path().join("combine.yml"),
            format!(
                "content_paths: [content, {}]\n",
                external.path().display()
            ),
        )
        .unwrap();

        let site = Site::load(&project.path().join("combine.yml"), CliSettings::default()).unwrap();
        assert_eq!(
            watch_roots(&site),
            [project.path().to_path_buf(), external.path().to_path_buf()]
        );
    }

    #[test]
    fn test_watch_rebuilds_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir(dir_path.join("content")).unwrap();
        fs::write(dir_path.join("content/index.html"), "one").unwrap();
        fs::write(dir_path.join("combine.yml"), "").unwrap();

        let site = Arc::new(Site::load(&dir_path.join("combine.yml"), CliSettings::default()).unwrap());
        site.build(&std::collections::HashSet::new()).unwrap();

        let (tx, rx) = mpsc::channel();
        let _handle = watch(Arc::clone(&site), move |_, handled| {
            if handled.build.is_some() {
                let _ = tx.send(());
            }
        })
        .unwrap();

        // let the platform watcher settle before writing
        std::thread::sleep(Duration::from_millis(200));
        fs::write(dir_path.join("content/index.html"), "two").unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let output = dir_path.join("output/index.html");
        while Instant::now() < deadline {
            if rx.recv_timeout(Duration::from_millis(100)).is_ok()
                && fs::read_to_string(&output).unwrap() == "two"
            {
                return;
            }
        }
        panic!("output was not rebuilt");
    }
}
