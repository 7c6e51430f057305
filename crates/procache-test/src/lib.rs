//! Helpers for testing the caches, the content loader and the web server.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test. Watchers registered on a dropped directory stop reporting
//!    changes silently. To avoid this, assign it to a variable in the test function
//!    (e.g. `let content_dir = test::tempdir()`).
//!
//!  - Fixtures under `tests/fixtures` are shared between all crates. Tests that modify content
//!    must work on a copy, see [`copy_fixture`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `procache` crates and mutes all
///    other logs (such as the watcher backends).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new(
            "procache=trace,procache_content=trace,procache_server=trace",
        ))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped, unless
/// [`keep`](TempDir::keep) is called. Use it as a guard to automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Returns the absolute path to the given fixture.
///
/// Fixtures are located in the `tests/fixtures` directory, located from the workspace root.
/// Fixtures can be either files, or directories.
///
/// # Panics
///
/// Panics if the fixture path does not exist on the file system.
pub fn fixture(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let mut full_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    full_path.pop(); // to /crates/
    full_path.pop(); // to /
    full_path.push("tests/fixtures/");
    full_path.push(path);

    assert!(full_path.exists(), "'{}' does not exist", path.display());

    full_path
}

/// Recursively copies the fixture directory `path` into `dest`.
///
/// # Panics
///
/// Panics if the fixture does not exist or copying fails.
pub fn copy_fixture(path: impl AsRef<Path>, dest: &Path) {
    copy_dir(&fixture(path), dest);
}

fn copy_dir(src: &Path, dest: &Path) {
    fs::create_dir_all(dest).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dest.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// Writes `contents` to the file at `path` below `dir`, creating parent directories as needed.
///
/// Returns the full path of the written file.
pub fn write_file(dir: &Path, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> PathBuf {
    let full_path = dir.join(path);
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&full_path, contents).unwrap();
    full_path
}
