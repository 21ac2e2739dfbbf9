//! Capability-based filesystem helpers shared by the covwatch crates.
//!
//! Every helper resolves an ambient directory for the parent of the target
//! path and then operates relative to it, so callers never touch `std::fs`
//! directly.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io::{self, Read, Write};
use std::path::Component;
use std::time::SystemTime;

/// Size and modification time of a regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFacts {
    /// Length in bytes.
    pub len: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
}

/// Open a UTF-8 file path using ambient authority.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Read the whole file at `path` into memory.
pub fn read_bytes(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let mut file = open_utf8_file(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Report size and modification time for the file at `path`.
pub fn file_facts(path: &Utf8Path) -> io::Result<FileFacts> {
    let (dir, name) = open_dir_and_file(path)?;
    let metadata = dir.metadata(name.as_str())?;
    Ok(FileFacts {
        len: metadata.len(),
        modified: metadata.modified().ok().map(|time| time.into_std()),
    })
}

/// Replace the contents of `path` with `bytes`, creating parent directories.
///
/// The payload is written to a sibling temporary file first and renamed into
/// place so readers never observe a half-written file.
pub fn write_bytes(path: &Utf8Path, bytes: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    let staging = format!(".{name}.tmp");
    {
        let mut file = dir.create(staging.as_str())?;
        file.write_all(bytes)?;
        file.flush()?;
    }
    dir.rename(staging.as_str(), &dir, name.as_str())
}

/// Remove the file at `path`, treating a missing file as success.
pub fn remove_if_exists(path: &Utf8Path) -> io::Result<()> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    match dir.remove_file(name.as_str()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Total size in bytes of the regular files directly inside `dir`.
///
/// A missing directory counts as empty.
pub fn dir_usage(dir: &Utf8Path) -> io::Result<u64> {
    let handle = match fs_utf8::Dir::open_ambient_dir(dir, ambient_authority()) {
        Ok(handle) => handle,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };
    let mut total = 0;
    for entry in handle.entries()? {
        let metadata = entry?.metadata()?;
        if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}

/// Resolve an ambient directory for the given path and return the directory with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Ensure the parent directory for `path` exists, handling absolute paths safely for cap-std.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    ensure_dir(parent)
}

/// Create `dir` and any missing ancestors.
pub fn ensure_dir(dir: &Utf8Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() || dir == Utf8Path::new("/") {
        return Ok(());
    }

    let (base_dir, relative) = base_dir_and_relative(dir)?;
    if relative.as_os_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

/// Return whether a path exists and is a regular file using capability-based IO.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name.as_str()).map(|meta| meta.is_file())
}

/// Split an absolute or relative path into an ambient base directory and a relative suffix.
pub fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();

    let (base, relative) = match std_parent.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;

            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_parent.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from parent path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_parent
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_parent.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative = Utf8PathBuf::from_path_buf(relative)
        .map_err(|_| io::Error::other("non-UTF-8 parent path"))?;

    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn workspace() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        (dir, root)
    }

    #[rstest]
    fn write_then_read_creates_nested_directories(workspace: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workspace;
        let target = root.join("nested/deeper/value.json");

        write_bytes(&target, b"{\"a\":1}").expect("write nested file");

        assert_eq!(read_bytes(&target).expect("read back"), b"{\"a\":1}");
        assert!(file_is_file(&target).expect("inspect file"));
        assert_eq!(file_facts(&target).expect("stat file").len, 7);
    }

    #[rstest]
    fn write_replaces_existing_contents(workspace: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workspace;
        let target = root.join("value.json");

        write_bytes(&target, b"first payload").expect("first write");
        write_bytes(&target, b"second").expect("second write");

        assert_eq!(read_bytes(&target).expect("read back"), b"second");
    }

    #[rstest]
    fn removing_missing_file_is_not_an_error(workspace: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workspace;
        remove_if_exists(&root.join("absent.json")).expect("missing file is fine");
        remove_if_exists(&root.join("absent-dir/absent.json")).expect("missing dir is fine");
    }

    #[rstest]
    fn dir_usage_sums_regular_files(workspace: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = workspace;
        let store = root.join("mirror");
        assert_eq!(dir_usage(&store).expect("missing dir"), 0);

        write_bytes(&store.join("a.json"), b"1234").expect("write a");
        write_bytes(&store.join("b.json"), b"56").expect("write b");
        ensure_dir(&store.join("sub")).expect("create sub dir");

        assert_eq!(dir_usage(&store).expect("usage"), 6);
    }
}
