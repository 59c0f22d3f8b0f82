//! Filesystem helpers shared by both stages.

use std::io::Write;
use std::path::Path;

/// Write `contents` to `destination` so that the destination is either
/// absent or complete.
///
/// Bytes go to a hidden temporary file in the destination directory, which
/// is renamed into place only after a successful flush. Parent directories
/// are created as needed.
pub fn write_atomic(destination: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

/// Hidden or in-progress files are never treated as stage inputs.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a/b/c.bin");
        write_atomic(&dest, b"payload").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.jpg");
        write_atomic(&dest, b"one").unwrap();
        write_atomic(&dest, b"two").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("file.jpg")]);
        assert_eq!(std::fs::read(&dest).unwrap(), b"two");
    }

    #[test]
    fn test_write_atomic_failure_leaves_destination_absent() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a parent directory is expected.
        std::fs::write(dir.path().join("blocker"), b"x").unwrap();
        let dest = dir.path().join("blocker/child.jpg");
        assert!(write_atomic(&dest, b"data").is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new("dir/.partial-abc")));
        assert!(!is_hidden(Path::new("dir/42-abc.jpg")));
    }
}
