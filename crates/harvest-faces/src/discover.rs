//! Locating source images for the face stage.

use harvest_core::{is_hidden, CaseType};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Source suffixes the stage picks up (case-insensitive).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Every image under `root`, recursively, in sorted order.
///
/// Hidden entries and the directories in `skip` are not descended into.
/// Symlinked directories are not followed. Unreadable entries are logged and
/// skipped; only a missing `root` is an error.
pub fn collect_images(root: &Path, skip: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }
    let skip: Vec<PathBuf> = skip
        .iter()
        .filter_map(|dir| std::fs::canonicalize(dir).ok())
        .collect();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        if is_hidden(entry.path()) {
            return false;
        }
        if skip.is_empty() || !entry.file_type().is_dir() {
            return true;
        }
        !std::fs::canonicalize(entry.path()).is_ok_and(|dir| skip.contains(&dir))
    });

    let mut images = image_entries(walker);
    images.sort();
    Ok(images)
}

/// Downloaded images for one case type: `{root}/{type}/files/*/*.{ext}`,
/// minus paths matching the type's exclusions. A missing files directory
/// yields an empty list.
pub fn case_type_images(output_root: &Path, case_type: &CaseType) -> Vec<PathBuf> {
    let files_dir = output_root.join(&case_type.name).join("files");
    if !files_dir.is_dir() {
        tracing::debug!(dir = %files_dir.display(), "no downloaded files");
        return Vec::new();
    }

    let walker = WalkDir::new(&files_dir)
        .max_depth(2)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()))
        .filter(|entry| entry.as_ref().map_or(true, |e| e.depth() == 2));

    let mut images = image_entries(walker);
    images.retain(|p| !case_type.is_excluded(&p.to_string_lossy()));
    images.sort();
    images
}

fn image_entries(walker: impl Iterator<Item = walkdir::Result<DirEntry>>) -> Vec<PathBuf> {
    walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.path().is_file() && is_image(entry.path()))
        .map(DirEntry::into_path)
        .collect()
}
