/// Physical file moves into the target and error trees.
///
/// The engine decides where a file goes; a [`Relocator`] makes it so. The
/// filesystem implementation creates missing destination directories and
/// never overwrites: a taken name gets a ` (N)` suffix before the extension.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Highest ` (N)` suffix tried before giving up on a destination.
const MAX_COLLISION_SUFFIX: u32 = 999;

/// Errors that can occur while moving a file.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// The file to move is not there any more.
    #[error("Source file {} does not exist", .0.display())]
    SourceMissing(PathBuf),
    /// Failed to create the destination directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to move the file into place.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Every candidate name in the destination is taken.
    #[error("No free file name for {}", .0.display())]
    NoFreeName(PathBuf),
}

/// Moves a file into a destination folder under a given name.
pub trait Relocator: Send + Sync {
    /// Moves `source` to `folder/filename` and returns the final path, which
    /// differs from `folder/filename` when the name was already taken.
    fn relocate(&self, source: &Path, folder: &Path, filename: &str)
    -> Result<PathBuf, RelocateError>;
}

/// Moves files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRelocator;

impl Relocator for FsRelocator {
    /// # Examples
    ///
    /// ```no_run
    /// use tvsort::relocate::{FsRelocator, Relocator};
    /// use std::path::Path;
    ///
    /// let moved = FsRelocator.relocate(
    ///     Path::new("/incoming/show.E01.230101.720p-NEXT.mp4"),
    ///     Path::new("/tv/show"),
    ///     "show.E01.230101.720p-NEXT.mp4",
    /// );
    ///
    /// match moved {
    ///     Ok(path) => println!("Moved to {}", path.display()),
    ///     Err(e) => eprintln!("Move failed: {}", e),
    /// }
    /// ```
    fn relocate(
        &self,
        source: &Path,
        folder: &Path,
        filename: &str,
    ) -> Result<PathBuf, RelocateError> {
        if !source.is_file() {
            return Err(RelocateError::SourceMissing(source.to_path_buf()));
        }

        fs::create_dir_all(folder).map_err(|e| RelocateError::DirectoryCreationFailed {
            path: folder.to_path_buf(),
            source: e,
        })?;

        let wanted = folder.join(filename);
        if wanted == source {
            return Ok(wanted);
        }
        let destination = free_destination(&wanted)?;

        move_file(source, &destination).map_err(|e| RelocateError::FileMoveFailure {
            from: source.to_path_buf(),
            to: destination.clone(),
            source: e,
        })?;
        debug!(from = %source.display(), to = %destination.display(), "moved file");

        Ok(destination)
    }
}

/// Returns `wanted` if it is free, else the first free ` (N)` variant.
fn free_destination(wanted: &Path) -> Result<PathBuf, RelocateError> {
    if !wanted.exists() {
        return Ok(wanted.to_path_buf());
    }

    let stem = wanted
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = wanted
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..=MAX_COLLISION_SUFFIX)
        .map(|n| wanted.with_file_name(format!("{stem} ({n}){ext}")))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| RelocateError::NoFreeName(wanted.to_path_buf()))
}

/// Renames, falling back to copy and remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(error = %e, "rename crosses devices, falling back to copy");
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
