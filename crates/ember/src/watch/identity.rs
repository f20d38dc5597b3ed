use std::fs;
use std::io;
use std::path::Path;

/// Returns whether two paths currently refer to the same file.
///
/// Identity is decided by what the paths resolve to, not how they are
/// spelled, so a symlink and its target compare equal and a file replaced by
/// rename compares equal to the new file. Both paths must exist.
pub fn is_same_file(a: &Path, b: &Path) -> io::Result<bool> {
    if a == b {
        // Still require existence, a vanished file is not a match
        fs::metadata(a)?;
        return Ok(true);
    }
    same_identity(a, b)
}

#[cfg(unix)]
fn same_identity(a: &Path, b: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let (left, right) = (fs::metadata(a)?, fs::metadata(b)?);
    Ok(left.dev() == right.dev() && left.ino() == right.ino())
}

#[cfg(not(unix))]
fn same_identity(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}
