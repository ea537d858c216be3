//! Path normalisation for the virtual filesystem.

/// The normalised form of the root directory.
pub const ROOT: &str = ".";

/// Normalise a VFS path.
///
/// Backslashes become `/`, empty and `.` segments are dropped, and leading or
/// trailing slashes go away. The root (and the empty path) is `.`.
pub fn normalize_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let segments: Vec<&str> = replaced
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    if segments.is_empty() {
        ROOT.to_string()
    } else {
        segments.join("/")
    }
}

/// Proper ancestors of a normalised path, nearest last, excluding the root.
pub(crate) fn ancestors(path: &str) -> Vec<&str> {
    if path == ROOT {
        return Vec::new();
    }
    path.match_indices('/').map(|(i, _)| &path[..i]).collect()
}
