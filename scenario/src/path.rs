//! Scenario path helpers: `/`-separated node names addressed from the root.

/// Joins `rel` onto `base` and normalizes the result. An absolute `rel`
/// replaces `base` entirely.
pub fn join(base: &str, rel: &str) -> String {
    if rel.starts_with('/') {
        normalize(rel)
    } else {
        normalize(&format!("{base}/{rel}"))
    }
}

/// Collapses `.` and `..` segments; `..` above the root clamps to the root.
/// The result always starts with '/'.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Path one segment above `path`; the root's parent is the root itself.
pub fn parent(path: &str) -> String {
    join(path, "..")
}
