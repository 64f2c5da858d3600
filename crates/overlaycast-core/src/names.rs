// ABOUTME: File name checks for names that arrive from HTTP requests.
// ABOUTME: Ensures a request-supplied name can only address an entry directly inside a directory.

use std::path::{Component, Path};

/// True when `name` is exactly one normal path component, so joining it onto
/// a directory can never escape that directory.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
