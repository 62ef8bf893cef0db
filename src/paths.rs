//! Path normalization and decomposition.
//!
//! Scans may run on different platforms against the same catalog, so the
//! same folder can arrive as `C:\Users\me\Docs` or `/Users/me/Docs`. This
//! module turns any of those spellings into one canonical form and splits
//! paths into their containing folder, leaf name and ancestor chain.
//!
//! All functions are pure string operations. They never touch the
//! filesystem and accept both `/` and `\` separators.
//!
//! # Canonical form
//!
//! [`normalize`] produces a string that:
//!
//! - is in Unicode NFC (macOS reports NFD names)
//! - uses `/` as the only separator
//! - has no drive prefix (`C:`)
//! - starts with exactly one `/`
//! - contains no empty segments
//! - has no trailing `/` unless it is the root itself
//!
//! # Example
//!
//! ```
//! use dupecat::paths::{folder_of, normalize};
//!
//! let windows = folder_of(r"C:\Users\me\Docs\f.txt");
//! let unix = folder_of("/Users/me/Docs/f.txt");
//!
//! assert_eq!(normalize(&windows), "/Users/me/Docs");
//! assert_eq!(normalize(&windows), normalize(&unix));
//! ```

use unicode_normalization::UnicodeNormalization;

/// Name given to root folders, which have no leaf segment of their own.
pub const ROOT_NAME: &str = "Root";

/// Canonical separator used by [`normalize`].
pub const SEPARATOR: char = '/';

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// `true` for a bare drive designator such as `C:`.
fn is_drive(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn strip_drive_prefix(s: &str) -> &str {
    match s.get(..2) {
        Some(prefix) if is_drive(prefix) => &s[2..],
        _ => s,
    }
}

/// Convert a path in any separator style into its canonical form.
///
/// The conversion is total and idempotent:
/// `normalize(&normalize(p)) == normalize(p)` for every input.
///
/// # Example
///
/// ```
/// use dupecat::paths::normalize;
///
/// assert_eq!(normalize(r"C:\Users\\me\Docs\"), "/Users/me/Docs");
/// assert_eq!(normalize("//srv///share/"), "/srv/share");
/// assert_eq!(normalize(""), "/");
/// assert_eq!(normalize("C:"), "/");
/// ```
#[must_use]
pub fn normalize(path: &str) -> String {
    let composed: String = path.nfc().collect();
    let unified = composed.replace('\\', "/");
    let rest = strip_drive_prefix(&unified);

    let mut out = String::with_capacity(rest.len() + 1);
    for segment in rest.split(SEPARATOR).filter(|s| !s.is_empty()) {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

/// Strip trailing separators without destroying a root.
///
/// `/a/b//` becomes `/a/b`, while `/`, `\\` and `C:\` keep exactly one
/// separator because they denote a root.
#[must_use]
pub fn trim_trailing_separators(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    if trimmed.len() == path.len() {
        return path;
    }
    if trimmed.is_empty() || is_drive(trimmed) {
        // Keep the first separator after the (possibly empty) drive.
        return &path[..trimmed.len() + 1];
    }
    trimmed
}

/// `true` if the path denotes a root: empty, `/`, `\`, `C:` or `C:\`.
#[must_use]
pub fn is_root(path: &str) -> bool {
    let trimmed = trim_trailing_separators(path);
    if trimmed.is_empty() || is_drive(trimmed) {
        return true;
    }
    if trimmed.len() == 1 {
        return trimmed.chars().all(is_separator);
    }
    trimmed.len() == 3
        && trimmed.get(..2).is_some_and(is_drive)
        && trimmed[2..].chars().all(is_separator)
}

/// Return the folder that contains `path`, in the input's own style.
///
/// Roots and bare names (no separator at all) have no containing folder
/// and yield an empty string. A file directly under a root yields that
/// root including its separator, matching what the platform reports as
/// the parent directory.
///
/// # Example
///
/// ```
/// use dupecat::paths::folder_of;
///
/// assert_eq!(folder_of("/a/b/c.txt"), "/a/b");
/// assert_eq!(folder_of(r"C:\a\b.txt"), r"C:\a");
/// assert_eq!(folder_of(r"C:\b.txt"), r"C:\");
/// assert_eq!(folder_of("/c.txt"), "/");
/// assert_eq!(folder_of("c.txt"), "");
/// assert_eq!(folder_of(r"C:\"), "");
/// ```
#[must_use]
pub fn folder_of(path: &str) -> String {
    if is_root(path) {
        return String::new();
    }
    let trimmed = trim_trailing_separators(path);

    let Some(idx) = trimmed.rfind(is_separator) else {
        return String::new();
    };

    let parent = &trimmed[..idx];
    if parent.is_empty() || is_drive(parent) {
        // The separator at `idx` belongs to the root.
        return trimmed[..=idx].to_string();
    }

    trim_trailing_separators(parent).to_string()
}

/// Last segment of a folder path, or [`ROOT_NAME`] for a root.
///
/// # Example
///
/// ```
/// use dupecat::paths::leaf_name;
///
/// assert_eq!(leaf_name("/Users/me/Docs/"), "Docs");
/// assert_eq!(leaf_name(r"C:\Users"), "Users");
/// assert_eq!(leaf_name("/"), "Root");
/// assert_eq!(leaf_name(""), "Root");
/// ```
#[must_use]
pub fn leaf_name(folder_path: &str) -> String {
    if is_root(folder_path) {
        return ROOT_NAME.to_string();
    }
    let trimmed = trim_trailing_separators(folder_path);
    match trimmed.rfind(is_separator) {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Every ancestor folder of `path`, from the top-level root down to (but
/// excluding) `path` itself.
///
/// Ancestors are produced by repeated [`folder_of`], so they use the same
/// separator style as the input and match what [`folder_of`] returns for
/// files stored beneath them.
///
/// # Example
///
/// ```
/// use dupecat::paths::ancestor_chain;
///
/// assert_eq!(ancestor_chain("/a/b/c"), vec!["/", "/a", "/a/b"]);
/// assert_eq!(ancestor_chain(r"C:\x\y"), vec![r"C:\", r"C:\x"]);
/// assert!(ancestor_chain("/").is_empty());
/// ```
#[must_use]
pub fn ancestor_chain(path: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = folder_of(path);
    while !current.is_empty() {
        let next = folder_of(&current);
        // folder_of always shortens its input; guard anyway so a bad
        // input can never spin.
        if next.len() >= current.len() {
            chain.push(current);
            break;
        }
        chain.push(std::mem::replace(&mut current, next));
    }
    chain.reverse();
    chain
}

/// Number of segments below the root in the canonical form of `path`.
#[must_use]
pub fn depth(path: &str) -> usize {
    normalize(path)
        .split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .count()
}
