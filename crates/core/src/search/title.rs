//! Human-readable release titles for grouped results.

use super::grouper::last_segment;
use super::types::GroupedResult;

/// Directory names that say nothing about the release.
const GENERIC_NAMES: &[&str] = &[
    "music",
    "my music",
    "downloads",
    "download",
    "complete",
    "completed",
    "incomplete",
    "shared",
    "share",
    "files",
    "audio",
    "albums",
    "media",
    "soulseek",
    "slsk",
    "users",
    "home",
    "data",
    "mp3",
    "flac",
];

fn is_generic(segment: &str) -> bool {
    let lower = segment.trim().to_lowercase();
    lower.is_empty()
        || lower.starts_with("@@")
        || (lower.len() == 2 && lower.ends_with(':'))
        || GENERIC_NAMES.contains(&lower.as_str())
}

/// Title for a remote directory.
///
/// A last segment that already reads "Artist - Album" is used as is;
/// otherwise the nearest meaningful ancestor is prefixed.
pub fn directory_title(directory: &str) -> String {
    let segments: Vec<&str> = directory
        .split(['\\', '/'])
        .filter(|s| !s.is_empty())
        .collect();

    let Some((last, ancestors)) = segments.split_last() else {
        return directory.to_string();
    };

    if last.contains(" - ") {
        return last.to_string();
    }

    match ancestors.iter().rev().find(|s| !is_generic(s)) {
        Some(ancestor) => format!("{} - {}", ancestor, last),
        None => last.to_string(),
    }
}

/// Title shown in the Torznab feed, with the format tag appended.
pub fn release_title(result: &GroupedResult) -> String {
    let title = directory_title(&result.directory);
    match &result.format_tag {
        Some(tag) => format!("{} [{}]", title, tag),
        None => title,
    }
}

/// Title for a download job: the name of the first file's directory.
pub fn job_title(first_filename: &str) -> String {
    let parent = super::grouper::parent_directory(first_filename);
    let name = last_segment(parent);
    if name.is_empty() {
        last_segment(first_filename).to_string()
    } else {
        name.to_string()
    }
}
