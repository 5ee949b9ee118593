//! Turns per-peer file listings into release-like groups.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::slskd::{PeerFile, PeerResponse};

use super::types::{GroupedResult, CATEGORY_AUDIO, CATEGORY_LOSSLESS, CATEGORY_MP3};

const AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "ogg", "opus", "m4a", "aac", "wma", "wav", "ape", "wv", "alac", "aiff", "aif",
];

const LOSSLESS_EXTENSIONS: &[&str] = &["flac", "ape", "wv", "wav", "alac", "aiff", "aif"];

/// Lower-cased extension of a remote path, if any.
pub fn extension(filename: &str) -> Option<String> {
    let name = last_segment(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_audio_file(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// The path with its last segment removed. Separators are `\` or `/`.
pub fn parent_directory(path: &str) -> &str {
    match path.rfind(['\\', '/']) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// The last segment of a `\` or `/` separated path.
pub fn last_segment(path: &str) -> &str {
    match path.rfind(['\\', '/']) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

struct Group {
    username: String,
    directory: String,
    has_free_upload_slot: bool,
    upload_speed: u64,
    files: Vec<PeerFile>,
}

/// Group audio files by `(username, directory)` and rank the groups.
///
/// Groups with a free upload slot come first, then faster peers. The sort is
/// stable so ties keep response order.
pub fn group_responses(responses: &[PeerResponse]) -> Vec<GroupedResult> {
    let stamp = format!("{:x}", Utc::now().timestamp_millis());
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for response in responses {
        for file in response.files.iter().filter(|f| is_audio_file(&f.filename)) {
            let directory = parent_directory(&file.filename).to_string();
            let key = (response.username.clone(), directory.clone());
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Group {
                    username: response.username.clone(),
                    directory,
                    has_free_upload_slot: response.has_free_upload_slot,
                    upload_speed: response.upload_speed,
                    files: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].files.push(file.clone());
        }
    }

    let mut results: Vec<GroupedResult> = groups
        .into_iter()
        .filter(|g| !g.files.is_empty())
        .map(|g| build_result(g, &stamp))
        .collect();

    results.sort_by(|a, b| {
        b.has_free_upload_slot
            .cmp(&a.has_free_upload_slot)
            .then(b.upload_speed.cmp(&a.upload_speed))
    });
    results
}

fn build_result(group: Group, stamp: &str) -> GroupedResult {
    let total_size = group.files.iter().map(|f| f.size).sum();
    let bit_rate = mean_bit_rate(&group.files);
    let (category, format_tag) = classify(&group.files, bit_rate);

    GroupedResult {
        guid: result_guid(&group.username, &group.directory, stamp),
        username: group.username,
        directory: group.directory,
        files: group.files,
        total_size,
        has_free_upload_slot: group.has_free_upload_slot,
        upload_speed: group.upload_speed,
        bit_rate,
        category,
        format_tag,
    }
}

fn result_guid(username: &str, directory: &str, stamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}::{}", username, directory).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", &digest[..16], stamp)
}

fn mean_bit_rate(files: &[PeerFile]) -> u32 {
    let rates: Vec<u32> = files.iter().filter_map(|f| f.bit_rate).collect();
    if rates.is_empty() {
        return 0;
    }
    let sum: u64 = rates.iter().map(|&r| r as u64).sum();
    (sum as f64 / rates.len() as f64).round() as u32
}

/// Category and format tag for a non-empty set of audio files.
pub fn classify(files: &[PeerFile], bit_rate: u32) -> (u32, Option<String>) {
    let extensions: BTreeSet<String> = files
        .iter()
        .filter_map(|f| extension(&f.filename))
        .collect();

    if !extensions.is_empty()
        && extensions
            .iter()
            .all(|ext| LOSSLESS_EXTENSIONS.contains(&ext.as_str()))
    {
        let mut tag = match extensions.len() {
            1 => extensions.iter().next().map(|e| e.to_uppercase()).unwrap_or_default(),
            _ => "Lossless".to_string(),
        };
        if files.iter().any(|f| f.bit_depth.is_some_and(|d| d >= 24)) {
            tag.push_str(" 24bit");
        }
        return (CATEGORY_LOSSLESS, Some(tag));
    }

    if extensions.len() == 1 && extensions.contains("mp3") {
        let tag = if bit_rate > 0 {
            format!("MP3-{}", bit_rate)
        } else {
            "MP3".to_string()
        };
        return (CATEGORY_MP3, Some(tag));
    }

    let tag = match extensions.len() {
        1 => extensions.iter().next().map(|e| e.to_uppercase()),
        _ => None,
    };
    (CATEGORY_AUDIO, tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> PeerFile {
        PeerFile {
            filename: name.to_string(),
            size: 1_000,
            bit_rate: None,
            bit_depth: None,
            sample_rate: None,
        }
    }

    fn with_bit_rate(name: &str, rate: u32) -> PeerFile {
        PeerFile {
            bit_rate: Some(rate),
            ..file(name)
        }
    }

    fn with_bit_depth(name: &str, depth: u32) -> PeerFile {
        PeerFile {
            bit_depth: Some(depth),
            ..file(name)
        }
    }

    fn response(username: &str, free: bool, speed: u64, files: Vec<PeerFile>) -> PeerResponse {
        PeerResponse {
            username: username.to_string(),
            has_free_upload_slot: free,
            upload_speed: speed,
            files,
        }
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(parent_directory("Music\\Artist\\Album\\01.flac"), "Music\\Artist\\Album");
        assert_eq!(parent_directory("music/album/01.mp3"), "music/album");
        assert_eq!(parent_directory("loose.mp3"), "");
        assert_eq!(last_segment("Music\\Artist\\Album"), "Album");
        assert_eq!(extension("a\\B.FLAC").as_deref(), Some("flac"));
        assert_eq!(extension("a\\.hidden"), None);
        assert!(is_audio_file("x\\track.opus"));
        assert!(!is_audio_file("x\\cover.jpg"));
        assert!(!is_audio_file("x\\README"));
    }

    #[test]
    fn test_classify_flac() {
        let files = vec![file("a.flac"), file("b.flac")];
        assert_eq!(classify(&files, 0), (3040, Some("FLAC".to_string())));
    }

    #[test]
    fn test_classify_flac_24bit() {
        let files = vec![with_bit_depth("a.flac", 24), with_bit_depth("b.flac", 24)];
        assert_eq!(classify(&files, 0), (3040, Some("FLAC 24bit".to_string())));
    }

    #[test]
    fn test_classify_mixed_lossless() {
        let files = vec![file("a.flac"), file("b.ape")];
        assert_eq!(classify(&files, 0), (3040, Some("Lossless".to_string())));
    }

    #[test]
    fn test_classify_mp3() {
        let files = vec![with_bit_rate("a.mp3", 320), with_bit_rate("b.mp3", 320)];
        assert_eq!(classify(&files, mean_bit_rate(&files)), (3010, Some("MP3-320".to_string())));

        let files = vec![file("a.mp3"), file("b.mp3")];
        assert_eq!(classify(&files, mean_bit_rate(&files)), (3010, Some("MP3".to_string())));
    }

    #[test]
    fn test_classify_mixed_and_other() {
        let files = vec![file("a.flac"), file("b.mp3")];
        assert_eq!(classify(&files, 0), (3000, None));

        let files = vec![file("a.ogg"), file("b.ogg")];
        assert_eq!(classify(&files, 0), (3000, Some("OGG".to_string())));
    }

    #[test]
    fn test_mean_bit_rate_rounds_and_ignores_missing() {
        let files = vec![
            with_bit_rate("a.mp3", 320),
            with_bit_rate("b.mp3", 255),
            file("c.mp3"),
        ];
        // (320 + 255) / 2 = 287.5
        assert_eq!(mean_bit_rate(&files), 288);
        assert_eq!(mean_bit_rate(&[file("a.mp3")]), 0);
    }

    #[test]
    fn test_groups_by_user_and_directory() {
        let responses = vec![
            response(
                "alice",
                true,
                100,
                vec![
                    file("Music\\A\\01.flac"),
                    file("Music\\A\\02.flac"),
                    file("Music\\A\\cover.jpg"),
                    file("Music\\B\\01.mp3"),
                ],
            ),
            response("bob", true, 50, vec![file("Music\\A\\01.flac")]),
        ];

        let results = group_responses(&responses);
        assert_eq!(results.len(), 3);

        let alice_a = results
            .iter()
            .find(|r| r.username == "alice" && r.directory == "Music\\A")
            .unwrap();
        assert_eq!(alice_a.files.len(), 2);
        assert_eq!(alice_a.total_size, 2_000);
        assert!(results.iter().all(|r| r.files.iter().all(|f| is_audio_file(&f.filename))));
    }

    #[test]
    fn test_non_audio_directories_produce_no_group() {
        let responses = vec![
            response("alice", true, 100, vec![file("Scans\\front.jpg"), file("Scans\\log.txt")]),
            response("bob", true, 100, vec![]),
        ];
        assert!(group_responses(&responses).is_empty());
    }

    #[test]
    fn test_sorting_free_slot_first_then_speed() {
        let responses = vec![
            response("slow_busy", false, 500_000, vec![file("X\\1.mp3")]),
            response("free_slow", true, 50_000, vec![file("Y\\1.mp3")]),
            response("free_fast", true, 90_000, vec![file("Z\\1.mp3")]),
        ];

        let results = group_responses(&responses);
        let order: Vec<&str> = results.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(order, vec!["free_fast", "free_slow", "slow_busy"]);
    }

    #[test]
    fn test_guids_are_distinct_and_hash_prefixed() {
        let responses = vec![response(
            "alice",
            true,
            1,
            vec![file("A\\1.mp3"), file("B\\1.mp3")],
        )];
        let results = group_responses(&responses);
        assert_ne!(results[0].guid, results[1].guid);

        let (hash, stamp) = results[0].guid.split_once('-').unwrap();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!stamp.is_empty());
    }
}
