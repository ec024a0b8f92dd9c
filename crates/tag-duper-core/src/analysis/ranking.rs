use super::duplicates::DuplicateMap;
use crate::hasher::identity::strip_extension;
use ahash::AHashMap;
use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

lazy_static::lazy_static! {
    static ref WORD: Regex = Regex::new(r"\b[A-Za-z][a-z]{2,30}\b").unwrap();
}

/// A group member with its descriptiveness score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub path: PathBuf,
    pub score: f64,
}

/// Per-pass cache of how many non-directory entries each directory holds.
/// Build one per ranking pass and drop it afterwards.
#[derive(Debug, Default)]
pub struct SiblingCache {
    counts: AHashMap<PathBuf, usize>,
}

impl SiblingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&mut self, dir: &Path) -> usize {
        if let Some(count) = self.counts.get(dir) {
            return *count;
        }
        let count = count_files(dir);
        self.counts.insert(dir.to_path_buf(), count);
        count
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Non-hidden, non-directory entries directly inside `dir`.
fn count_files(dir: &Path) -> usize {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let pattern = format!("{}/*", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    match glob::glob_with(&pattern, options) {
        Ok(paths) => paths
            .filter_map(Result::ok)
            .filter(|p| !p.is_dir())
            .count(),
        Err(e) => {
            warn!("Cannot list {}: {}", dir.display(), e);
            0
        }
    }
}

/// Sum of squared word lengths, where a word is a letter followed by 2–30
/// lowercase letters. The extension is ignored.
pub fn filename_descriptiveness(name: &str) -> u64 {
    WORD.find_iter(strip_extension(name))
        .map(|word| {
            let len = word.as_str().len() as u64;
            len * len
        })
        .sum()
}

/// Piecewise-linear weight on sibling count: 0.1 floor, 1.3 at 10, peak 2.0
/// at 30, down to 0.25 at 200 and flat beyond.
pub fn filecount_multiplier(count: usize) -> f64 {
    let c = count as f64;
    if count <= 10 {
        (1.3 * (c / 10.0)).max(0.1)
    } else if count <= 30 {
        1.3 + 0.7 * ((c - 10.0) / 20.0)
    } else {
        2.0 - 1.75 * ((c - 30.0).min(170.0) / 170.0)
    }
}

/// The part of a path that gets scored: `parent_name/file_name`.
fn measured_part(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path
        .parent()
        .and_then(Path::file_name)
        .map(|p| p.to_string_lossy())
    {
        Some(parent) => format!("{}/{}", parent, file_name),
        None => file_name,
    }
}

/// Score how worth keeping a duplicate is: descriptive names in reasonably
/// populated directories score highest. Only the immediate parent directory
/// name counts towards descriptiveness; files in subdirectories are not
/// counted as siblings.
pub fn value_of_duplicate(path: &Path, cache: &mut SiblingCache) -> f64 {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let siblings = cache.count(dir);
    let descriptiveness = filename_descriptiveness(&measured_part(path));
    let score = descriptiveness as f64 * filecount_multiplier(siblings);
    trace!(
        "{}: descriptiveness {} × {} siblings = {:.2}",
        path.display(),
        descriptiveness,
        siblings,
        score
    );
    score
}

/// Score and order one group, worst first, so the best candidate is last.
pub fn rank_group(paths: &[PathBuf], cache: &mut SiblingCache) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = paths
        .iter()
        .map(|path| ScoredCandidate {
            path: path.clone(),
            score: value_of_duplicate(path, cache),
        })
        .collect();
    scored.sort_by(|a, b| a.score.total_cmp(&b.score));
    scored
}

/// Rank every group of a duplicate map with a fresh sibling cache.
pub fn rank_duplicates(groups: &DuplicateMap) -> BTreeMap<String, Vec<ScoredCandidate>> {
    let mut cache = SiblingCache::new();
    groups
        .iter()
        .map(|(fingerprint, paths)| (fingerprint.clone(), rank_group(paths, &mut cache)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_multiplier_breakpoints() {
        assert!(close(filecount_multiplier(0), 0.1));
        assert!(close(filecount_multiplier(10), 1.3));
        assert!(close(filecount_multiplier(30), 2.0));
        assert!(close(filecount_multiplier(200), 0.25));
        assert!(close(filecount_multiplier(300), 0.25));
    }

    #[test]
    fn test_multiplier_shape() {
        assert!(close(filecount_multiplier(5), 0.65));
        assert!(close(filecount_multiplier(20), 1.65));
        assert!(filecount_multiplier(31) < 2.0);
        assert!(filecount_multiplier(100) > filecount_multiplier(150));
    }

    #[test]
    fn test_descriptiveness_examples() {
        assert_eq!(filename_descriptiveness("foo bar"), 18);
        assert_eq!(filename_descriptiveness("foobar"), 36);
        assert_eq!(filename_descriptiveness("cereal bar"), 45);
        assert_eq!(filename_descriptiveness("foo baz baz"), 27);
        assert_eq!(filename_descriptiveness("1d0f3fe45350f09bbf0453,foo,bar"), 18);
    }

    #[test]
    fn test_descriptiveness_ignores_extension_and_short_words() {
        assert_eq!(filename_descriptiveness("holiday.jpeg"), 49);
        assert_eq!(filename_descriptiveness("ab cd 12"), 0);
        assert_eq!(filename_descriptiveness("IMG_0042.JPG"), 0);
        assert_eq!(filename_descriptiveness("Sunset"), 36);
    }

    #[test]
    fn test_measured_part_uses_immediate_parent() {
        assert_eq!(
            measured_part(Path::new("/home/me/holiday/beach.jpg")),
            "holiday/beach.jpg"
        );
        assert_eq!(measured_part(Path::new("beach.jpg")), "beach.jpg");
    }

    /// `holiday/` with `count` plain files, one subdirectory and one dot-file.
    fn populated_dir(root: &Path, count: usize) -> PathBuf {
        let dir = root.join("holiday");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join(".hidden"), "x").unwrap();
        std::fs::write(dir.join("nested").join("deep.txt"), "x").unwrap();
        for i in 0..count {
            std::fs::write(dir.join(format!("file{:02}.txt", i)), "x").unwrap();
        }
        dir
    }

    #[test]
    fn test_count_files_skips_hidden_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path(), 4);
        assert_eq!(count_files(&dir), 4);
        assert_eq!(count_files(&tmp.path().join("absent")), 0);
    }

    #[test]
    fn test_sibling_cache_reuses_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path(), 3);
        let mut cache = SiblingCache::new();
        assert!(cache.is_empty());

        assert_eq!(cache.count(&dir), 3);
        std::fs::write(dir.join("late.txt"), "x").unwrap();
        assert_eq!(cache.count(&dir), 3);
        assert_eq!(cache.len(), 1);

        assert_eq!(SiblingCache::new().count(&dir), 4);
    }

    #[test]
    fn test_value_of_duplicate_in_populated_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path(), 29);
        let target = dir.join("abcd.txt");
        std::fs::write(&target, "x").unwrap();

        // holiday (49) + abcd (16), 30 siblings weigh 2.0
        let mut cache = SiblingCache::new();
        assert!(close(value_of_duplicate(&target, &mut cache), 130.0));
    }

    #[test]
    fn test_longer_names_rank_higher() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path(), 10);
        let paths: Vec<PathBuf> = ["abcd.txt", "ab.txt", "abc.txt"]
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, "same").unwrap();
                path
            })
            .collect();

        let mut groups = DuplicateMap::new();
        groups.insert("f1".to_string(), paths);
        let ranked = rank_duplicates(&groups);

        let order: Vec<_> = ranked["f1"]
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(order, vec!["ab.txt", "abc.txt", "abcd.txt"]);
        assert!(ranked["f1"].windows(2).all(|w| w[0].score < w[1].score));
    }
}
