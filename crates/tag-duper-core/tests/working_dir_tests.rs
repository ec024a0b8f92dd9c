// Changes the process working directory, so it lives alone in its own test binary.

#[cfg(unix)]
#[test]
fn test_relative_path_fails_without_working_directory() {
    use std::env;
    use std::path::Path;
    use tag_duper_core::storage::{split_path, Database};

    let db = Database::open_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let original = env::current_dir().unwrap();
    env::set_current_dir(dir.path()).unwrap();
    std::fs::remove_dir(dir.path()).unwrap();

    let split = split_path(Path::new("song.flac"));
    let lookup = db.file_id(Path::new("song.flac"));
    env::set_current_dir(&original).unwrap();

    assert!(split.is_err());
    assert!(lookup.is_err());
    assert!(split_path(Path::new("/music/song.flac")).is_ok());
}
