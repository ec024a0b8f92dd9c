use std::fs;
use std::io;
use std::path::Path;

/// Raw link target text for a symlink, otherwise the basename of the path.
pub fn symlink_target_name(path: &Path) -> io::Result<String> {
    let is_link = fs::symlink_metadata(path)?.file_type().is_symlink();
    if is_link {
        return Ok(fs::read_link(path)?.to_string_lossy().into_owned());
    }
    Ok(path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default())
}

/// `symlink_target_name` with the final extension removed.
pub fn symlink_target_name_no_ext(path: &Path) -> io::Result<String> {
    let name = symlink_target_name(path)?;
    Ok(strip_extension(&name).to_string())
}

/// Drop the extension of the last path component, leaving dot-files intact.
pub(crate) fn strip_extension(name: &str) -> &str {
    let component_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    let component = &name[component_start..];
    let leading_dots = component.len() - component.trim_start_matches('.').len();

    match component.rfind('.') {
        Some(dot) if dot >= leading_dots && dot > 0 => &name[..component_start + dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("song.flac"), "song");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension(".bashrc"), ".bashrc");
        assert_eq!(strip_extension("../music/track.mp3"), "../music/track");
        assert_eq!(strip_extension("dir.d/file"), "dir.d/file");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_uses_raw_target_text() {
        use std::os::unix::fs::symlink;
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("original.jpg");
        fs::write(&target, b"pixels").unwrap();
        let link = tmp.path().join("alias.png");
        symlink("original.jpg", &link).unwrap();

        assert_eq!(symlink_target_name(&link).unwrap(), "original.jpg");
        assert_eq!(symlink_target_name_no_ext(&link).unwrap(), "original");
    }
}
