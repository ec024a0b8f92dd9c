pub mod digest;
pub mod identity;

use crate::error::Error;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Setting key under which the catalog records its fingerprint algorithm.
pub const ALGORITHM_SETTING: &str = "fingerprintAlgorithm";

/// The closed set of fingerprinting algorithms a catalog may be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    Sha256,
    Sha1,
    Md5,
    #[default]
    DynamicSha256,
    DynamicSha1,
    DynamicMd5,
    SymlinkTargetName,
    SymlinkTargetNameNoExt,
}

impl Algorithm {
    pub const ALL: [Algorithm; 8] = [
        Algorithm::Sha256,
        Algorithm::Sha1,
        Algorithm::Md5,
        Algorithm::DynamicSha256,
        Algorithm::DynamicSha1,
        Algorithm::DynamicMd5,
        Algorithm::SymlinkTargetName,
        Algorithm::SymlinkTargetNameNoExt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha1 => "sha1",
            Algorithm::Md5 => "md5",
            Algorithm::DynamicSha256 => "dynamic:SHA256",
            Algorithm::DynamicSha1 => "dynamic:SHA1",
            Algorithm::DynamicMd5 => "dynamic:MD5",
            Algorithm::SymlinkTargetName => "symlinkTargetName",
            Algorithm::SymlinkTargetNameNoExt => "symlinkTargetNameNoExt",
        }
    }

    /// True for algorithms that hash file content rather than naming.
    pub fn is_content_based(self) -> bool {
        !matches!(
            self,
            Algorithm::SymlinkTargetName | Algorithm::SymlinkTargetNameNoExt
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == s)
            .ok_or_else(|| Error::UnknownAlgorithm(s.to_string()))
    }
}

/// Compute the fingerprint of `path` under `algorithm`.
///
/// Missing paths and directories have no fingerprint and yield `Ok(None)`.
/// The existence check follows symlinks, so a dangling link also yields `None`.
pub fn fingerprint(path: &Path, algorithm: Algorithm) -> Result<Option<String>, Error> {
    if !path.exists() || path.is_dir() {
        return Ok(None);
    }

    let value = match algorithm {
        Algorithm::Sha256 => digest::full_hash::<Sha256>(path)?,
        Algorithm::Sha1 => digest::full_hash::<Sha1>(path)?,
        Algorithm::Md5 => digest::full_hash::<Md5>(path)?,
        Algorithm::DynamicSha256 => digest::sparse_hash::<Sha256>(path)?,
        Algorithm::DynamicSha1 => digest::sparse_hash::<Sha1>(path)?,
        Algorithm::DynamicMd5 => digest::sparse_hash::<Md5>(path)?,
        Algorithm::SymlinkTargetName => identity::symlink_target_name(path)?,
        Algorithm::SymlinkTargetNameNoExt => identity::symlink_target_name_no_ext(path)?,
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_algorithm_names_round_trip() {
        for algorithm in Algorithm::ALL {
            let parsed: Algorithm = algorithm.to_string().parse().unwrap();
            assert_eq!(parsed, algorithm);
        }
    }

    #[test]
    fn test_unknown_algorithm_is_an_error() {
        let err = "blake3".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, Error::UnknownAlgorithm(ref name) if name == "blake3"));

        // names are case sensitive, exactly as stored by TMSU
        assert!("SHA256".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_default_is_dynamic_sha256() {
        assert_eq!(Algorithm::default(), Algorithm::DynamicSha256);
    }

    #[test]
    fn test_no_fingerprint_for_missing_or_directory() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.txt");

        for algorithm in Algorithm::ALL {
            assert_eq!(fingerprint(&missing, algorithm).unwrap(), None);
            assert_eq!(fingerprint(tmp.path(), algorithm).unwrap(), None);
        }
    }

    #[test]
    fn test_known_digests() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();

        assert_eq!(
            fingerprint(&path, Algorithm::Sha256).unwrap().unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            fingerprint(&path, Algorithm::Sha1).unwrap().unwrap(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            fingerprint(&path, Algorithm::Md5).unwrap().unwrap(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn test_identity_algorithms_use_basename_for_regular_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("song.flac");
        fs::write(&path, b"data").unwrap();

        assert_eq!(
            fingerprint(&path, Algorithm::SymlinkTargetName).unwrap().unwrap(),
            "song.flac"
        );
        assert_eq!(
            fingerprint(&path, Algorithm::SymlinkTargetNameNoExt)
                .unwrap()
                .unwrap(),
            "song"
        );
    }
}
