use sha2::Digest;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Files at least this large are fingerprinted from their head and tail only.
pub const SPARSE_FINGERPRINT_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Size of each of the two windows read for a sparse fingerprint.
pub const SPARSE_FINGERPRINT_SIZE: u64 = 512 * 1024;

const CHUNK_SIZE: usize = 0xffff;

/// Hash the whole file, streamed in fixed-size chunks.
pub fn full_hash<D: Digest>(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = D::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Size-adaptive hash: below the threshold this is `full_hash`, otherwise only
/// the first and last `SPARSE_FINGERPRINT_SIZE` bytes are digested, in that order.
///
/// Modifications strictly inside the middle of a large file do not change the result.
pub fn sparse_hash<D: Digest>(path: &Path) -> io::Result<String> {
    let size = std::fs::metadata(path)?.len();
    if size < SPARSE_FINGERPRINT_THRESHOLD {
        return full_hash::<D>(path);
    }

    let mut file = File::open(path)?;
    let mut hasher = D::new();

    let head = read_window(&mut file)?;
    hasher.update(&head);

    file.seek(SeekFrom::Start(size - SPARSE_FINGERPRINT_SIZE))?;
    let tail = read_window(&mut file)?;
    hasher.update(&tail);

    Ok(hex::encode(hasher.finalize()))
}

fn read_window(file: &mut File) -> io::Result<Vec<u8>> {
    let mut window = Vec::with_capacity(SPARSE_FINGERPRINT_SIZE as usize);
    file.by_ref()
        .take(SPARSE_FINGERPRINT_SIZE)
        .read_to_end(&mut window)?;
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use md5::Md5;
    use sha1::Sha1;
    use sha2::Sha256;
    use std::fs;
    use tempfile::TempDir;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_sparse_equals_full_below_threshold() {
        let tmp = TempDir::new().unwrap();
        let sizes = [0usize, 1, 4096, SPARSE_FINGERPRINT_THRESHOLD as usize - 1];

        for (i, size) in sizes.iter().enumerate() {
            let path = tmp.path().join(format!("f{}.bin", i));
            fs::write(&path, patterned(*size)).unwrap();

            assert_eq!(
                sparse_hash::<Sha256>(&path).unwrap(),
                full_hash::<Sha256>(&path).unwrap()
            );
            assert_eq!(
                sparse_hash::<Sha1>(&path).unwrap(),
                full_hash::<Sha1>(&path).unwrap()
            );
            assert_eq!(
                sparse_hash::<Md5>(&path).unwrap(),
                full_hash::<Md5>(&path).unwrap()
            );
        }
    }

    #[test]
    fn test_sparse_ignores_middle_of_large_file() {
        let tmp = TempDir::new().unwrap();
        let size = SPARSE_FINGERPRINT_THRESHOLD as usize + 1;
        let original = patterned(size);

        let a = tmp.path().join("a.bin");
        fs::write(&a, &original).unwrap();

        let mut modified = original.clone();
        let middle = size / 2;
        modified[middle] ^= 0xff;
        modified[SPARSE_FINGERPRINT_SIZE as usize] ^= 0xff;
        let b = tmp.path().join("b.bin");
        fs::write(&b, &modified).unwrap();

        assert_eq!(
            sparse_hash::<Sha256>(&a).unwrap(),
            sparse_hash::<Sha256>(&b).unwrap()
        );
        assert_ne!(
            full_hash::<Sha256>(&a).unwrap(),
            full_hash::<Sha256>(&b).unwrap()
        );
    }

    #[test]
    fn test_sparse_is_digest_of_head_then_tail() {
        let tmp = TempDir::new().unwrap();
        let size = SPARSE_FINGERPRINT_THRESHOLD as usize + 1;
        let data = patterned(size);
        let path = tmp.path().join("big.bin");
        fs::write(&path, &data).unwrap();

        let window = SPARSE_FINGERPRINT_SIZE as usize;
        let mut expected = Sha256::new();
        expected.update(&data[..window]);
        expected.update(&data[size - window..]);

        assert_eq!(
            sparse_hash::<Sha256>(&path).unwrap(),
            hex::encode(expected.finalize())
        );
    }

    #[test]
    fn test_sparse_sees_changes_in_windows() {
        let tmp = TempDir::new().unwrap();
        let size = SPARSE_FINGERPRINT_THRESHOLD as usize + 1;
        let original = patterned(size);

        let a = tmp.path().join("a.bin");
        fs::write(&a, &original).unwrap();

        let mut tail_changed = original.clone();
        tail_changed[size - 1] ^= 0xff;
        let b = tmp.path().join("b.bin");
        fs::write(&b, &tail_changed).unwrap();

        assert_ne!(
            sparse_hash::<Md5>(&a).unwrap(),
            sparse_hash::<Md5>(&b).unwrap()
        );
    }
}
