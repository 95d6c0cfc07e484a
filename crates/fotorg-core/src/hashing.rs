use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::Error;

const BLOCK_SIZE: usize = 8 * 1024;

/// Content digest used to decide byte-identical duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(Error::UnknownHashAlgorithm(s.to_string())),
        }
    }
}

/// Stream a file through the digest and return it as lowercase hex.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            feed(&mut reader, |block| hasher.update(block))?;
            Ok(hex::encode(hasher.finalize()))
        }
        HashAlgorithm::Sha512 => {
            let mut hasher = Sha512::new();
            feed(&mut reader, |block| hasher.update(block))?;
            Ok(hex::encode(hasher.finalize()))
        }
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            feed(&mut reader, |block| {
                hasher.update(block);
            })?;
            Ok(hasher.finalize().to_hex().to_string())
        }
    }
}

fn feed<R: Read>(reader: &mut R, mut update: impl FnMut(&[u8])) -> io::Result<()> {
    let mut block = [0u8; BLOCK_SIZE];
    loop {
        let n = reader.read(&mut block)?;
        if n == 0 {
            return Ok(());
        }
        update(&block[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_parse_algorithm_names() {
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA-512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert_eq!(" blake3 ".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        assert!(matches!(
            "md4".parse::<HashAlgorithm>(),
            Err(Error::UnknownHashAlgorithm(_))
        ));
    }

    #[test]
    fn test_sha256_known_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        File::create(&path).unwrap().write_all(b"abc").unwrap();

        assert_eq!(
            hash_file(&path, HashAlgorithm::Sha256).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_large_file_spans_blocks() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let mut data = vec![7u8; BLOCK_SIZE * 3 + 11];
        File::create(&a).unwrap().write_all(&data).unwrap();
        data[BLOCK_SIZE * 2 + 5] = 8;
        File::create(&b).unwrap().write_all(&data).unwrap();

        for algo in [HashAlgorithm::Sha256, HashAlgorithm::Sha512, HashAlgorithm::Blake3] {
            assert_ne!(hash_file(&a, algo).unwrap(), hash_file(&b, algo).unwrap());
        }
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(hash_file(&dir.path().join("nope.jpg"), HashAlgorithm::Sha256).is_err());
    }
}
