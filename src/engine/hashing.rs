//! File checksums (md5, sha1, sha256, blake3), computed in one pass over the file.

use anyhow::Result;
use memmap2::Mmap;
use sha2::Digest;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::utils::config::HashingConsts;

/// A checksum a directory can ask for through its `CheckSumCalculators` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Blake3,
}

impl ChecksumAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }

    /// Document field the hex digest is stored under.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }
}

/// Parse a comma separated list such as `"md5, sha256"`. Unknown names are dropped, duplicates kept once.
pub fn parse_checksum_option(value: &str) -> Vec<ChecksumAlgorithm> {
    let mut out = Vec::new();
    for name in value.split(',').filter(|s| !s.trim().is_empty()) {
        match ChecksumAlgorithm::from_name(name) {
            Some(a) if !out.contains(&a) => out.push(a),
            Some(_) => {}
            None => log::warn!("unknown checksum calculator {:?}", name.trim()),
        }
    }
    out
}

enum RunningHash {
    Md5(md5::Context),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl RunningHash {
    fn new(algo: ChecksumAlgorithm) -> Self {
        match algo {
            ChecksumAlgorithm::Md5 => Self::Md5(md5::Context::new()),
            ChecksumAlgorithm::Sha1 => Self::Sha1(sha1::Sha1::new()),
            ChecksumAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            ChecksumAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(c) => c.consume(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finish_hex(self) -> String {
        match self {
            Self::Md5(c) => format!("{:x}", c.compute()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Hex digests of `path` for each of `algos`, in the same order.
/// Uses memory-mapped I/O above the mmap threshold, chunked reads otherwise.
pub fn checksum_file(
    path: &Path,
    size: u64,
    algos: &[ChecksumAlgorithm],
) -> Result<Vec<(ChecksumAlgorithm, String)>> {
    if algos.is_empty() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let mut hashers: Vec<(ChecksumAlgorithm, RunningHash)> =
        algos.iter().map(|a| (*a, RunningHash::new(*a))).collect();

    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        let mmap = unsafe { Mmap::map(&file)? };
        for (_, h) in hashers.iter_mut() {
            h.update(&mmap);
        }
    } else {
        let mut reader =
            std::io::BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
        let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            for (_, h) in hashers.iter_mut() {
                h.update(&buffer[..n]);
            }
        }
    }

    Ok(hashers
        .into_iter()
        .map(|(a, h)| (a, h.finish_hex()))
        .collect())
}
