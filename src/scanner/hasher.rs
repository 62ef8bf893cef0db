//! Size-tiered BLAKE3 content fingerprints.
//!
//! # Overview
//!
//! Hashing every byte of a large media library is not feasible, and it
//! is not needed to rule out most duplicates. [`Fingerprinter`] picks a
//! strategy by file size:
//!
//! | Size                              | Tier                 | Bytes read                     |
//! |-----------------------------------|----------------------|--------------------------------|
//! | `<= full_max_size` (1 MiB)        | [`HashTier::Full`]   | whole file                     |
//! | `<= sample_max_size` (100 MiB)    | [`HashTier::Sampled`]| size + `sample_count` windows  |
//! | larger                            | [`HashTier::Quick`]  | first and last window          |
//!
//! Sampled and quick digests can collide for files that differ only in
//! bytes that were not read. [`Fingerprinter::full_hash`] exists for a
//! follow-up pass over exactly those collisions; it memory-maps files up
//! to `stream_threshold` and streams anything larger through a fixed
//! buffer so memory use stays bounded.
//!
//! Digests are 64 lowercase hex characters and are deterministic per
//! `(content, tier)`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::HashError;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Buffer used when streaming files above the streaming threshold.
pub const STREAM_BUFFER_SIZE: usize = MIB as usize;

/// Fingerprinting strategy, chosen by file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashTier {
    /// Every byte of the file.
    Full,
    /// File size plus evenly spaced windows.
    Sampled,
    /// First and last window only.
    Quick,
}

impl HashTier {
    /// Name stored in the catalog.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Sampled => "sampled",
            Self::Quick => "quick",
        }
    }

    /// Parse a stored name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "sampled" => Some(Self::Sampled),
            "quick" => Some(Self::Quick),
            _ => None,
        }
    }

    /// `true` if the digest covers the whole content.
    #[must_use]
    pub fn is_exact(self) -> bool {
        self == Self::Full
    }
}

impl std::fmt::Display for HashTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier boundaries and sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashPolicy {
    /// Largest size hashed in full.
    pub full_max_size: u64,
    /// Largest size hashed by sampling; larger files get a quick hash.
    pub sample_max_size: u64,
    /// Number of windows read by the sampling tier.
    pub sample_count: u32,
    /// Bytes per window.
    pub window_size: u64,
    /// Full-content hashing above this size streams through a fixed buffer.
    pub stream_threshold: u64,
}

impl Default for HashPolicy {
    fn default() -> Self {
        Self {
            full_max_size: MIB,
            sample_max_size: 100 * MIB,
            sample_count: 10,
            window_size: 8 * KIB,
            stream_threshold: 2 * GIB,
        }
    }
}

impl HashPolicy {
    /// Tier used for a file of `size` bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use dupecat::scanner::{HashPolicy, HashTier};
    ///
    /// let policy = HashPolicy::default();
    /// assert_eq!(policy.tier_for(1024 * 1024), HashTier::Full);
    /// assert_eq!(policy.tier_for(1024 * 1024 + 1), HashTier::Sampled);
    /// assert_eq!(policy.tier_for(200 * 1024 * 1024), HashTier::Quick);
    /// ```
    #[must_use]
    pub fn tier_for(&self, size: u64) -> HashTier {
        if size <= self.full_max_size {
            HashTier::Full
        } else if size <= self.sample_max_size {
            HashTier::Sampled
        } else {
            HashTier::Quick
        }
    }

    /// Check that the boundaries are usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_count == 0 {
            return Err("hashing.sample_count must be at least 1".to_string());
        }
        if self.window_size == 0 {
            return Err("hashing.window_size must be at least 1".to_string());
        }
        if usize::try_from(self.window_size).is_err() {
            return Err("hashing.window_size does not fit in memory".to_string());
        }
        if self.full_max_size > self.sample_max_size {
            return Err(format!(
                "hashing.full_max_size ({}) exceeds hashing.sample_max_size ({})",
                self.full_max_size, self.sample_max_size
            ));
        }
        Ok(())
    }

    /// Byte offsets of the sampling windows for a file of `size` bytes.
    ///
    /// Offsets are `floor(size * i / sample_count)` for each window, so
    /// they are evenly spaced and the first one is always 0.
    #[must_use]
    pub fn sample_offsets(&self, size: u64) -> Vec<u64> {
        let count = u128::from(self.sample_count);
        (0..count)
            .map(|i| {
                // u128 avoids overflow for sizes near u64::MAX
                (u128::from(size) * i / count) as u64
            })
            .collect()
    }
}

/// A computed fingerprint and the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Lowercase hex BLAKE3 digest
    pub hex: String,
    /// Strategy used
    pub tier: HashTier,
}

/// Computes content fingerprints according to a [`HashPolicy`].
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    policy: HashPolicy,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Fingerprinter {
    /// Create a fingerprinter for the given policy.
    #[must_use]
    pub fn new(policy: HashPolicy) -> Self {
        Self {
            policy,
            shutdown_flag: None,
        }
    }

    /// Stop streaming reads when the flag becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> &HashPolicy {
        &self.policy
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Fingerprint `path`, whose recorded size is `size`, using the tier
    /// the policy assigns to that size.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read.
    pub fn fingerprint(&self, path: &Path, size: u64) -> Result<Fingerprint, HashError> {
        let tier = self.policy.tier_for(size);
        let hex = match tier {
            HashTier::Full => self.full_hash(path, size)?,
            HashTier::Sampled => self.sampled_hash(path, size)?,
            HashTier::Quick => self.quick_hash(path, size)?,
        };
        log::trace!("{} hash of {}: {}", tier, path.display(), hex);
        Ok(Fingerprint { hex, tier })
    }

    /// Hash the entire content of `path`.
    ///
    /// Small files are read into memory, files up to the streaming
    /// threshold are memory-mapped, and larger files are streamed through
    /// a [`STREAM_BUFFER_SIZE`] buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be read, or
    /// [`HashError::Interrupted`] if shutdown was requested mid-stream.
    pub fn full_hash(&self, path: &Path, size: u64) -> Result<String, HashError> {
        let to_err = |e: io::Error| HashError::from_io(path.to_path_buf(), e);

        if size <= self.policy.full_max_size {
            let data = std::fs::read(path).map_err(to_err)?;
            return Ok(blake3::hash(&data).to_hex().to_string());
        }

        let mut hasher = blake3::Hasher::new();
        if size <= self.policy.stream_threshold {
            hasher.update_mmap(path).map_err(to_err)?;
            return Ok(hasher.finalize().to_hex().to_string());
        }

        let mut file = File::open(path).map_err(to_err)?;
        let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(to_err(e)),
            };
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Hash the file size followed by `sample_count` evenly spaced windows.
    ///
    /// Seeding with the size separates files that share every sampled
    /// byte but differ in length.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read.
    pub fn sampled_hash(&self, path: &Path, size: u64) -> Result<String, HashError> {
        let to_err = |e: io::Error| HashError::from_io(path.to_path_buf(), e);
        let mut file = File::open(path).map_err(to_err)?;
        let mut hasher = blake3::Hasher::new();
        let mut window = Vec::with_capacity(self.window_len());

        hasher.update(&size.to_le_bytes());
        for offset in self.policy.sample_offsets(size) {
            let len = self.policy.window_size.min(size - offset);
            read_window(&mut file, offset, len, &mut window).map_err(to_err)?;
            hasher.update(&window);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Hash the first window and, for files larger than one window, the
    /// last window.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read.
    pub fn quick_hash(&self, path: &Path, size: u64) -> Result<String, HashError> {
        let to_err = |e: io::Error| HashError::from_io(path.to_path_buf(), e);
        let mut file = File::open(path).map_err(to_err)?;
        let mut hasher = blake3::Hasher::new();
        let mut window = Vec::with_capacity(self.window_len());
        let window_size = self.policy.window_size;

        read_window(&mut file, 0, window_size.min(size), &mut window).map_err(to_err)?;
        hasher.update(&window);

        if size > window_size {
            read_window(&mut file, size - window_size, window_size, &mut window)
                .map_err(to_err)?;
            hasher.update(&window);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    fn window_len(&self) -> usize {
        usize::try_from(self.policy.window_size).unwrap_or(usize::MAX)
    }
}

/// Read up to `len` bytes at `offset` into `buf`, replacing its contents.
///
/// Stops early at end-of-file, so a file that shrank since it was scanned
/// yields a shorter window instead of an error.
fn read_window(file: &mut File, offset: u64, len: u64, buf: &mut Vec<u8>) -> io::Result<()> {
    buf.clear();
    file.seek(SeekFrom::Start(offset))?;
    file.by_ref().take(len).read_to_end(buf)?;
    Ok(())
}
