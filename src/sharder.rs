use std::io::Cursor;

/// Seed the flag service hashes bucketing keys with.
const SEED: u32 = u32::MAX;

/// Maps a bucketing key to a bucket in `1..=total_buckets`.
pub trait Sharder {
    fn get_bucket(&self, input: &str, total_buckets: u32) -> u32;
}

/// Buckets by the 32-bit x86 variant of MurmurHash3, the hash the flag service uses for
/// percentage rollouts.
pub struct Murmur3Sharder;

impl Sharder for Murmur3Sharder {
    fn get_bucket(&self, input: &str, total_buckets: u32) -> u32 {
        // Reading from an in-memory buffer cannot fail.
        let hash =
            murmur3::murmur3_32(&mut Cursor::new(input.as_bytes()), SEED).unwrap_or_default();
        hash % total_buckets + 1
    }
}

#[cfg(test)]
pub struct DeterministicSharder(pub std::collections::HashMap<String, u32>);

#[cfg(test)]
impl Sharder for DeterministicSharder {
    fn get_bucket(&self, input: &str, total_buckets: u32) -> u32 {
        self.0.get(input).copied().unwrap_or(1).clamp(1, total_buckets)
    }
}
