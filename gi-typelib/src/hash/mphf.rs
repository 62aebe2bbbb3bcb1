//! Minimal perfect hash function (hash-and-displace)
//!
//! Keys are hashed into three words. The first picks a bucket, the other two
//! give a start slot `f` and a stride `h`. Each bucket stores one displacement
//! `d = p0 + p1 * n`; a key lands on `(f + h * p0 + p1) % n`. Buckets are
//! placed largest first, probing displacements until every key of the bucket
//! hits a free slot.
//!
//! Packed layout (native endian u32 words):
//! `[n][n_buckets][seed][displacement; n_buckets]`.

use crate::config::HashConfig;
use crate::core::bytes::{self, u32_at};
use crate::error::{Result, TypelibError};
use tracing::trace;

const PACKED_HEADER_SIZE: usize = 12;

/// Jenkins lookup2 mixing step
#[inline]
fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 13);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 8);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 13);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 12);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 16);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 5);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 3);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 10);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 15);
}

#[inline]
fn word(k: &[u8]) -> u32 {
    k.iter()
        .take(4)
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc.wrapping_add(u32::from(b) << (8 * i)))
}

/// Hash `key` into three 32-bit words
pub fn hash_vector(seed: u32, key: &[u8]) -> [u32; 3] {
    let mut a: u32 = 0x9e37_79b9;
    let mut b: u32 = 0x9e37_79b9;
    let mut c: u32 = seed;

    let mut chunks = key.chunks_exact(12);
    for chunk in &mut chunks {
        a = a.wrapping_add(word(&chunk[0..4]));
        b = b.wrapping_add(word(&chunk[4..8]));
        c = c.wrapping_add(word(&chunk[8..12]));
        mix(&mut a, &mut b, &mut c);
    }

    let rest = chunks.remainder();
    c = c.wrapping_add(key.len() as u32);
    // The low byte of `c` is reserved for the length
    if rest.len() > 8 {
        c = c.wrapping_add(word(&rest[8..]) << 8);
    }
    if rest.len() > 4 {
        b = b.wrapping_add(word(&rest[4..rest.len().min(8)]));
    }
    if !rest.is_empty() {
        a = a.wrapping_add(word(&rest[..rest.len().min(4)]));
    }
    mix(&mut a, &mut b, &mut c);
    [a, b, c]
}

#[derive(Debug, Clone, Copy)]
struct Probe {
    bucket: u32,
    start: u32,
    stride: u32,
}

impl Probe {
    fn new(seed: u32, key: &[u8], n: u32, n_buckets: u32) -> Self {
        let [h0, h1, h2] = hash_vector(seed, key);
        Probe {
            bucket: h0 % n_buckets,
            start: h1 % n,
            stride: if n > 1 { h2 % (n - 1) + 1 } else { 1 },
        }
    }

    #[inline]
    fn position(self, displacement: u32, n: u32) -> u32 {
        let p0 = u64::from(displacement % n);
        let p1 = u64::from(displacement / n);
        ((u64::from(self.start) + u64::from(self.stride) * p0 + p1) % u64::from(n)) as u32
    }
}

/// A generated minimal perfect hash over a fixed key set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfectHash {
    n: u32,
    seed: u32,
    displacements: Vec<u32>,
}

impl PerfectHash {
    /// Generate a function mapping each of `keys` to a distinct slot in `[0, n)`.
    ///
    /// Keys must be distinct; duplicates make the search fail with
    /// [`TypelibError::Unbuildable`].
    pub fn generate<K: AsRef<[u8]>>(keys: &[K], config: &HashConfig) -> Result<Self> {
        let n = u32::try_from(keys.len())
            .map_err(|_| TypelibError::Unbuildable(format!("{} keys", keys.len())))?;
        if n == 0 {
            return Err(TypelibError::Unbuildable("empty key set".into()));
        }
        let n_buckets = n.div_ceil(config.bucket_load.max(1));

        let mut seed = config.seed;
        for attempt in 0..config.max_attempts.max(1) {
            if let Some(displacements) = Self::search(keys, n, n_buckets, seed, config.max_probes)
            {
                trace!(keys = n, buckets = n_buckets, attempt, "perfect hash generated");
                return Ok(PerfectHash {
                    n,
                    seed,
                    displacements,
                });
            }
            seed = seed.wrapping_mul(0x0101_0101).wrapping_add(0x7f4a_7c15 ^ attempt);
        }
        Err(TypelibError::Unbuildable(format!(
            "no displacement found for {n} keys after {} seeds",
            config.max_attempts
        )))
    }

    fn search<K: AsRef<[u8]>>(
        keys: &[K],
        n: u32,
        n_buckets: u32,
        seed: u32,
        max_probes: u32,
    ) -> Option<Vec<u32>> {
        let probes: Vec<Probe> = keys
            .iter()
            .map(|k| Probe::new(seed, k.as_ref(), n, n_buckets))
            .collect();

        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); n_buckets as usize];
        for (i, probe) in probes.iter().enumerate() {
            buckets[probe.bucket as usize].push(i);
        }
        let mut order: Vec<usize> = (0..buckets.len()).collect();
        order.sort_by(|&a, &b| buckets[b].len().cmp(&buckets[a].len()).then(a.cmp(&b)));

        let mut taken = vec![false; n as usize];
        let mut displacements = vec![0u32; n_buckets as usize];
        let mut slots: Vec<u32> = Vec::new();
        let limit = u64::from(n) * u64::from(n);

        for bucket in order {
            let members = &buckets[bucket];
            if members.is_empty() {
                break;
            }
            let mut placed = false;
            let mut displacement: u64 = 0;
            let mut tries: u32 = 0;
            while displacement < limit && tries < max_probes {
                slots.clear();
                let fits = members.iter().all(|&k| {
                    let slot = probes[k].position(displacement as u32, n);
                    if taken[slot as usize] || slots.contains(&slot) {
                        false
                    } else {
                        slots.push(slot);
                        true
                    }
                });
                if fits {
                    for &slot in &slots {
                        taken[slot as usize] = true;
                    }
                    displacements[bucket] = displacement as u32;
                    placed = true;
                    break;
                }
                displacement += 1;
                tries += 1;
            }
            if !placed {
                return None;
            }
        }
        Some(displacements)
    }

    /// Number of keys
    pub fn len(&self) -> u32 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Evaluate on `key`. Keys outside the original set still map into `[0, n)`.
    pub fn evaluate(&self, key: &[u8]) -> u32 {
        let n_buckets = self.displacements.len() as u32;
        let probe = Probe::new(self.seed, key, self.n, n_buckets);
        probe.position(self.displacements[probe.bucket as usize], self.n)
    }

    /// Size of the packed representation in bytes
    pub fn packed_size(&self) -> usize {
        PACKED_HEADER_SIZE + 4 * self.displacements.len()
    }

    /// Serialize into `out`, which must hold at least [`Self::packed_size`] bytes
    pub fn pack(&self, out: &mut [u8]) -> Result<()> {
        let size = self.packed_size();
        let out = out.get_mut(..size).ok_or_else(|| {
            TypelibError::precondition("PerfectHash::pack", format!("need {size} bytes"))
        })?;
        let words = [self.n, self.displacements.len() as u32, self.seed]
            .into_iter()
            .chain(self.displacements.iter().copied());
        for (chunk, value) in out.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        Ok(())
    }
}

/// Evaluate a packed function without unpacking it
pub fn evaluate_packed(packed: &[u8], key: &[u8]) -> Result<u32> {
    let n = u32_at(packed, 0)?;
    let n_buckets = u32_at(packed, 4)?;
    let seed = u32_at(packed, 8)?;
    if n == 0 || n_buckets == 0 {
        return Err(TypelibError::Invalid("Empty perfect hash function".into()));
    }
    let probe = Probe::new(seed, key, n, n_buckets);
    let at = bytes::record_offset(PACKED_HEADER_SIZE as u32, probe.bucket, 4)?;
    Ok(probe.position(u32_at(packed, at)?, n))
}

/// Size in bytes of a packed function, read from its own header. The header
/// must describe a non-empty function whose displacements lie inside `packed`.
pub fn packed_size(packed: &[u8]) -> Result<usize> {
    let n = u32_at(packed, 0)?;
    let n_buckets = u32_at(packed, 4)?;
    if n == 0 || n_buckets == 0 {
        return Err(TypelibError::Invalid("Empty perfect hash function".into()));
    }
    let size = bytes::record_offset(PACKED_HEADER_SIZE as u32, n_buckets, 4)?;
    bytes::ensure_fits(packed, 0, size as usize)?;
    Ok(size as usize)
}
