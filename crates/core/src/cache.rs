//! Balance-recovery cache: a bounded, TTL-evicting map from group-element
//! fingerprints to the small integers they decode to, seeded from a file
//! or a starting range and falling back to a bounded discrete-log search.
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use sha3::{Digest, Keccak256};

use crate::error::CacheError;
use crate::group::generator;

const DEFAULT_TTL_SECS: u64 = 100_000;
const DEFAULT_MAX_KEYS: usize = 200_000;
const INF_KEY: &str = "INF";

struct Entry {
    value: u64,
    expires_at: Instant,
}

/// Balance-recovery cache. Not `Send`/`Sync`-shared directly; callers that
/// need to share one across async tasks wrap it in a `tokio::sync::Mutex`,
/// consistent with it being "in-memory, exclusive to one process".
pub struct BalanceCache {
    entries: HashMap<String, Entry>,
    ttl: Duration,
    max_keys: usize,
    b_max: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

impl BalanceCache {
    pub fn new(b_max: u64) -> Self {
        Self::with_limits(b_max, Duration::from_secs(DEFAULT_TTL_SECS), DEFAULT_MAX_KEYS)
    }

    pub fn with_limits(b_max: u64, ttl: Duration, max_keys: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_keys,
            b_max,
            hits: 0,
            misses: 0,
        }
    }

    fn key_for(point: &RistrettoPoint) -> String {
        if *point == RistrettoPoint::identity() {
            return INF_KEY.to_string();
        }
        let bytes = point.compress().to_bytes();
        let mut hasher = Keccak256::new();
        hasher.update(bytes);
        format!("0x{}", hex::encode(hasher.finalize()))
    }

    /// Look up `point`'s decoded balance, resolving on miss via
    /// `resolve` (typically the discrete-log fallback below).
    pub fn get<F>(&mut self, point: &RistrettoPoint, resolve: F) -> Result<u64, CacheError>
    where
        F: FnOnce(&RistrettoPoint) -> Result<u64, CacheError>,
    {
        let key = Self::key_for(point);
        let now = Instant::now();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.expires_at = now + self.ttl;
            self.hits += 1;
            return Ok(entry.value);
        }

        self.misses += 1;
        let value = resolve(point)?;
        self.insert(key, value);
        Ok(value)
    }

    fn insert(&mut self, key: String, value: u64) {
        if self.entries.len() >= self.max_keys && !self.entries.contains_key(&key) {
            return;
        }
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            keys: self.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bounded discrete-log recovery: `b` such that `g^b == point`.
    pub fn invert_g_balance(&self, point: &RistrettoPoint) -> Result<u64, CacheError> {
        let mut acc = RistrettoPoint::identity();
        let g = generator();
        for b in 0..self.b_max {
            if acc == *point {
                return Ok(b);
            }
            acc += g;
        }
        Err(CacheError::CannotInvert(self.b_max))
    }

    /// Seed `[start, start + count)` by direct scalar multiplication,
    /// stopping silently once `max_keys` is reached.
    pub fn populate_balance_range(&mut self, start: u64, count: u64) {
        let g = generator();
        let mut acc = g * Scalar::from(start);
        for b in start..start.saturating_add(count) {
            if self.entries.len() >= self.max_keys {
                return;
            }
            let key = Self::key_for(&acc);
            self.insert(key, b);
            acc += g;
        }
    }

    /// Remove `[start, start + count)` from the cache, the inverse of
    /// `populate_balance_range`.
    pub fn del_balance_range(&mut self, start: u64, count: u64) {
        let g = generator();
        let mut acc = g * Scalar::from(start);
        for _ in start..start.saturating_add(count) {
            let key = Self::key_for(&acc);
            self.entries.remove(&key);
            acc += g;
        }
    }

    /// Seed from a CSV file with header `key,value`. Malformed or
    /// out-of-pattern rows are skipped silently; a missing file or an
    /// unparseable header fails the whole call.
    pub fn populate_cache_from_file(&mut self, path: &Path) -> Result<(), CacheError> {
        if !path.exists() {
            return Err(CacheError::FileNotFound(path.display().to_string()));
        }
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        if headers.get(0) != Some("key") || headers.get(1) != Some("value") {
            return Err(CacheError::FileNotWellFormed(path.display().to_string()));
        }

        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(_) => continue,
            };
            let (Some(key), Some(value)) = (record.get(0), record.get(1)) else {
                continue;
            };
            if !is_well_formed_key(key) {
                continue;
            }
            let Ok(value) = value.parse::<u64>() else {
                continue;
            };
            if self.entries.len() >= self.max_keys {
                break;
            }
            self.insert(key.to_string(), value);
        }
        Ok(())
    }
}

fn is_well_formed_key(key: &str) -> bool {
    let Some(hex_part) = key.strip_prefix("0x") else {
        return false;
    };
    hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}
