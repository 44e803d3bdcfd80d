use serde::Serialize;
use std::num::Wrapping;

/// When we have separate values it's useful to run a progressive
/// version of djb2 where we pretend that we're still looping over
/// the same value
pub fn progressive_hash<V: Serialize>(h: u64, x: &V) -> u64 {
    // bincode only fails on sequences of unknown length, which JSON values never are
    let x = bincode::serialize(x).unwrap_or_default();

    let mut h = Wrapping(h);

    for byte in x {
        h = (h << 5) + h + Wrapping(byte as u64)
    }

    h.0
}
