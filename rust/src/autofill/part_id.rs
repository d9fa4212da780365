//! Content-addressed ids for synthesized parts.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Unseeded 64-bit digest of `value`, as 16 lowercase hex digits.
///
/// Stable across runs of the same build, unlike `std`'s randomized hasher.
pub fn stable_hash(value: &str) -> String {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Id of the part that represents `resource_id` inside `group_id`.
pub fn autofill_part_id(group_id: &str, resource_id: &str) -> String {
    format!("{}_af_{}", group_id, stable_hash(resource_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_hash_is_deterministic() {
        assert_eq!(stable_hash("casparcg0_AMB"), stable_hash("casparcg0_AMB"));
        assert_ne!(stable_hash("casparcg0_AMB"), stable_hash("casparcg0_GO1080P25"));
        assert_eq!(stable_hash("x").len(), 16);
    }

    #[test]
    fn test_part_id_layout() {
        let id = autofill_part_id("group1", "media_a");
        assert!(id.starts_with("group1_af_"));
        assert_eq!(id, format!("group1_af_{}", stable_hash("media_a")));
        assert_ne!(id, autofill_part_id("group2", "media_a"));
    }
}
