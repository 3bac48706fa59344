//! Keccak-256 commitments submitted to the incentive layer.

use alloy_primitives::keccak256;
use vsolve_types::Hash32;

use crate::TaskSecret;

/// Keccak-256 of arbitrary data.
pub fn keccak(data: &[u8]) -> Hash32 {
    keccak256(data)
}

/// Hash registered alongside a task registration; the secret itself is only
/// disclosed when the solution is revealed.
pub fn hash_secret(secret: &TaskSecret) -> Hash32 {
    keccak256(secret.as_bytes())
}

/// Value committed for a solution: the hash of the result hash. The reveal
/// later discloses enough state for the ledger to recompute both layers.
pub fn solution_commitment(result_hash: &Hash32) -> Hash32 {
    keccak256(result_hash.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_of_empty_input_matches_known_vector() {
        assert_eq!(
            keccak(b"").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn commitment_is_double_layered() {
        let result = keccak(b"result");
        let commitment = solution_commitment(&result);
        assert_ne!(commitment, result);
        assert_eq!(commitment, keccak(result.as_slice()));
    }

    #[test]
    fn secret_hash_is_deterministic() {
        let secret = TaskSecret::from_bytes([7u8; 32]);
        assert_eq!(hash_secret(&secret), hash_secret(&secret));
        assert_ne!(hash_secret(&secret), Hash32::ZERO);
    }
}
