//! Property-based tests for aggregation and the envelope codec
//!
//! These verify the protocol's load-bearing invariants for ALL inputs, not
//! just specific examples: every member of a room derives the same secret
//! regardless of key-list order, envelopes round-trip, and any single-bit
//! tamper is rejected.

use keyfold_crypto::{
    CryptoError, KeyPair, PublicKeySet, RoomSecret, aggregate, aggregate_members, decrypt,
    encrypt,
};
use proptest::prelude::*;

/// A generated room roster.
///
/// `KeyPair` deliberately has no `Debug`; proptest requires one on every
/// strategy value, so failing cases render only the public keys.
struct Roster(Vec<KeyPair>);

impl std::fmt::Debug for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter().map(|pair| pair.public().to_bytes())).finish()
    }
}

/// Strategy for a set of 2..=6 distinct key pairs.
fn arbitrary_roster() -> impl Strategy<Value = Roster> {
    prop::collection::hash_set(any::<[u8; 32]>(), 2..=6).prop_filter_map(
        "seeds must reduce to non-zero scalars",
        |seeds| {
            let pairs: Vec<KeyPair> =
                seeds.into_iter().filter_map(|seed| KeyPair::from_seed(seed).ok()).collect();
            (pairs.len() >= 2).then_some(Roster(pairs))
        },
    )
}

#[test]
fn prop_all_members_agree_under_any_permutation() {
    proptest!(|(roster in arbitrary_roster(), shuffle_seed in any::<u64>())| {
        let pairs = &roster.0;
        let mut keys: Vec<_> = pairs.iter().map(|p| p.public().clone()).collect();

        // Cheap deterministic shuffle; PublicKeySet must canonicalize it away
        let mut state = shuffle_seed;
        for i in (1..keys.len()).rev() {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            keys.swap(i, (state % (i as u64 + 1)) as usize);
        }
        let members = PublicKeySet::new(keys);

        let reference = aggregate(&pairs[0], &members).unwrap();
        for pair in &pairs[1..] {
            let secret = aggregate(pair, &members).unwrap();
            prop_assert_eq!(&secret, &reference, "members must agree on the room secret");
        }

        // PROPERTY: the service's public-only derivation matches the members'
        let service = aggregate_members(&members).unwrap();
        prop_assert_eq!(&service, &reference);
        prop_assert_eq!(reference.membership_generation(), members.generation());
    });
}

#[test]
fn prop_envelope_roundtrip() {
    proptest!(|(value in any::<[u8; 32]>(),
                plaintext in prop::collection::vec(any::<u8>(), 0..512),
                iv in any::<[u8; 16]>())| {
        let secret = RoomSecret::new(value, 1);
        let envelope = encrypt(&secret, &plaintext, iv);
        let decrypted = decrypt(&secret, &envelope).unwrap();
        prop_assert_eq!(decrypted, plaintext);
    });
}

#[test]
fn prop_any_bit_flip_is_rejected() {
    proptest!(|(value in any::<[u8; 32]>(),
                plaintext in prop::collection::vec(any::<u8>(), 1..128),
                iv in any::<[u8; 16]>(),
                flip in any::<prop::sample::Index>())| {
        let secret = RoomSecret::new(value, 1);
        let mut envelope = encrypt(&secret, &plaintext, iv);

        // Flip one bit anywhere in ciphertext ‖ tag
        let total_bits = (envelope.ciphertext.len() + envelope.auth_tag.len()) * 8;
        let bit = flip.index(total_bits);
        let (byte, mask) = (bit / 8, 1u8 << (bit % 8));
        if byte < envelope.ciphertext.len() {
            envelope.ciphertext[byte] ^= mask;
        } else {
            envelope.auth_tag[byte - envelope.ciphertext.len()] ^= mask;
        }

        prop_assert_eq!(decrypt(&secret, &envelope), Err(CryptoError::AuthenticationFailed));
    });
}
