//! Group secret aggregation.
//!
//! Produces one room secret from a room's member key set. The fold is a
//! scalar product modulo the curve order over the canonical (sorted) member
//! set: a member seeds the accumulator with its own term, derived from its
//! private scalar, and multiplies in the x-coordinate term of every *other*
//! member's public point. Because scalar multiplication is commutative and
//! every member's own term equals the term the rest of the room computes
//! from that member's public key, all members converge on the same product
//! regardless of insertion order, and the distribution service can compute
//! the identical product from the public key set alone
//! ([`aggregate_members`]).

use k256::{ProjectivePoint, Scalar, elliptic_curve::sec1::ToEncodedPoint};
use k256::elliptic_curve::ops::Reduce;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    keys::{KeyPair, MemberPublicKey},
};

/// A room's member public keys in canonical order.
///
/// Construction sorts lexicographically on the compressed encoding and drops
/// duplicates, so two sets built from the same members in any order compare
/// equal and fold identically.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PublicKeySet {
    keys: Vec<MemberPublicKey>,
}

impl PublicKeySet {
    /// Build a canonical set from member keys in any order.
    pub fn new(mut keys: Vec<MemberPublicKey>) -> Self {
        keys.sort();
        keys.dedup();
        Self { keys }
    }

    /// Membership generation: the number of distinct member keys.
    pub fn generation(&self) -> u64 {
        self.keys.len() as u64
    }

    /// Number of member keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &MemberPublicKey> {
        self.keys.iter()
    }

    /// True if `key` is in the set.
    pub fn contains(&self, key: &MemberPublicKey) -> bool {
        self.keys.binary_search(key).is_ok()
    }
}

/// A derived room secret tagged with the membership snapshot it came from.
///
/// Valid only against the [`PublicKeySet`] whose `generation()` matches
/// `membership_generation`. Comparison of the key material is constant-time
/// and the material zeroizes on drop.
#[derive(Clone, Serialize, Deserialize)]
pub struct RoomSecret {
    value: [u8; 32],
    membership_generation: u64,
}

impl RoomSecret {
    /// Wrap raw secret material with its membership generation.
    pub fn new(value: [u8; 32], membership_generation: u64) -> Self {
        Self { value, membership_generation }
    }

    /// The 256-bit secret material.
    pub fn value(&self) -> &[u8; 32] {
        &self.value
    }

    /// Member-key count of the snapshot this secret was derived from.
    pub fn membership_generation(&self) -> u64 {
        self.membership_generation
    }

    /// Symmetric key for the envelope codec: SHA-256 of the secret value.
    pub fn symmetric_key(&self) -> zeroize::Zeroizing<[u8; 32]> {
        zeroize::Zeroizing::new(Sha256::digest(self.value).into())
    }
}

impl PartialEq for RoomSecret {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.value.ct_eq(&other.value))
            && self.membership_generation == other.membership_generation
    }
}

impl Eq for RoomSecret {}

impl Drop for RoomSecret {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl std::fmt::Debug for RoomSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSecret")
            .field("value", &"<redacted>")
            .field("membership_generation", &self.membership_generation)
            .finish()
    }
}

/// Derive the room secret as one member of the room.
///
/// The accumulator is seeded with the caller's own term, computed from its
/// private scalar, and folded over every member key in `members` except the
/// caller's own encoding. The secret value is SHA-256 of the accumulated
/// scalar's big-endian bytes, tagged with `members.generation()`.
///
/// # Errors
///
/// - [`CryptoError::NoMembers`] if `members` is empty.
pub fn aggregate(key_pair: &KeyPair, members: &PublicKeySet) -> Result<RoomSecret, CryptoError> {
    if members.is_empty() {
        return Err(CryptoError::NoMembers);
    }

    let own_encoding = key_pair.public().to_bytes();
    let mut acc = own_term(key_pair);
    for key in members.iter() {
        if key.to_bytes() == own_encoding {
            continue;
        }
        acc *= key.x_scalar();
    }

    Ok(finish(acc, members.generation()))
}

/// Derive the room secret from the public key set alone.
///
/// Used by the distribution service, which holds no member private key. For
/// any member of `members`, this produces the same secret as [`aggregate`].
///
/// # Errors
///
/// - [`CryptoError::NoMembers`] if `members` is empty.
pub fn aggregate_members(members: &PublicKeySet) -> Result<RoomSecret, CryptoError> {
    if members.is_empty() {
        return Err(CryptoError::NoMembers);
    }

    let mut acc = Scalar::from(1u64);
    for key in members.iter() {
        acc *= key.x_scalar();
    }

    Ok(finish(acc, members.generation()))
}

/// The caller's own fold term, derived from its private scalar.
///
/// scalar·G recovers the caller's public point; the term is that point's
/// x-coordinate reduced modulo the curve order, which is exactly what other
/// members compute for this member from the public key set.
fn own_term(key_pair: &KeyPair) -> Scalar {
    let point = (ProjectivePoint::GENERATOR * *key_pair.secret_scalar()).to_affine();
    let encoded = point.to_encoded_point(false);
    let Some(x) = encoded.x() else {
        unreachable!("a non-zero scalar times the generator is never the identity")
    };
    <Scalar as Reduce<k256::U256>>::reduce_bytes(x)
}

fn finish(acc: Scalar, generation: u64) -> RoomSecret {
    RoomSecret::new(Sha256::digest(acc.to_bytes()).into(), generation)
}
