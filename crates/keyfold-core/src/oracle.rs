//! Collaborator seams: the membership ledger and the content store.
//!
//! Both are external systems reached over the network; every method is a
//! suspension point. Implementations map their own transport failures to
//! [`Unavailable`]; no other error class crosses these seams. Protocol
//! logic stays generic over these traits so tests wire in-memory fakes.

use std::future::Future;

use keyfold_crypto::MemberPublicKey;

use crate::{
    error::Unavailable,
    room::{ContentId, MemberId, RoomId},
};

/// Read-mostly view of the ledger's room membership, plus the message log.
///
/// The ledger is the source of truth for who is in a room and which public
/// key each member registered. Key lists come back in ledger order; callers
/// needing the canonical protocol order build a
/// [`PublicKeySet`](keyfold_crypto::PublicKeySet) from them.
pub trait MembershipOracle: Send + Sync {
    /// Whether `member` currently belongs to `room`.
    fn is_member_of(
        &self,
        room: &RoomId,
        member: &MemberId,
    ) -> impl Future<Output = Result<bool, Unavailable>> + Send;

    /// All current member public keys of `room`, in ledger order.
    fn room_member_public_keys(
        &self,
        room: &RoomId,
    ) -> impl Future<Output = Result<Vec<MemberPublicKey>, Unavailable>> + Send;

    /// The public key `member` registered for `room`. `None` if the member
    /// has no valid key on the ledger.
    fn room_member_public_key(
        &self,
        room: &RoomId,
        member: &MemberId,
    ) -> impl Future<Output = Result<Option<MemberPublicKey>, Unavailable>> + Send;

    /// Whether `room` is private (messages encrypted) or public (stored as
    /// plaintext).
    fn is_room_private(
        &self,
        room: &RoomId,
    ) -> impl Future<Output = Result<bool, Unavailable>> + Send;

    /// Record a message pointer on the ledger.
    fn send_message(
        &self,
        room: &RoomId,
        content: &ContentId,
    ) -> impl Future<Output = Result<(), Unavailable>> + Send;

    /// All message pointers recorded for `room`, oldest first.
    fn messages(
        &self,
        room: &RoomId,
    ) -> impl Future<Output = Result<Vec<ContentId>, Unavailable>> + Send;
}

/// Content-addressed blob store.
///
/// Carries ciphertext blobs (or plaintext for public rooms); the ledger
/// records only the returned identifiers.
pub trait ContentStore: Send + Sync {
    /// Store a blob, returning its content identifier.
    fn put(&self, bytes: Vec<u8>) -> impl Future<Output = Result<ContentId, Unavailable>> + Send;

    /// Fetch a blob by identifier.
    fn get(&self, id: &ContentId) -> impl Future<Output = Result<Vec<u8>, Unavailable>> + Send;
}
