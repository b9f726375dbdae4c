//! The secret-distribution service.
//!
//! Serves the two negotiation round trips for members who want the
//! already-agreed room secret without computing it locally. The service
//! holds no member private key: it derives the same secret from the
//! ledger's public key set alone.
//!
//! Per-room records (outstanding nonce, cached secret) follow a
//! last-write-wins lifecycle with no cross-room locking. Concurrent
//! negotiations for the same room may overwrite each other's nonce; the
//! loser fails with `InvalidNonce` and restarts from the challenge step.

use keyfold_core::{
    Environment, MembershipOracle, PublicKeySet,
    error::{DenialReason, Unavailable},
    room::{MemberId, NONCE_SIZE, NonceChallenge, RoomId},
    wire::{ChallengeRequest, ChallengeResponse, ErrorBody, SecretRequest, SecretResponse},
};
use keyfold_crypto::{
    KeyPair, MemberPublicKey, SEAL_NONCE_SIZE, SIGNATURE_SIZE, aggregate_members, open, seal,
    verify_signature,
};
use thiserror::Error;

use crate::storage::{Storage, StorageError, StoredSecret};

/// Validity window of a cached room secret, in seconds (10 days).
pub const SECRET_VALIDITY_SECS: u64 = 10 * 24 * 60 * 60;

/// Errors from the negotiation handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The request was denied; maps to a 403/404 response.
    #[error(transparent)]
    Denied(#[from] DenialReason),

    /// The ledger could not be reached.
    #[error(transparent)]
    Unavailable(#[from] Unavailable),

    /// Service storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ServiceError {
    /// HTTP status a transport adapter should map this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Denied(reason) => reason.http_status(),
            Self::Unavailable(_) => 503,
            Self::Storage(_) => 500,
        }
    }

    /// The `{error}` body of a denial response.
    pub fn error_body(&self) -> ErrorBody {
        ErrorBody { error: self.to_string() }
    }
}

/// The negotiation service for one deployment.
///
/// Holds the service key pair (generated at construction from the
/// environment) that callers seal challenge answers toward.
pub struct NegotiationService<S, O, E> {
    storage: S,
    oracle: O,
    env: E,
    key_pair: KeyPair,
}

impl<S: Storage, O: MembershipOracle, E: Environment> NegotiationService<S, O, E> {
    /// Create a service with a fresh key pair from the environment.
    pub fn new(storage: S, oracle: O, env: E) -> Self {
        // A seed reducing to zero is rejected by from_seed; redraw
        let key_pair = loop {
            if let Ok(pair) = KeyPair::from_seed(env.random_array()) {
                break pair;
            }
        };
        Self { storage, oracle, env, key_pair }
    }

    /// The service's public key, as handed out in challenge responses.
    pub fn public_key(&self) -> &MemberPublicKey {
        self.key_pair.public()
    }

    /// Handle the challenge round trip (`GET /secret/{roomId}`).
    ///
    /// Verifies membership and key ownership, then returns the room's nonce
    /// sealed toward the caller. The nonce is minted fresh when none exists
    /// or the room's membership generation moved; otherwise the stored one
    /// is reused.
    ///
    /// # Errors
    ///
    /// - [`DenialReason::MembershipOrKeyMismatch`] if the caller is not a
    ///   member or the supplied key does not match the ledger record. The
    ///   two cases are deliberately not distinguishable.
    pub async fn handle_challenge(
        &self,
        room: &RoomId,
        request: &ChallengeRequest,
    ) -> Result<ChallengeResponse, ServiceError> {
        let caller = self.authorize(room, request.parse_public_key().ok(), &request.member_id()).await?;
        let members = self.current_members(room).await?;

        let challenge = self.fetch_or_mint_nonce(room, members.generation())?;
        let sealed = self.seal_toward(&caller, &challenge.nonce);
        Ok(ChallengeResponse::new(&sealed, self.key_pair.public()))
    }

    /// Handle the secret round trip (`POST /secret/{roomId}`).
    ///
    /// Opens the sealed challenge answer, verifies the signature over the
    /// stored nonce with the caller's ledger key, then serves the cached
    /// secret (if within its validity window) or recomputes it from the
    /// current ledger key set and persists it.
    ///
    /// # Errors
    ///
    /// - [`DenialReason::NonceNotFound`] if the challenge step was skipped.
    /// - [`DenialReason::MembershipOrKeyMismatch`] as in the challenge step.
    /// - [`DenialReason::InvalidNonce`] if the answer does not open, parse,
    ///   or verify against the stored nonce. Stale answers after a nonce
    ///   rotation land here.
    pub async fn handle_secret(
        &self,
        room: &RoomId,
        request: &SecretRequest,
    ) -> Result<SecretResponse, ServiceError> {
        let Some(challenge) = self.storage.load_nonce(room)? else {
            tracing::warn!(%room, "secret requested without a challenge");
            return Err(DenialReason::NonceNotFound.into());
        };

        let caller = self.authorize(room, request.parse_public_key().ok(), &request.member_id()).await?;
        self.verify_answer(room, request, &caller, &challenge)?;

        let now = self.env.unix_time_secs();
        let cached = self.storage.load_secret(room)?.filter(|record| {
            // Strict boundary: expired at exactly created + window
            now < record.created_at_secs + SECRET_VALIDITY_SECS
        });

        let secret = match cached {
            Some(record) => record.secret,
            None => {
                let members = self.current_members(room).await?;
                let Ok(secret) = aggregate_members(&members) else {
                    // The room can empty out between the authorization read
                    // and this one; deny like any other membership failure
                    tracing::warn!(%room, "member set emptied out before derivation");
                    return Err(DenialReason::MembershipOrKeyMismatch.into());
                };
                tracing::debug!(
                    %room,
                    generation = secret.membership_generation(),
                    "computed and cached a fresh room secret"
                );
                self.storage
                    .store_secret(room, &StoredSecret { secret: secret.clone(), created_at_secs: now })?;
                secret
            },
        };

        let mut plaintext = Vec::new();
        ciborium::into_writer(&secret, &mut plaintext)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(SecretResponse::new(&self.seal_toward(&caller, &plaintext)))
    }

    /// Membership and key-ownership check shared by both handlers.
    ///
    /// Every failure mode (malformed key, non-member, no ledger key, key
    /// mismatch) collapses into the same denial so callers cannot probe
    /// membership.
    async fn authorize(
        &self,
        room: &RoomId,
        supplied: Option<MemberPublicKey>,
        member: &MemberId,
    ) -> Result<MemberPublicKey, ServiceError> {
        let denied = || {
            tracing::warn!(%room, %member, "membership or key mismatch");
            ServiceError::from(DenialReason::MembershipOrKeyMismatch)
        };

        let Some(supplied) = supplied else {
            return Err(denied());
        };
        if !self.oracle.is_member_of(room, member).await? {
            return Err(denied());
        }
        let Some(ledger_key) = self.oracle.room_member_public_key(room, member).await? else {
            return Err(denied());
        };
        if ledger_key != supplied {
            return Err(denied());
        }
        Ok(ledger_key)
    }

    fn verify_answer(
        &self,
        room: &RoomId,
        request: &SecretRequest,
        ledger_key: &MemberPublicKey,
        challenge: &NonceChallenge,
    ) -> Result<(), ServiceError> {
        let invalid = || {
            tracing::warn!(%room, "challenge answer did not verify");
            ServiceError::from(DenialReason::InvalidNonce)
        };

        let Ok(sealed) = request.sealed_answer() else {
            return Err(invalid());
        };
        let Ok(answer) = open(&self.key_pair, &sealed) else {
            return Err(invalid());
        };
        let Ok(signature) = <[u8; SIGNATURE_SIZE]>::try_from(answer.as_slice()) else {
            return Err(invalid());
        };
        verify_signature(ledger_key, &challenge.nonce, &signature).map_err(|_| invalid())
    }

    fn fetch_or_mint_nonce(
        &self,
        room: &RoomId,
        generation: u64,
    ) -> Result<NonceChallenge, StorageError> {
        if let Some(existing) = self.storage.load_nonce(room)? {
            if existing.membership_generation == generation {
                return Ok(existing);
            }
        }

        let challenge = NonceChallenge {
            nonce: self.env.random_array::<NONCE_SIZE>(),
            membership_generation: generation,
            created_at_secs: self.env.unix_time_secs(),
        };
        tracing::debug!(%room, generation, "minted a fresh nonce challenge");
        self.storage.store_nonce(room, &challenge)?;
        Ok(challenge)
    }

    async fn current_members(&self, room: &RoomId) -> Result<PublicKeySet, Unavailable> {
        let keys = self.oracle.room_member_public_keys(room).await?;
        Ok(PublicKeySet::new(keys))
    }

    fn seal_toward(&self, recipient: &MemberPublicKey, plaintext: &[u8]) -> Vec<u8> {
        let nonce: [u8; SEAL_NONCE_SIZE] = self.env.random_array();
        // A seed reducing to zero is rejected by seal; redraw
        loop {
            if let Ok(sealed) = seal(recipient, plaintext, self.env.random_array(), nonce) {
                return sealed;
            }
        }
    }
}
