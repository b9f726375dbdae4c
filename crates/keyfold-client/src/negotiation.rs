//! Client side of the nonce challenge-response negotiation.
//!
//! Two round trips against the distribution service:
//!
//! 1. request a challenge, open the sealed nonce with the device key
//! 2. sign the nonce, seal the signature toward the service key, and
//!    exchange it for the sealed room secret
//!
//! [`Negotiation`] is the sans-IO state machine: it consumes responses and
//! produces the next request without touching the network.
//! [`NegotiationClient`] drives it over a [`NegotiationTransport`]. The
//! machine is linear; any failure parks it in [`NegotiationState::Failed`]
//! and a fresh negotiation restarts from the challenge step. A nonce answer
//! is never resubmitted.

use std::future::Future;

use keyfold_core::{
    Environment, RoomSecret,
    error::Unavailable,
    room::{MemberId, RoomId},
    wire::{ChallengeRequest, ChallengeResponse, SecretRequest, SecretResponse},
};
use keyfold_crypto::{KeyPair, MemberPublicKey, SEAL_NONCE_SIZE, open, seal};
use thiserror::Error;

use crate::error::ClientError;

/// Transport failures as seen by the negotiation client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The service answered with a denial status and error body.
    #[error("denied ({status}): {error}")]
    Denied {
        /// HTTP-shaped status code.
        status: u16,
        /// Error body text.
        error: String,
    },

    /// The service could not be reached.
    #[error(transparent)]
    Unavailable(#[from] Unavailable),
}

/// Carries negotiation payloads to the distribution service.
///
/// The production adapter speaks HTTP; tests wire the service in-process.
pub trait NegotiationTransport: Send + Sync {
    /// Execute the challenge round trip for `room`.
    fn request_challenge(
        &self,
        room: &RoomId,
        request: &ChallengeRequest,
    ) -> impl Future<Output = Result<ChallengeResponse, TransportError>> + Send;

    /// Execute the secret round trip for `room`.
    fn request_secret(
        &self,
        room: &RoomId,
        request: &SecretRequest,
    ) -> impl Future<Output = Result<SecretResponse, TransportError>> + Send;
}

/// Progress of one negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No round trip issued yet.
    Idle,
    /// Challenge request produced; awaiting the sealed nonce.
    NonceRequested,
    /// Nonce opened and signed; answer produced.
    NonceSigned,
    /// Sealed secret received and opened.
    SecretReceived,
    /// The negotiation failed; restart from the challenge step.
    Failed,
}

/// Sans-IO negotiation state machine for one device identity.
///
/// Holds no transport. Callers feed it responses and send the requests it
/// produces; a terminal [`NegotiationState::Failed`] machine refuses further
/// input.
pub struct Negotiation<E> {
    env: E,
    key_pair: KeyPair,
    member_id: MemberId,
    state: NegotiationState,
}

impl<E: Environment> Negotiation<E> {
    /// Create an idle machine for the given device identity.
    pub fn new(env: E, key_pair: KeyPair, member_id: MemberId) -> Self {
        Self { env, key_pair, member_id, state: NegotiationState::Idle }
    }

    /// Current state, for observability.
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Begin a negotiation, producing the challenge request.
    ///
    /// Resets any previous progress: a failed or completed machine starts
    /// over from the challenge step.
    pub fn start(&mut self) -> ChallengeRequest {
        self.state = NegotiationState::NonceRequested;
        ChallengeRequest::new(&self.member_id, self.key_pair.public())
    }

    /// Consume the challenge response, producing the secret request.
    ///
    /// Opens the sealed nonce with the device key, signs it, and seals the
    /// signature toward the service key.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Protocol`] if called out of order, a field fails to
    ///   parse, or the sealed nonce does not open with the device key.
    pub fn on_challenge(
        &mut self,
        response: &ChallengeResponse,
    ) -> Result<SecretRequest, ClientError> {
        if self.state != NegotiationState::NonceRequested {
            return Err(self.fail("challenge response arrived out of order"));
        }

        let sealed_nonce = match response.sealed_nonce() {
            Ok(bytes) => bytes,
            Err(error) => return Err(self.fail(format!("challenge field: {error}"))),
        };
        let service_key = match response.parse_service_key() {
            Ok(key) => key,
            Err(error) => return Err(self.fail(format!("servicePublicKey field: {error}"))),
        };
        let nonce = match open(&self.key_pair, &sealed_nonce) {
            Ok(bytes) => bytes,
            Err(_) => return Err(self.fail("sealed nonce did not open with the device key")),
        };

        let signature = self.key_pair.sign(&nonce);
        let sealed_answer = self.seal_toward(&service_key, &signature);
        self.state = NegotiationState::NonceSigned;
        Ok(SecretRequest::new(&self.member_id, self.key_pair.public(), &sealed_answer))
    }

    /// Consume the secret response, yielding the room secret.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Protocol`] if called out of order, the field fails
    ///   to decode, the sealed record does not open with the device key, or
    ///   the opened record is not valid CBOR.
    pub fn on_secret(&mut self, response: &SecretResponse) -> Result<RoomSecret, ClientError> {
        if self.state != NegotiationState::NonceSigned {
            return Err(self.fail("secret response arrived out of order"));
        }

        let sealed = match response.sealed_secret() {
            Ok(bytes) => bytes,
            Err(error) => return Err(self.fail(format!("secret field: {error}"))),
        };
        let plaintext = match open(&self.key_pair, &sealed) {
            Ok(bytes) => bytes,
            Err(_) => return Err(self.fail("sealed secret did not open with the device key")),
        };
        let secret: RoomSecret = match ciborium::de::from_reader(plaintext.as_slice()) {
            Ok(secret) => secret,
            Err(error) => return Err(self.fail(format!("secret record is not valid CBOR: {error}"))),
        };

        self.state = NegotiationState::SecretReceived;
        Ok(secret)
    }

    /// Record a transport-level failure, making the machine terminal.
    pub fn on_transport_failure(&mut self) {
        self.state = NegotiationState::Failed;
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

    fn fail(&mut self, message: impl Into<String>) -> ClientError {
        self.state = NegotiationState::Failed;
        ClientError::Protocol(message.into())
    }
}

/// Drives the negotiation machine over a transport.
pub struct NegotiationClient<T, E> {
    transport: T,
    machine: Negotiation<E>,
}

impl<T: NegotiationTransport, E: Environment> NegotiationClient<T, E> {
    /// Create a client for the given device identity.
    pub fn new(transport: T, env: E, key_pair: KeyPair, member_id: MemberId) -> Self {
        Self { transport, machine: Negotiation::new(env, key_pair, member_id) }
    }

    /// State of the underlying machine.
    pub fn state(&self) -> NegotiationState {
        self.machine.state()
    }

    /// Run a full negotiation and return the room secret.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AccessDenied`] when the service denies either round
    ///   trip; carries the service's status and reason.
    /// - [`ClientError::Protocol`] when a response fails to parse or a
    ///   sealed payload fails to open.
    /// - [`ClientError::Unavailable`] when the service is unreachable.
    pub async fn negotiate(&mut self, room: &RoomId) -> Result<RoomSecret, ClientError> {
        tracing::debug!(%room, member = %self.machine.member_id, "starting negotiation");

        let challenge_request = self.machine.start();
        let challenge = match self.transport.request_challenge(room, &challenge_request).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail_transport(room, error)),
        };

        let secret_request = self.machine.on_challenge(&challenge)?;
        let secret = match self.transport.request_secret(room, &secret_request).await {
            Ok(response) => response,
            Err(error) => return Err(self.fail_transport(room, error)),
        };

        let room_secret = self.machine.on_secret(&secret)?;
        tracing::debug!(
            %room,
            generation = room_secret.membership_generation(),
            "negotiation complete"
        );
        Ok(room_secret)
    }

    fn fail_transport(&mut self, room: &RoomId, error: TransportError) -> ClientError {
        self.machine.on_transport_failure();
        match error {
            TransportError::Denied { status, error } => {
                tracing::warn!(%room, status, %error, "negotiation denied");
                ClientError::AccessDenied { status, message: error }
            }
            TransportError::Unavailable(unavailable) => {
                tracing::warn!(%room, reason = %unavailable.reason, "service unavailable");
                ClientError::Unavailable(unavailable)
            }
        }
    }
}
