//! Negotiation wire payloads.
//!
//! JSON bodies of the two negotiation round trips, field names fixed by the
//! collaborator-facing contract:
//!
//! - challenge: `GET /secret/{roomId}?userId&userPublicKey` →
//!   `{ challenge, servicePublicKey }`
//! - secret: `POST /secret/{roomId}` `{ userId, userPublicKey,
//!   encryptedNonce }` → `{ secret }`
//!
//! Binary values travel hex-encoded. The HTTP plumbing itself lives outside
//! this core; these types only pin the bodies.

use keyfold_crypto::MemberPublicKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::room::MemberId;

/// A hex field failed to decode into its typed value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Value was not valid hex.
    #[error("field is not valid hex")]
    InvalidHex,

    /// Hex decoded but the bytes are not a valid public key.
    #[error("field is not a valid public key")]
    InvalidKey,
}

/// Query parameters of the challenge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// The caller's ledger address.
    pub user_id: String,
    /// The caller's public key, compressed encoding, hex.
    pub user_public_key: String,
}

impl ChallengeRequest {
    /// Build a request from typed values.
    pub fn new(user_id: &MemberId, user_public_key: &MemberPublicKey) -> Self {
        Self {
            user_id: user_id.0.clone(),
            user_public_key: hex::encode(user_public_key.to_bytes()),
        }
    }

    /// Parse the caller's public key.
    pub fn parse_public_key(&self) -> Result<MemberPublicKey, WireError> {
        parse_key(&self.user_public_key)
    }

    /// The caller's ledger address as a typed id.
    pub fn member_id(&self) -> MemberId {
        MemberId(self.user_id.clone())
    }
}

/// Body of the challenge response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    /// The nonce, sealed toward the caller's public key, hex.
    pub challenge: String,
    /// The service's public key, compressed encoding, hex.
    pub service_public_key: String,
}

impl ChallengeResponse {
    /// Build a response from typed values.
    pub fn new(sealed_nonce: &[u8], service_public_key: &MemberPublicKey) -> Self {
        Self {
            challenge: hex::encode(sealed_nonce),
            service_public_key: hex::encode(service_public_key.to_bytes()),
        }
    }

    /// Decode the sealed nonce bytes.
    pub fn sealed_nonce(&self) -> Result<Vec<u8>, WireError> {
        hex::decode(&self.challenge).map_err(|_| WireError::InvalidHex)
    }

    /// Parse the service's public key.
    pub fn parse_service_key(&self) -> Result<MemberPublicKey, WireError> {
        parse_key(&self.service_public_key)
    }
}

/// Body of the secret request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRequest {
    /// The caller's ledger address.
    pub user_id: String,
    /// The caller's public key, compressed encoding, hex.
    pub user_public_key: String,
    /// The caller's challenge answer: a signature over the nonce, sealed
    /// toward the service's public key. Hex-encoded.
    pub encrypted_nonce: String,
}

impl SecretRequest {
    /// Build a request from typed values.
    pub fn new(
        user_id: &MemberId,
        user_public_key: &MemberPublicKey,
        sealed_answer: &[u8],
    ) -> Self {
        Self {
            user_id: user_id.0.clone(),
            user_public_key: hex::encode(user_public_key.to_bytes()),
            encrypted_nonce: hex::encode(sealed_answer),
        }
    }

    /// Parse the caller's public key.
    pub fn parse_public_key(&self) -> Result<MemberPublicKey, WireError> {
        parse_key(&self.user_public_key)
    }

    /// Decode the sealed challenge answer.
    pub fn sealed_answer(&self) -> Result<Vec<u8>, WireError> {
        hex::decode(&self.encrypted_nonce).map_err(|_| WireError::InvalidHex)
    }

    /// The caller's ledger address as a typed id.
    pub fn member_id(&self) -> MemberId {
        MemberId(self.user_id.clone())
    }
}

/// Body of the secret response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretResponse {
    /// The room secret record, sealed toward the caller's public key, hex.
    pub secret: String,
}

impl SecretResponse {
    /// Build a response from the sealed secret bytes.
    pub fn new(sealed_secret: &[u8]) -> Self {
        Self { secret: hex::encode(sealed_secret) }
    }

    /// Decode the sealed secret bytes.
    pub fn sealed_secret(&self) -> Result<Vec<u8>, WireError> {
        hex::decode(&self.secret).map_err(|_| WireError::InvalidHex)
    }
}

/// Error body returned with 403/404 responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable denial reason.
    pub error: String,
}

fn parse_key(field: &str) -> Result<MemberPublicKey, WireError> {
    let bytes = hex::decode(field).map_err(|_| WireError::InvalidHex)?;
    MemberPublicKey::from_bytes(&bytes).map_err(|_| WireError::InvalidKey)
}

#[cfg(test)]
mod tests {
    use keyfold_crypto::KeyPair;

    use super::*;

    fn key() -> MemberPublicKey {
        KeyPair::from_seed([7; 32]).unwrap().public().clone()
    }

    #[test]
    fn challenge_request_uses_contract_field_names() {
        let request = ChallengeRequest::new(&MemberId::from("0xabc"), &key());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("userPublicKey").is_some());
    }

    #[test]
    fn secret_request_uses_contract_field_names() {
        let request = SecretRequest::new(&MemberId::from("0xabc"), &key(), b"sealed");
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("userPublicKey").is_some());
        assert!(json.get("encryptedNonce").is_some());
    }

    #[test]
    fn responses_use_contract_field_names() {
        let challenge = ChallengeResponse::new(b"sealed", &key());
        let json = serde_json::to_value(&challenge).unwrap();
        assert!(json.get("challenge").is_some());
        assert!(json.get("servicePublicKey").is_some());

        let secret = SecretResponse::new(b"sealed");
        let json = serde_json::to_value(&secret).unwrap();
        assert!(json.get("secret").is_some());
    }

    #[test]
    fn public_key_roundtrips_through_hex() {
        let request = ChallengeRequest::new(&MemberId::from("0xabc"), &key());
        assert_eq!(request.parse_public_key().unwrap(), key());
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let response = ChallengeResponse { challenge: "zz".into(), service_public_key: "zz".into() };
        assert_eq!(response.sealed_nonce(), Err(WireError::InvalidHex));
        assert_eq!(response.parse_service_key(), Err(WireError::InvalidHex));
    }

    #[test]
    fn hex_that_is_not_a_key_is_rejected() {
        let response =
            ChallengeResponse { challenge: "00".into(), service_public_key: "0000".into() };
        assert_eq!(response.parse_service_key(), Err(WireError::InvalidKey));
    }

    #[test]
    fn json_roundtrip() {
        let request = SecretRequest::new(&MemberId::from("0xabc"), &key(), b"answer");
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: SecretRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, request);
    }
}
