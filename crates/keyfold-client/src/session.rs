//! Room session: rotation, trial decryption, and message transport glue.
//!
//! One session exclusively owns one room's secret history on this device.
//! Outgoing messages are encrypted under a secret consistent with current
//! membership (rotating first when the member set changed); incoming
//! messages are tried against the history newest-first, falling back to one
//! negotiation with the distribution service before a message is declared
//! unreadable. Public rooms bypass encryption entirely and carry raw UTF-8;
//! only private rooms ever derive a secret.

use keyfold_core::{
    ContentStore, Environment, MembershipOracle, PublicKeySet,
    room::{ContentId, MemberId, RoomId},
};
use keyfold_crypto::{
    EncryptedEnvelope, IV_SIZE, KeyPair, aggregate, decrypt, encrypt,
};

use crate::{
    error::ClientError,
    local_store::{LocalStore, StoreError, room_history_record},
    negotiation::{NegotiationClient, NegotiationTransport},
    secret_history::SecretHistory,
};

/// Decrypted view of one stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageText {
    /// The message decrypted (or the room is public).
    Plain(String),
    /// No known or freshly negotiated secret decrypts the message.
    Unreadable,
}

/// One entry of a room's message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMessage {
    /// Content-store identifier of the stored blob.
    pub content_id: ContentId,
    /// Decrypted text, or a placeholder for an unreadable message.
    pub text: MessageText,
}

/// A device's session on one room.
///
/// Exclusive ownership (`&mut self` on every mutating operation) serializes
/// rotation per room, so concurrent duplicate pushes cannot happen on a
/// single device.
pub struct RoomSession<O, C, T, E, S> {
    room: RoomId,
    oracle: O,
    content: C,
    local: S,
    negotiation: NegotiationClient<T, E>,
    env: E,
    key_pair: KeyPair,
    history: SecretHistory,
}

impl<O, C, T, E, S> RoomSession<O, C, T, E, S>
where
    O: MembershipOracle,
    C: ContentStore,
    T: NegotiationTransport,
    E: Environment,
    S: LocalStore,
{
    /// Open a session, loading any persisted secret history for the room.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Storage`] if the local store fails.
    /// - [`ClientError::Protocol`] if a persisted history record is corrupt.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        room: RoomId,
        oracle: O,
        content: C,
        local: S,
        transport: T,
        env: E,
        key_pair: KeyPair,
        member_id: MemberId,
    ) -> Result<Self, ClientError> {
        let history = match local.load(&room_history_record(&room))? {
            Some(bytes) => ciborium::de::from_reader(bytes.as_slice())
                .map_err(|e| ClientError::Protocol(format!("corrupt history record: {e}")))?,
            None => SecretHistory::new(),
        };
        let negotiation = NegotiationClient::new(transport, env.clone(), key_pair.clone(), member_id);
        Ok(Self { room, oracle, content, local, negotiation, env, key_pair, history })
    }

    /// The room this session is bound to.
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// The session's secret history, for inspection.
    pub fn history(&self) -> &SecretHistory {
        &self.history
    }

    /// Encrypt and send a message, recording its pointer on the ledger.
    ///
    /// Rotates the room secret first if the ledger's member set differs from
    /// the snapshot behind the current secret. Public rooms store the raw
    /// UTF-8 bytes without encryption.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Unavailable`] if a collaborator cannot be reached.
    /// - [`ClientError::Protocol`] if the room has no members on the ledger.
    pub async fn send(&mut self, plaintext: &str) -> Result<ContentId, ClientError> {
        if !self.oracle.is_room_private(&self.room).await? {
            let id = self.content.put(plaintext.as_bytes().to_vec()).await?;
            self.oracle.send_message(&self.room, &id).await?;
            return Ok(id);
        }

        let members = self.current_members().await?;
        if !self.history.snapshot_matches(&members) {
            self.rotate(&members)?;
        }
        let Some(secret) = self.history.current() else {
            unreachable!("rotation always leaves a current secret")
        };

        let iv: [u8; IV_SIZE] = self.env.random_array();
        let envelope = encrypt(secret, plaintext.as_bytes(), iv);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&envelope, &mut bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let id = self.content.put(bytes).await?;
        self.oracle.send_message(&self.room, &id).await?;
        tracing::debug!(room = %self.room, content = %id, "message sent");
        Ok(id)
    }

    /// Fetch and decrypt one message.
    ///
    /// # Errors
    ///
    /// - [`ClientError::DecryptFailed`] if the whole history plus one fresh
    ///   negotiation fails to decrypt it. Terminal for this message only.
    /// - [`ClientError::Protocol`] if the blob is not a valid envelope or
    ///   the plaintext is not UTF-8.
    /// - [`ClientError::Unavailable`] if a collaborator cannot be reached.
    pub async fn read(&mut self, id: &ContentId) -> Result<String, ClientError> {
        let bytes = self.content.get(id).await?;

        if !self.oracle.is_room_private(&self.room).await? {
            return String::from_utf8(bytes)
                .map_err(|_| ClientError::Protocol("public message is not valid UTF-8".into()));
        }

        let envelope: EncryptedEnvelope = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|e| ClientError::Protocol(format!("blob is not a valid envelope: {e}")))?;

        if let Some(plaintext) = self.try_history(&envelope) {
            return utf8(plaintext);
        }

        // Exhausted: one negotiation, one more attempt, then give up
        tracing::debug!(room = %self.room, content = %id, "history exhausted, negotiating");
        let members = self.current_members().await?;
        let secret = self.negotiation.negotiate(&self.room).await?;
        self.history.push(secret, &members);
        self.persist_history()?;

        let Some(secret) = self.history.current() else {
            unreachable!("a secret was just pushed")
        };
        match decrypt(secret, &envelope) {
            Ok(plaintext) => utf8(plaintext),
            Err(_) => {
                tracing::warn!(room = %self.room, content = %id, "message is unreadable");
                Err(ClientError::DecryptFailed)
            }
        }
    }

    /// Fetch the room's full message log, decrypting each entry.
    ///
    /// Unreadable messages become [`MessageText::Unreadable`] placeholders
    /// rather than failing the batch.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Unavailable`] if a collaborator cannot be reached.
    /// - [`ClientError::Protocol`] on a structurally invalid blob.
    pub async fn messages(&mut self) -> Result<Vec<RoomMessage>, ClientError> {
        let ids = self.oracle.messages(&self.room).await?;
        let mut log = Vec::with_capacity(ids.len());
        for id in ids {
            let text = match self.read(&id).await {
                Ok(plaintext) => MessageText::Plain(plaintext),
                Err(ClientError::DecryptFailed) => MessageText::Unreadable,
                Err(other) => return Err(other),
            };
            log.push(RoomMessage { content_id: id, text });
        }
        Ok(log)
    }

    async fn current_members(&self) -> Result<PublicKeySet, ClientError> {
        let keys = self.oracle.room_member_public_keys(&self.room).await?;
        Ok(PublicKeySet::new(keys))
    }

    fn rotate(&mut self, members: &PublicKeySet) -> Result<(), ClientError> {
        let secret = aggregate(&self.key_pair, members)
            .map_err(|_| ClientError::Protocol("room has no members on the ledger".into()))?;
        tracing::debug!(
            room = %self.room,
            generation = secret.membership_generation(),
            "rotating room secret"
        );
        self.history.push(secret, members);
        self.persist_history()
    }

    fn try_history(&self, envelope: &EncryptedEnvelope) -> Option<Vec<u8>> {
        self.history.newest_first().find_map(|secret| decrypt(secret, envelope).ok())
    }

    fn persist_history(&self) -> Result<(), ClientError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&self.history, &mut bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.local.store(&room_history_record(&self.room), &bytes)?;
        Ok(())
    }
}

fn utf8(bytes: Vec<u8>) -> Result<String, ClientError> {
    String::from_utf8(bytes)
        .map_err(|_| ClientError::Protocol("decrypted message is not valid UTF-8".into()))
}
