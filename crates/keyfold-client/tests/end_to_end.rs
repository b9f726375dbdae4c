//! End-to-end scenarios wiring sessions, the distribution service, and the
//! collaborator fakes together in-process.

use std::sync::{Arc, Mutex};

use keyfold_client::{
    ClientError, MemoryLocalStore, MessageText, NegotiationTransport, RoomSession, TransportError,
};
use keyfold_core::{
    ContentStore, MembershipOracle, PublicKeySet,
    env::TestEnv,
    error::Unavailable,
    room::{ContentId, MemberId, RoomId},
    wire::{ChallengeRequest, ChallengeResponse, SecretRequest, SecretResponse},
};
use keyfold_crypto::{CryptoError, KeyPair, MemberPublicKey, aggregate, decrypt};
use keyfold_service::{MemoryStorage, NegotiationService, ServiceError};

/// Ledger fake: one room's member roster, privacy flag, and message log.
#[derive(Clone)]
struct MemoryOracle {
    inner: Arc<Mutex<OracleState>>,
}

struct OracleState {
    members: Vec<(MemberId, MemberPublicKey)>,
    private: bool,
    log: Vec<ContentId>,
}

impl MemoryOracle {
    fn new(members: Vec<(MemberId, MemberPublicKey)>, private: bool) -> Self {
        Self { inner: Arc::new(Mutex::new(OracleState { members, private, log: Vec::new() })) }
    }

    fn add_member(&self, member: MemberId, key: MemberPublicKey) {
        self.inner.lock().unwrap().members.push((member, key));
    }
}

impl MembershipOracle for MemoryOracle {
    async fn is_member_of(&self, _room: &RoomId, member: &MemberId) -> Result<bool, Unavailable> {
        Ok(self.inner.lock().unwrap().members.iter().any(|(id, _)| id == member))
    }

    async fn room_member_public_keys(
        &self,
        _room: &RoomId,
    ) -> Result<Vec<MemberPublicKey>, Unavailable> {
        Ok(self.inner.lock().unwrap().members.iter().map(|(_, key)| key.clone()).collect())
    }

    async fn room_member_public_key(
        &self,
        _room: &RoomId,
        member: &MemberId,
    ) -> Result<Option<MemberPublicKey>, Unavailable> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .members
            .iter()
            .find(|(id, _)| id == member)
            .map(|(_, key)| key.clone()))
    }

    async fn is_room_private(&self, _room: &RoomId) -> Result<bool, Unavailable> {
        Ok(self.inner.lock().unwrap().private)
    }

    async fn send_message(&self, _room: &RoomId, content: &ContentId) -> Result<(), Unavailable> {
        self.inner.lock().unwrap().log.push(content.clone());
        Ok(())
    }

    async fn messages(&self, _room: &RoomId) -> Result<Vec<ContentId>, Unavailable> {
        Ok(self.inner.lock().unwrap().log.clone())
    }
}

/// Content store fake: sequential ids over an in-memory map.
#[derive(Clone, Default)]
struct MemoryContent {
    blobs: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ContentStore for MemoryContent {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, Unavailable> {
        let mut blobs = self.blobs.lock().unwrap();
        blobs.push(bytes);
        Ok(ContentId(format!("blob-{}", blobs.len() - 1)))
    }

    async fn get(&self, id: &ContentId) -> Result<Vec<u8>, Unavailable> {
        let index: usize = id
            .0
            .strip_prefix("blob-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| Unavailable::new("malformed content id"))?;
        self.blobs
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or_else(|| Unavailable::new("no such blob"))
    }
}

/// Binds the real service handlers directly to the client transport seam.
#[derive(Clone)]
struct InProcessTransport {
    service: Arc<NegotiationService<MemoryStorage, MemoryOracle, TestEnv>>,
}

fn to_transport_error(error: ServiceError) -> TransportError {
    match error {
        ServiceError::Unavailable(unavailable) => TransportError::Unavailable(unavailable),
        other => TransportError::Denied {
            status: other.http_status(),
            error: other.error_body().error,
        },
    }
}

impl NegotiationTransport for InProcessTransport {
    async fn request_challenge(
        &self,
        room: &RoomId,
        request: &ChallengeRequest,
    ) -> Result<ChallengeResponse, TransportError> {
        self.service.handle_challenge(room, request).await.map_err(to_transport_error)
    }

    async fn request_secret(
        &self,
        room: &RoomId,
        request: &SecretRequest,
    ) -> Result<SecretResponse, TransportError> {
        self.service.handle_secret(room, request).await.map_err(to_transport_error)
    }
}

struct Rig {
    oracle: MemoryOracle,
    content: MemoryContent,
    transport: InProcessTransport,
    env: TestEnv,
}

impl Rig {
    fn new(members: Vec<(MemberId, MemberPublicKey)>, private: bool) -> Self {
        let env = TestEnv::new(42);
        let oracle = MemoryOracle::new(members, private);
        let service =
            Arc::new(NegotiationService::new(MemoryStorage::new(), oracle.clone(), env.clone()));
        Self {
            oracle,
            content: MemoryContent::default(),
            transport: InProcessTransport { service },
            env,
        }
    }

    fn session(
        &self,
        member: &str,
        key_pair: &KeyPair,
    ) -> RoomSession<MemoryOracle, MemoryContent, InProcessTransport, TestEnv, MemoryLocalStore>
    {
        RoomSession::open(
            RoomId::from("1"),
            self.oracle.clone(),
            self.content.clone(),
            MemoryLocalStore::new(),
            self.transport.clone(),
            self.env.clone(),
            key_pair.clone(),
            MemberId::from(member),
        )
        .unwrap()
    }
}

fn pair(fill: u8) -> KeyPair {
    KeyPair::from_seed([fill; 32]).unwrap()
}

fn roster(entries: &[(&str, &KeyPair)]) -> Vec<(MemberId, MemberPublicKey)> {
    entries.iter().map(|(id, p)| (MemberId::from(*id), p.public().clone())).collect()
}

#[tokio::test]
async fn three_members_agree_and_a_non_member_cannot() {
    let alice = pair(1);
    let bob = pair(2);
    let carol = pair(3);
    let dave = pair(4);
    let rig =
        Rig::new(roster(&[("0xa", &alice), ("0xb", &bob), ("0xc", &carol)]), true);

    // Alice encrypts under the locally aggregated secret
    let mut alice_session = rig.session("0xa", &alice);
    let id = alice_session.send("hello").await.unwrap();

    // Bob and Carol independently negotiate and decrypt the same message
    let mut bob_session = rig.session("0xb", &bob);
    let mut carol_session = rig.session("0xc", &carol);
    assert_eq!(bob_session.read(&id).await.unwrap(), "hello");
    assert_eq!(carol_session.read(&id).await.unwrap(), "hello");

    // All three hold the identical secret
    let secret = alice_session.history().current().unwrap().clone();
    assert_eq!(bob_session.history().current(), Some(&secret));
    assert_eq!(carol_session.history().current(), Some(&secret));

    // Dave is not on the roster: the service denies negotiation
    let mut dave_session = rig.session("0xd", &dave);
    let error = dave_session.read(&id).await.unwrap_err();
    assert!(matches!(error, ClientError::AccessDenied { status: 403, .. }));

    // And Dave's own aggregation over the genuine member set produces a
    // different secret that fails authentication
    let members = PublicKeySet::new(vec![
        alice.public().clone(),
        bob.public().clone(),
        carol.public().clone(),
    ]);
    let forged = aggregate(&dave, &members).unwrap();
    assert_ne!(&forged, &secret);

    let bytes = rig.content.get(&id).await.unwrap();
    let envelope = ciborium::de::from_reader(bytes.as_slice()).unwrap();
    assert_eq!(decrypt(&forged, &envelope), Err(CryptoError::AuthenticationFailed));
}

#[tokio::test]
async fn rotation_keeps_old_messages_readable_across_devices() {
    let alice = pair(1);
    let bob = pair(2);
    let carol = pair(3);
    let rig = Rig::new(roster(&[("0xa", &alice), ("0xb", &bob), ("0xc", &carol)]), true);

    let mut alice_session = rig.session("0xa", &alice);
    let mut bob_session = rig.session("0xb", &bob);

    // Before the rotation, Bob negotiates the generation-3 secret
    let first = alice_session.send("before rotation").await.unwrap();
    assert_eq!(bob_session.read(&first).await.unwrap(), "before rotation");

    // A fourth member joins; Alice's next send rotates
    let dave = pair(4);
    rig.oracle.add_member(MemberId::from("0xd"), dave.public().clone());
    alice_session.send("after rotation").await.unwrap();

    // Bob's own send rotates his stack to generation 4 as well
    bob_session.send("bob says hi").await.unwrap();
    assert_eq!(bob_session.history().len(), 2);

    // The whole log is readable for Bob: the newest entries under the
    // current secret, the oldest by walking back to generation 3
    let log = bob_session.messages().await.unwrap();
    let texts: Vec<_> = log.iter().map(|m| m.text.clone()).collect();
    assert_eq!(
        texts,
        vec![
            MessageText::Plain("before rotation".into()),
            MessageText::Plain("after rotation".into()),
            MessageText::Plain("bob says hi".into()),
        ]
    );

    // Trial decryption never mutated the persisted stack
    assert_eq!(bob_session.history().len(), 2);
}

#[tokio::test]
async fn public_room_messages_are_stored_and_read_as_plaintext() {
    let alice = pair(1);
    let bob = pair(2);
    let rig = Rig::new(roster(&[("0xa", &alice), ("0xb", &bob)]), false);

    let mut alice_session = rig.session("0xa", &alice);
    let id = alice_session.send("in the open").await.unwrap();

    // The blob is the raw plaintext
    assert_eq!(rig.content.get(&id).await.unwrap(), b"in the open");

    // No secret was ever derived on either side
    let mut bob_session = rig.session("0xb", &bob);
    assert_eq!(bob_session.read(&id).await.unwrap(), "in the open");
    assert!(alice_session.history().is_empty());
    assert!(bob_session.history().is_empty());
}
