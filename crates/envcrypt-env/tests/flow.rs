//! End-to-end: register users, create a project, share it, and work with
//! the encrypted history the way two collaborators would.

use secrecy::SecretString;

use envcrypt_core::types::VersionKind;
use envcrypt_core::EnvcryptError;
use envcrypt_crypto::{grant, unwrap, KdfParams, ProjectCreatePayload, UserIdentity};
use envcrypt_env::{
    diff_versions, parse, pull, pull_latest, push, rollback, Codec, MemoryVersionStore,
    VersionStore,
};
use uuid::Uuid;

fn fast_params() -> KdfParams {
    KdfParams {
        time_cost: 1,
        mem_cost_kib: 1024,
        parallelism: 1,
        key_length: 32,
    }
}

fn password(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

#[test]
fn owner_and_collaborator_share_history() {
    let codec = Codec::default();

    // Register
    let (alice, _) = UserIdentity::create("alice@example.com", &password("alice-pw"), &fast_params()).unwrap();
    let (bob, _) = UserIdentity::create("bob@example.com", &password("bob-pw"), &fast_params()).unwrap();

    // Persist and reload identities as the identity collaborator would
    let alice: UserIdentity = serde_json::from_str(&serde_json::to_string(&alice).unwrap()).unwrap();
    let alice_session = alice.unlock(&password("alice-pw")).unwrap();

    // Create project; the returned key is only used for the first push
    let (project, _pmk) =
        ProjectCreatePayload::new("billing", alice.id, &alice.public_key()).unwrap();
    let project_id = Uuid::new_v4();
    let mut store = MemoryVersionStore::new(project_id, "production");

    let first = parse(b"DB_URL=postgres://a\nAPI_KEY=one\n").unwrap();
    let v1 = project
        .wrapped
        .with_pmk(alice_session.secret(), |pmk| push(&mut store, &codec, pmk, &first))
        .unwrap();
    assert_eq!(v1, 1);

    // Share with bob
    let bob_record = grant(&project.wrapped, alice_session.secret(), &bob.public_key()).unwrap();
    let bob_session = bob.unlock(&password("bob-pw")).unwrap();
    let bob_pmk = unwrap(&bob_record, bob_session.secret()).unwrap();

    let doc = pull(&store, &codec, &bob_pmk, 1).unwrap();
    assert_eq!(doc.get("API_KEY"), Some("one"));

    // Bob updates
    let v2 = push(
        &mut store,
        &codec,
        &bob_pmk,
        &parse(b"DB_URL=postgres://a\nAPI_KEY=two\nFEATURE=on\n").unwrap(),
    )
    .unwrap();
    assert_eq!(v2, 2);

    // Alice sees bob's change
    let alice_pmk = unwrap(&project.wrapped, alice_session.secret()).unwrap();
    let (latest, doc) = pull_latest(&store, &codec, &alice_pmk).unwrap();
    assert_eq!(latest, 2);
    assert_eq!(doc.get("FEATURE"), Some("on"));

    let d = diff_versions(&store, &codec, &alice_pmk, 1, 2).unwrap();
    assert_eq!(d.added.iter().collect::<Vec<_>>(), ["FEATURE"]);
    assert_eq!(d.modified.iter().collect::<Vec<_>>(), ["API_KEY"]);
    assert!(d.removed.is_empty());

    // Roll back to v1
    let v3 = rollback(&mut store, &codec, &alice_pmk, 1).unwrap();
    assert_eq!(v3, 3);
    assert_eq!(store.get(3).unwrap().metadata.kind, VersionKind::Rollback);
    assert!(diff_versions(&store, &codec, &alice_pmk, 1, 3).unwrap().is_empty());

    // Revocation: bob's record leaves the member list, alice's is untouched
    let alice_record = project.wrapped.clone();
    let mut members = vec![(alice.id, project.wrapped.clone()), (bob.id, bob_record)];
    members.retain(|(id, _)| *id != bob.id);

    assert!(members.iter().all(|(id, _)| *id != bob.id));
    assert_eq!(members, [(alice.id, alice_record)]);
    for (_, record) in &members {
        assert!(unwrap(record, bob_session.secret()).unwrap_err().is_authentication());
        let pmk = unwrap(record, alice_session.secret()).unwrap();
        assert!(pull(&store, &codec, &pmk, 3).is_ok());
    }
}

#[test]
fn wrong_password_cannot_reach_project_key() {
    let (alice, _) = UserIdentity::create("alice@example.com", &password("right"), &fast_params()).unwrap();
    let err = alice.unlock(&password("wrong")).unwrap_err();
    assert!(matches!(err, EnvcryptError::Authentication));
}

#[test]
fn history_survives_json_persistence() {
    let codec = Codec::default();
    let pmk = envcrypt_crypto::generate_pmk().unwrap();
    let mut store = MemoryVersionStore::new(Uuid::new_v4(), "staging");
    push(&mut store, &codec, &pmk, &parse(b"A=1").unwrap()).unwrap();
    push(&mut store, &codec, &pmk, &parse(b"A=2").unwrap()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("staging.json");
    std::fs::write(&path, store.to_json().unwrap()).unwrap();

    let reloaded = MemoryVersionStore::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(reloaded.records().len(), 2);
    assert_eq!(pull(&reloaded, &codec, &pmk, 1).unwrap().get("A"), Some("1"));
}
