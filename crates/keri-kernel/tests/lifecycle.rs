//! Identity lifecycle through the local Kernel: chains, persistence, and
//! concurrent writers.

use std::sync::Arc;

use keri_kernel::core::{build_group_event, GroupEventType};
use keri_kernel::store::{KelStore, MemoryStore, SqliteStore, StoreExt};
use keri_kernel::{Controller, Kernel, KernelConfig, KernelError};
use keri_kernel_testkit::fixtures::{group_request, key, multi_party_fixtures, TestIdentity};

fn memory_kernel() -> Kernel<MemoryStore> {
    Kernel::new(MemoryStore::new(), KernelConfig::default())
}

#[tokio::test]
async fn test_rotation_chain_commitments() {
    let kernel = memory_kernel();
    let id = kernel
        .incept(&key("chain", 0).public_key(), &key("chain", 1).public_key())
        .await
        .unwrap()
        .identifier;

    const N: u64 = 6;
    for i in 1..=N {
        let rotation = kernel
            .rotate(
                &id,
                &key("chain", i).public_key(),
                &key("chain", i + 1).public_key(),
            )
            .await
            .unwrap();
        assert_eq!(rotation.sn, i);
    }

    let kel = kernel.kel(&id).await.unwrap();
    let sns: Vec<u64> = kel.iter().map(|e| e.sn).collect();
    assert_eq!(sns, (0..=N).collect::<Vec<_>>());

    for pair in kel.windows(2) {
        let key = keri_kernel::Ed25519PublicKey::from_encoded(&pair[1].keys[0]).unwrap();
        assert_eq!(Some(&key.digest()), pair[0].next_digest());
        assert_eq!(pair[1].prefix, id.as_str());
    }

    let state = kernel.state(&id).await.unwrap();
    assert_eq!(state.event_count, N + 1);
    assert_eq!(
        kernel.store().replay_state(&id).await.unwrap(),
        Some(state)
    );
}

#[tokio::test]
async fn test_rejected_rotation_appends_nothing() {
    let kernel = memory_kernel();
    let alice = TestIdentity::new("alice");
    kernel
        .incept(
            &alice.current_keypair().public_key(),
            &alice.next_keypair().public_key(),
        )
        .await
        .unwrap();

    let (rogue, rogue_next) = alice.rogue_rotation_keys();
    let err = kernel
        .rotate(&alice.identifier(), &rogue.public_key(), &rogue_next.public_key())
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::KeyCommitmentMismatch { sn: 1, .. }));

    assert_eq!(kernel.kel(&alice.identifier()).await.unwrap().len(), 1);
    assert_eq!(
        kernel.state(&alice.identifier()).await.unwrap().event_count,
        1
    );
}

#[tokio::test]
async fn test_identical_keys_identical_identifier() {
    let a = memory_kernel();
    let b = memory_kernel();
    let signing = key("same", 0).public_key();
    let next = key("same", 1).public_key();

    let ia = a.incept(&signing, &next).await.unwrap();
    let ib = b.incept(&signing, &next).await.unwrap();
    assert_eq!(ia.identifier, ib.identifier);
    assert_eq!(ia.event, ib.event);

    assert!(matches!(
        a.incept(&signing, &next).await,
        Err(KernelError::DuplicateIdentity(_))
    ));
}

#[tokio::test]
async fn test_concurrent_rotations_single_winner() {
    let kernel = Arc::new(memory_kernel());
    let id = kernel
        .incept(&key("race", 0).public_key(), &key("race", 1).public_key())
        .await
        .unwrap()
        .identifier;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let kernel = Arc::clone(&kernel);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            kernel
                .rotate(&id, &key("race", 1).public_key(), &key("race", 2).public_key())
                .await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(rotation) => {
                assert_eq!(rotation.sn, 1);
                wins += 1;
            }
            Err(KernelError::KeyCommitmentMismatch { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(kernel.kel(&id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_identities_do_not_contend() {
    let kernel = Arc::new(memory_kernel());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let kernel = Arc::clone(&kernel);
        handles.push(tokio::spawn(async move {
            let created = kernel.create_identity().await?;
            kernel.rotate_identity(&created.identifier).await
        }));
    }
    for handle in handles {
        let state = handle.await.unwrap().unwrap();
        assert_eq!(state.event_count, 2);
    }

    assert_eq!(kernel.identities().await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_sqlite_log_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kel.db");

    let id = {
        let kernel = Kernel::new(SqliteStore::open(&path).unwrap(), KernelConfig::default());
        let id = kernel
            .incept(&key("disk", 0).public_key(), &key("disk", 1).public_key())
            .await
            .unwrap()
            .identifier;
        kernel
            .rotate(&id, &key("disk", 1).public_key(), &key("disk", 2).public_key())
            .await
            .unwrap();
        id
    };

    let kernel = Kernel::new(SqliteStore::open(&path).unwrap(), KernelConfig::default());
    let kel = kernel.kel(&id).await.unwrap();
    assert_eq!(kel.len(), 2);

    // The reopened log keeps enforcing the commitment chain.
    assert!(matches!(
        kernel
            .rotate(&id, &key("disk", 1).public_key(), &key("disk", 3).public_key())
            .await,
        Err(KernelError::KeyCommitmentMismatch { sn: 2, .. })
    ));
    let rotation = kernel
        .rotate(&id, &key("disk", 2).public_key(), &key("disk", 3).public_key())
        .await
        .unwrap();
    assert_eq!(rotation.sn, 2);

    let key_state = kernel.store().load_key_state(&id).await.unwrap().unwrap();
    assert_eq!(key_state.last_said, rotation.event.said);
}

#[tokio::test]
async fn test_ingest_fixture_log() {
    let kernel = memory_kernel();
    let alice = TestIdentity::with_rotations("alice", 3);
    for event in &alice.events {
        kernel.ingest(event).await.unwrap();
    }
    assert_eq!(
        kernel.store().load_key_state(&alice.identifier()).await.unwrap(),
        Some(alice.state.clone())
    );
    assert!(kernel.store().has_identity(&alice.identifier()).await.unwrap());
}

#[tokio::test]
async fn test_group_construction_rules() {
    let kernel = memory_kernel();
    let parties = multi_party_fixtures(3);

    let group = kernel
        .multisig(&group_request(&parties, 2, "rot"))
        .await
        .unwrap();
    assert_eq!(group.event_type(), "rot");
    assert!(parties.iter().all(|p| p.identifier().as_str() != group.prefix()));
    assert_eq!(
        group,
        build_group_event(&group_request(&parties, 2, "rot")).unwrap()
    );

    let icp = kernel
        .multisig(&group_request(&parties, 2, GroupEventType::Inception))
        .await
        .unwrap();
    assert_eq!(icp.event_type(), "icp");
    assert_ne!(icp.prefix(), group.prefix());

    assert!(matches!(
        kernel.multisig(&group_request(&parties[..1], 1, "rot")).await,
        Err(KernelError::InsufficientMembers { identifiers: 1, keys: 1 })
    ));
    assert!(matches!(
        kernel.multisig(&group_request(&parties, 0, "rot")).await,
        Err(KernelError::InvalidThreshold { threshold: 0, keys: 3 })
    ));
    assert!(matches!(
        kernel.multisig(&group_request(&parties, 4, "rot")).await,
        Err(KernelError::InvalidThreshold { threshold: 4, keys: 3 })
    ));
}
