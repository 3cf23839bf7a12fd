//! Proptest generators for property-based testing.

use proptest::prelude::*;

use keri_kernel_core::{
    Ed25519PublicKey, EncodedKey, InceptionBuilder, KeyEvent, KeyState, Keypair, RotationBuilder,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random Ed25519PublicKey.
pub fn public_key() -> impl Strategy<Value = Ed25519PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a `B`-encoded verification key.
pub fn encoded_key() -> impl Strategy<Value = EncodedKey> {
    public_key().prop_map(|pk| pk.to_encoded())
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a small JSON anchor.
pub fn anchor() -> impl Strategy<Value = serde_json::Value> {
    ("[a-z]{1,8}", any::<u32>()).prop_map(|(k, v)| {
        let mut map = serde_json::Map::new();
        map.insert(k, v.into());
        serde_json::Value::Object(map)
    })
}

/// Parameters for generating an inception event.
#[derive(Debug, Clone)]
pub struct InceptionParams {
    pub signing: Vec<Keypair>,
    pub next: Vec<Keypair>,
    pub signing_threshold: u64,
    pub next_threshold: u64,
    pub anchors: Vec<serde_json::Value>,
}

impl Arbitrary for InceptionParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            prop::collection::vec(keypair(), 1..=4),
            prop::collection::vec(keypair(), 1..=4),
            prop::collection::vec(anchor(), 0..=3),
        )
            .prop_flat_map(|(signing, next, anchors)| {
                let (ks, ns) = (signing.len() as u64, next.len() as u64);
                (
                    Just(signing),
                    Just(next),
                    1..=ks,
                    1..=ns,
                    Just(anchors),
                )
            })
            .prop_map(
                |(signing, next, signing_threshold, next_threshold, anchors)| InceptionParams {
                    signing,
                    next,
                    signing_threshold,
                    next_threshold,
                    anchors,
                },
            )
            .boxed()
    }
}

/// Build the inception event described by `params`.
pub fn inception_from_params(params: &InceptionParams) -> KeyEvent {
    let mut builder = InceptionBuilder::new()
        .signing_threshold(params.signing_threshold)
        .next_threshold(params.next_threshold);
    for kp in &params.signing {
        builder = builder.signing_key(&kp.public_key());
    }
    for kp in &params.next {
        builder = builder.next_key(&kp.public_key());
    }
    for anchor in &params.anchors {
        builder = builder.anchor(anchor.clone());
    }
    builder.build().expect("generated inception is valid")
}

/// Rotate `state` to all of `params.next`, committing to `new_next`.
pub fn rotation_from_params(
    state: &KeyState,
    params: &InceptionParams,
    new_next: &[Keypair],
) -> KeyEvent {
    let mut builder = RotationBuilder::new(state).signing_threshold(params.next_threshold);
    for kp in &params.next {
        builder = builder.signing_key(&kp.public_key());
    }
    for kp in new_next {
        builder = builder.next_key(&kp.public_key());
    }
    builder.build().expect("generated rotation is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keri_kernel_core::{validate_event, validate_event_bytes, ControlEvent};

    proptest! {
        #[test]
        fn test_inception_is_deterministic(params: InceptionParams) {
            let e1 = inception_from_params(&params);
            let e2 = inception_from_params(&params);
            prop_assert_eq!(e1, e2);
        }

        #[test]
        fn test_inception_said_and_size(params: InceptionParams) {
            let event = inception_from_params(&params);
            prop_assert!(validate_event(&event).is_ok());
            prop_assert_eq!(&event.said, &event.prefix);

            let bytes = event.to_bytes().unwrap();
            prop_assert_eq!(event.version.size, bytes.len());
            prop_assert_eq!(
                validate_event_bytes(&bytes).unwrap(),
                ControlEvent::Inception(event)
            );
        }

        #[test]
        fn test_rotation_follows_commitment(
            params: InceptionParams,
            new_next in prop::collection::vec(keypair(), 1..=3),
        ) {
            let icp = inception_from_params(&params);
            let mut state = KeyState::incept(&icp).unwrap();
            let rot = rotation_from_params(&state, &params, &new_next);

            prop_assert_eq!(rot.sn, 1);
            prop_assert_eq!(rot.prior.as_deref(), Some(icp.said.as_str()));
            prop_assert!(state.apply(&rot).is_ok());
        }

        #[test]
        fn test_flipped_character_breaks_said(params: InceptionParams, pick in any::<prop::sample::Index>()) {
            let event = inception_from_params(&params);
            let bytes = event.to_bytes().unwrap();

            // Any position past the `i` field, so the flip lands outside `d`.
            let start = bytes
                .windows(5)
                .position(|w| w == b"\"s\":\"")
                .unwrap();
            let pos = start + pick.index(bytes.len() - start);
            let mut tampered = bytes.clone();
            tampered[pos] = if tampered[pos] == b'1' { b'2' } else { b'1' };

            prop_assert!(validate_event_bytes(&tampered).is_err());
        }
    }
}
