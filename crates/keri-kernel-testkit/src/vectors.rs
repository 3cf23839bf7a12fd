//! Golden test vectors for deterministic verification.
//!
//! Each vector fixes the key seeds of an identity and the SAIDs its events
//! must have. Any change to field order, version string, placeholder, or
//! key encoding shows up here first.

use keri_kernel_core::{
    build_group_event, incept, rotate, GroupEventRequest, GroupEventType, KeyEvent, KeyState,
    Keypair,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed byte of the signing key (repeated 32 times).
    pub signing_seed: u8,
    /// Seed byte of the next key.
    pub next_seed: u8,
    /// Expected `B` encoding of the signing key.
    pub expected_public_key: &'static str,
    /// Expected `E` digest of the next key.
    pub expected_next_digest: &'static str,
    /// Expected inception SAID (and prefix).
    pub expected_said: &'static str,
    /// Expected byte length of the inception event.
    pub expected_size: usize,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "inception from 0x42 seeds",
            signing_seed: 0x42,
            next_seed: 0x43,
            expected_public_key: "BIVL40Zt5HSRFMkLhXy6rbLfP-ntqXtMAl5YOBpiB2xI",
            expected_next_digest: "EfbCwHznRearPewPb192dcfZBWYvtQPuYOdPB4RF-Zm8",
            expected_said: "EjInMzzi7vBISFGsdjNf-mdyfTzHWbFg9QulAlTWuDtA",
            expected_size: 299,
        },
        GoldenVector {
            name: "inception from zero seed",
            signing_seed: 0x00,
            next_seed: 0x01,
            expected_public_key: "BO2onvM62pC1io6jQKm8Nc2UyFXcd4kOmOsBIoYtZ2ik",
            expected_next_digest: "ENHUPmL1Z_PyUbaRaqr6TO-FUpLUJThxKv0KGZQXzyX4",
            expected_said: "EtgsrOvwFqdQLkj88w9hck5mV8JkX_4l6Obwul_Q35Cw",
            expected_size: 299,
        },
        GoldenVector {
            name: "inception from 0x01 seed",
            signing_seed: 0x01,
            next_seed: 0x02,
            expected_public_key: "Biojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w",
            expected_next_digest: "EajgD1fBZkCocba-8m6RykhL3yqwIY0zDrnaydSnwOCc",
            expected_said: "EhBaEHPrtH7IessNxxJDql9mFyPkFoGn6KYKFdEjpNiQ",
            expected_size: 299,
        },
    ]
}

/// Exact serialization of the 0x01 inception.
pub const INCEPTION_JSON: &str = r#"{"v":"KERI10JSON00012b_","t":"icp","d":"EhBaEHPrtH7IessNxxJDql9mFyPkFoGn6KYKFdEjpNiQ","i":"EhBaEHPrtH7IessNxxJDql9mFyPkFoGn6KYKFdEjpNiQ","s":"0","kt":"1","k":["Biojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w"],"nt":"1","n":["EajgD1fBZkCocba-8m6RykhL3yqwIY0zDrnaydSnwOCc"],"bt":"0","b":[],"c":[],"a":[]}"#;

/// SAIDs of the 0x01 identity after rotating to seeds 0x02 then 0x03,
/// committing to 0x03 then 0x04.
pub const ROTATION_SAIDS: [&str; 2] = [
    "ECEOPYqhlFcyffllXLDdGsEeiAk9KcgATtVzf8Lkx0VQ",
    "E6JX_MotR1xYiellbtQFNHQ0vfX3sKv7qa0ViYGC4jS0",
];

/// Byte length of each of those rotations.
pub const ROTATION_SIZE: usize = 350;

/// SAID of the `rot` proposal over seeds 0x01, 0x42, 0x00 with threshold 2.
pub const GROUP_PROPOSAL_SAID: &str = "EYbaVzZ_C_Px5UNtReez-Xk62gW-YTQTr1qYYV7jE_WI";
pub const GROUP_PROPOSAL_SIZE: usize = 440;

/// SAID of the group inception over the same keys with no next digests.
pub const GROUP_INCEPTION_SAID: &str = "E5srFUJB3du7s3oqhLH1yiRfjo2JYwAc5Xx-D5UYKnqQ";
pub const GROUP_INCEPTION_SIZE: usize = 347;

/// Standard base64 signature of `hello` under the 0x42 seed.
pub const HELLO_SIGNATURE_B64: &str =
    "+hDqZG1+6AmUvd3QOUJHm2Gp1Uliz/4+YpU3JmuK3Ea1pgsgTxeYvzI5i8LU7415Gk5K58OetD6DVjzmfTnkBQ==";

pub fn seeded(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

/// Generate the inception event of a golden vector.
pub fn generate_inception_from_vector(vector: &GoldenVector) -> KeyEvent {
    incept(
        &seeded(vector.signing_seed).public_key(),
        &seeded(vector.next_seed).public_key(),
    )
    .expect("golden inception")
}

/// The 0x01 identity's inception and two rotations.
pub fn golden_chain() -> Vec<KeyEvent> {
    let icp = incept(&seeded(0x01).public_key(), &seeded(0x02).public_key())
        .expect("golden inception");
    let mut state = KeyState::incept(&icp).expect("golden state");
    let mut events = vec![icp];
    for (signing, next) in [(0x02, 0x03), (0x03, 0x04)] {
        let rot = rotate(&state, &seeded(signing).public_key(), &seeded(next).public_key())
            .expect("golden rotation");
        state.apply(&rot).expect("golden apply");
        events.push(rot);
    }
    events
}

/// The group request behind the group vectors.
pub fn golden_group_request(event_type: GroupEventType) -> GroupEventRequest {
    let seeds = [(0x01, 0x02), (0x42, 0x43), (0x00, 0x01)];
    GroupEventRequest {
        members: seeds
            .iter()
            .map(|&(s, n)| {
                incept(&seeded(s).public_key(), &seeded(n).public_key())
                    .expect("golden member")
                    .said
            })
            .collect(),
        threshold: 2,
        keys: seeds
            .iter()
            .map(|&(s, _)| seeded(s).public_key().to_encoded())
            .collect(),
        next_digests: Vec::new(),
        event_type,
    }
}

/// Verify all golden vectors against this implementation.
///
/// Returns `(name, matches, computed SAID)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let event = generate_inception_from_vector(v);
            let size = event.to_bytes().map(|b| b.len()).unwrap_or(0);
            let matches = event.said == v.expected_said
                && event.keys[0].as_str() == v.expected_public_key
                && event.next_digests[0].as_str() == v.expected_next_digest
                && size == v.expected_size;
            (v.name.to_string(), matches, event.said)
        })
        .collect()
}
