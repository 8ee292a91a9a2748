use proptest::prelude::*;

use robot_relay::protocol::is_stale;
use robot_relay::{Message, Role, TokenSigner};

// --- Strategies ---

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Robot), Just(Role::Operator)]
}

fn other_role(role: Role) -> Role {
    match role {
        Role::Robot => Role::Operator,
        Role::Operator => Role::Robot,
    }
}

// --- Token verification ---

proptest! {
    #[test]
    fn own_token_verifies(secret in "[ -~]{1,32}", role in arb_role(), id in "[a-z0-9-]{0,24}") {
        let signer = TokenSigner::new(&secret).unwrap();
        let token = signer.sign(role, &id);
        prop_assert_eq!(token.len(), 64);
        prop_assert!(signer.verify(role, &id, &token));
    }

    #[test]
    fn token_bound_to_role(role in arb_role(), id in "[a-z0-9-]{1,24}") {
        let signer = TokenSigner::new("supersecret").unwrap();
        let token = signer.sign(role, &id);
        prop_assert!(!signer.verify(other_role(role), &id, &token));
    }

    #[test]
    fn token_bound_to_id(role in arb_role(), a in "[a-z0-9]{1,16}", b in "[a-z0-9]{1,16}") {
        prop_assume!(a != b);
        let signer = TokenSigner::new("supersecret").unwrap();
        prop_assert!(!signer.verify(role, &b, &signer.sign(role, &a)));
    }

    #[test]
    fn token_bound_to_secret(a in "[a-z]{1,16}", b in "[a-z]{1,16}", role in arb_role()) {
        prop_assume!(a != b);
        let signer_a = TokenSigner::new(&a).unwrap();
        let signer_b = TokenSigner::new(&b).unwrap();
        prop_assert!(!signer_b.verify(role, "R1", &signer_a.sign(role, "R1")));
    }

    #[test]
    fn single_flipped_digit_rejected(role in arb_role(), position in 0usize..64) {
        let signer = TokenSigner::new("supersecret").unwrap();
        let mut token = signer.sign(role, "robot-001").into_bytes();
        token[position] = if token[position] == b'0' { b'1' } else { b'0' };
        let token = String::from_utf8(token).unwrap();
        prop_assert!(!signer.verify(role, "robot-001", &token));
    }

    #[test]
    fn case_variants_never_verify(role in arb_role(), mask in proptest::collection::vec(any::<bool>(), 64)) {
        let signer = TokenSigner::new("supersecret").unwrap();
        let token = signer.sign(role, "robot-001");
        let variant: String = token
            .chars()
            .zip(&mask)
            .map(|(c, &upper)| if upper { c.to_ascii_uppercase() } else { c })
            .collect();
        prop_assume!(variant != token);
        prop_assert!(!signer.verify(role, "robot-001", &variant));
    }

    #[test]
    fn arbitrary_strings_never_verify(role in arb_role(), token in "\\PC{0,80}") {
        let signer = TokenSigner::new("supersecret").unwrap();
        prop_assume!(token != signer.sign(role, "R1"));
        prop_assert!(!signer.verify(role, "R1", &token));
    }
}

// --- Freshness ---

proptest! {
    #[test]
    fn stale_iff_older_than_limit(ts in 0i64..1_000_000, age in 0i64..10_000, limit in 0u64..5_000) {
        let now = ts + age;
        prop_assert_eq!(is_stale(ts, now, limit), age.unsigned_abs() > limit);
    }

    #[test]
    fn future_frames_never_stale(ts in 0i64..1_000_000, ahead in 1i64..10_000, limit in 0u64..5_000) {
        prop_assert!(!is_stale(ts + ahead, ts, limit));
    }
}

// --- Message parsing ---

proptest! {
    #[test]
    fn unknown_types_parse_as_unknown(kind in "[a-z]{1,12}") {
        prop_assume!(!["auth", "telemetry", "cmd", "ping", "pong", "chat"].contains(&kind.as_str()));
        let text = format!(r#"{{"type":"{kind}","id":"R1"}}"#);
        let message: Message = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(message, Message::Unknown);
    }

    #[test]
    fn telemetry_parses_any_sample(ts in any::<i64>(), bat in 0.0f64..5.0, temp in -40.0f64..120.0) {
        let text = serde_json::json!({"type": "telemetry", "id": "R1", "ts": ts, "bat": bat, "temp": temp}).to_string();
        let message: Message = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(message.kind(), "telemetry");
    }
}
