#[cfg(test)]
mod integration_tests {
    use grotto::{
        Account, GroupSession, InboundCreationResult, InboundGroupSession, OlmMessage,
        Pickleable, PkDecryption, PkEncryption, PreKeyMessage, Rng, Session, Utility,
    };

    #[test]
    fn test_full_olm_handshake() {
        println!("Step 1: Creating deterministic accounts for Alice and Bob...");
        let alice_rng = Rng::from_seed([0x01; 32]);
        let bob_rng = Rng::from_seed([0x02; 32]);
        let alice_account = Account::new(&alice_rng).unwrap();
        let mut bob_account = Account::new(&bob_rng).unwrap();

        println!("Step 2: Bob publishes one-time keys...");
        bob_account.generate_one_time_keys(5, &bob_rng).unwrap();
        let one_time_key = bob_account.one_time_keys()[&1];
        bob_account.mark_keys_as_published();

        println!("Step 3: Alice creates an outbound session...");
        let mut alice_session = alice_account
            .create_outbound_session(
                bob_account.identity_keys().curve25519,
                one_time_key,
                &alice_rng,
            )
            .unwrap();

        println!("Step 4: Alice encrypts the first message...");
        let message = alice_session.encrypt(b"Hello Bob", &alice_rng).unwrap();
        assert_eq!(message.message_type(), 0, "the first message is a pre-key message");
        let OlmMessage::PreKey(pre_key) = message else {
            panic!("expected a pre-key message");
        };

        println!("Step 5: Bob creates an inbound session and reads it...");
        let InboundCreationResult {
            session: mut bob_session,
            plaintext,
        } = bob_account.create_inbound_session(&pre_key).unwrap();
        assert_eq!(plaintext, b"Hello Bob");

        println!("Step 6: Bob replies with a normal message...");
        let reply = bob_session.encrypt(b"Hi Alice", &bob_rng).unwrap();
        assert_eq!(reply.message_type(), 1);

        println!("Step 7: Alice decrypts the reply...");
        assert_eq!(alice_session.decrypt(&reply).unwrap(), b"Hi Alice");

        println!("Step 8: Both ends agree on the session id...");
        assert_eq!(alice_session.session_id(), bob_session.session_id());
    }

    #[test]
    fn test_out_of_order_delivery_drains_the_skipped_cache() {
        let rng = Rng::new();
        let (mut alice_session, mut bob_session) = establish_sessions(&rng);

        let messages: Vec<(String, OlmMessage)> = (0..10)
            .map(|i| {
                let plaintext = format!("P{i}");
                let encrypted = alice_session.encrypt(plaintext.as_bytes(), &rng).unwrap();
                (plaintext, encrypted)
            })
            .collect();

        for index in [3usize, 0, 7, 1, 9, 2, 8, 4, 5, 6] {
            let (plaintext, encrypted) = &messages[index];
            assert_eq!(
                bob_session.decrypt(encrypted).unwrap(),
                plaintext.as_bytes(),
                "message {index} should decrypt out of order"
            );
        }

        // Every skipped key was consumed exactly once; replaying any
        // message now fails.
        for (_, encrypted) in &messages {
            assert!(bob_session.decrypt(encrypted).is_err());
        }
    }

    #[test]
    fn test_one_time_keys_are_single_use() {
        let rng = Rng::new();
        let alice_account = Account::new(&rng).unwrap();
        let mut bob_account = Account::new(&rng).unwrap();

        bob_account.generate_one_time_keys(1, &rng).unwrap();
        let one_time_key = *bob_account.one_time_keys().values().next().unwrap();

        let mut alice_session = alice_account
            .create_outbound_session(bob_account.identity_keys().curve25519, one_time_key, &rng)
            .unwrap();

        let OlmMessage::PreKey(pre_key) = alice_session.encrypt(b"Hello", &rng).unwrap() else {
            panic!("expected a pre-key message");
        };

        let result = bob_account.create_inbound_session(&pre_key).unwrap();
        assert_eq!(result.plaintext, b"Hello");

        // The key is gone from both pools.
        assert!(bob_account.one_time_keys().is_empty());
        assert!(bob_account.remove_one_time_key(&one_time_key).is_err());

        // A second inbound session from the same message no longer finds
        // the key.
        assert!(bob_account.create_inbound_session(&pre_key).is_err());

        // The established session still recognizes the message.
        assert!(result.session.matches_inbound(&pre_key));
    }

    #[test]
    fn test_account_pickle_round_trip() {
        let rng = Rng::new();
        let mut account = Account::new(&rng).unwrap();
        account.generate_one_time_keys(4, &rng).unwrap();
        account.generate_fallback_key(&rng).unwrap();

        let pickled = account.pickle(b"pw");
        let restored = Account::unpickle(&pickled, b"pw").unwrap();

        assert_eq!(restored.identity_keys(), account.identity_keys());
        assert_eq!(restored.one_time_keys(), account.one_time_keys());

        assert!(Account::unpickle(&pickled, b"other").is_err());
    }

    #[test]
    fn test_megolm_group_flow() {
        println!("Step 1: Creating the outbound group session...");
        let rng = Rng::from_seed([0x05; 32]);
        let mut outbound = GroupSession::new(&rng).unwrap();

        println!("Step 2: Sharing the session key with a receiver...");
        let mut inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();

        println!("Step 3: Encrypting three messages...");
        let m0 = outbound.encrypt(b"m0");
        let m1 = outbound.encrypt(b"m1");
        let m2 = outbound.encrypt(b"m2");

        println!("Step 4: Decrypting them out of order...");
        assert_eq!(inbound.decrypt(&m2).unwrap(), (b"m2".to_vec(), 2));
        assert_eq!(inbound.decrypt(&m0).unwrap(), (b"m0".to_vec(), 0));
        assert_eq!(inbound.decrypt(&m1).unwrap(), (b"m1".to_vec(), 1));

        println!("Step 5: A flipped ciphertext bit breaks the signature...");
        let mut bytes = m1.to_bytes();
        // Flip one bit inside the ciphertext field.
        bytes[6] ^= 0x01;
        let tampered = grotto::MegolmMessage::from_bytes(&bytes).unwrap();
        assert!(inbound.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_megolm_export_boundaries() {
        let rng = Rng::new();
        let mut outbound = GroupSession::new(&rng).unwrap();
        let inbound = InboundGroupSession::new(&outbound.session_key()).unwrap();

        let messages: Vec<_> = (0..5).map(|i| outbound.encrypt(format!("m{i}").as_bytes())).collect();

        let exported = inbound.export_at(2).unwrap();
        let mut imported = InboundGroupSession::import(&exported);

        for (index, message) in messages.iter().enumerate() {
            let result = imported.decrypt(message);
            if index >= 2 {
                assert_eq!(result.unwrap().0, format!("m{index}").into_bytes());
            } else {
                assert!(result.is_err(), "index {index} is before the export");
            }
        }
    }

    #[test]
    fn test_pk_round_trip_and_mac_failure() {
        let rng = Rng::new();
        let pk_dec = PkDecryption::new(&rng).unwrap();
        let pk_enc = PkEncryption::from_key(pk_dec.public_key());

        let message = pk_enc.encrypt(b"ping", &rng).unwrap();
        assert_eq!(pk_dec.decrypt(&message).unwrap(), b"ping");

        // Rebuild the message with a corrupted MAC.
        let mut mac = message.mac().into_bytes();
        mac[0] = if mac[0] == b'A' { b'B' } else { b'A' };
        let mac = String::from_utf8(mac).unwrap();

        let tampered = grotto::PkMessage::from_base64_parts(
            &message.ciphertext(),
            &mac,
            &message.ephemeral_key(),
        )
        .unwrap();
        assert!(pk_dec.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_utility_round_trip() {
        let rng = Rng::new();
        let account = Account::new(&rng).unwrap();
        let utility = Utility::new();

        let signature = account.sign(b"device keys");
        assert!(
            utility
                .ed25519_verify(
                    &account.identity_keys().ed25519.to_base64(),
                    b"device keys",
                    &signature.to_base64(),
                )
                .is_ok()
        );

        assert!(utility.ed25519_verify("", b"", "").is_err());
        assert_eq!(utility.sha256(b"input").len(), 43);
    }

    #[test]
    fn test_session_survives_pickling_mid_conversation() {
        let rng = Rng::new();
        let (mut alice_session, bob_session) = establish_sessions(&rng);

        let in_flight = alice_session.encrypt(b"sent before pickling", &rng).unwrap();

        let pickled = bob_session.pickle(b"pw");
        let mut restored = Session::unpickle(&pickled, b"pw").unwrap();

        assert_eq!(
            restored.decrypt(&in_flight).unwrap(),
            b"sent before pickling"
        );

        let reply = restored.encrypt(b"replied after restoring", &rng).unwrap();
        assert_eq!(
            alice_session.decrypt(&reply).unwrap(),
            b"replied after restoring"
        );
    }

    #[test]
    fn test_messages_cross_the_base64_boundary() {
        let rng = Rng::new();
        let (mut alice_session, mut bob_session) = establish_sessions(&rng);

        let message = alice_session.encrypt(b"over the wire", &rng).unwrap();
        let (message_type, encoded) = (message.message_type(), message.to_base64());

        let received = OlmMessage::from_parts(message_type, &encoded).unwrap();
        assert_eq!(bob_session.decrypt(&received).unwrap(), b"over the wire");
    }

    /// Runs the pre-key handshake and leaves both sessions established.
    fn establish_sessions(rng: &Rng) -> (Session, Session) {
        let alice_account = Account::new(rng).unwrap();
        let mut bob_account = Account::new(rng).unwrap();

        bob_account.generate_one_time_keys(1, rng).unwrap();
        let one_time_key = *bob_account.one_time_keys().values().next().unwrap();
        bob_account.mark_keys_as_published();

        let mut alice_session = alice_account
            .create_outbound_session(bob_account.identity_keys().curve25519, one_time_key, rng)
            .unwrap();

        let OlmMessage::PreKey(pre_key) = alice_session.encrypt(b"bootstrap", rng).unwrap() else {
            panic!("expected a pre-key message");
        };
        let pre_key = PreKeyMessage::from_bytes(&pre_key.to_bytes()).unwrap();

        let InboundCreationResult {
            session: mut bob_session,
            plaintext,
        } = bob_account.create_inbound_session(&pre_key).unwrap();
        assert_eq!(plaintext, b"bootstrap");

        // Complete one round trip so both chains are live.
        let reply = bob_session.encrypt(b"ack", rng).unwrap();
        assert_eq!(alice_session.decrypt(&reply).unwrap(), b"ack");

        (alice_session, bob_session)
    }
}
