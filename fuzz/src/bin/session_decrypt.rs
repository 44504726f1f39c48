#[macro_use]
extern crate afl;
use grotto::{Account, Message, OlmMessage, Rng, Session};

fn get_session() -> Session {
    // The victim
    let rng = Rng::from_seed([0x13; 32]);
    let alice = Account::new(&rng).expect("Setup failed");

    // The attacker context
    let mut bob = Account::new(&rng).expect("Setup failed");
    bob.generate_one_time_keys(1, &rng).expect("Setup failed");
    let one_time_key = *bob
        .one_time_keys()
        .values()
        .next()
        .expect("Setup failed");

    alice
        .create_outbound_session(bob.identity_keys().curve25519, one_time_key, &rng)
        .expect("Setup failed")
}

fn main() {
    let mut session = get_session();

    fuzz!(|data: &[u8]| {
        if let Ok(message) = Message::from_bytes(data) {
            let _ = session.decrypt(&OlmMessage::Normal(message));
        }
    });
}
