#[macro_use]
extern crate afl;
use grotto::{MegolmMessage, Message, PreKeyMessage, SessionKey};

fn main() {
    fuzz!(|data: &[u8]| {
        let _ = Message::from_bytes(data);
        let _ = PreKeyMessage::from_bytes(data);
        let _ = MegolmMessage::from_bytes(data);
        let _ = SessionKey::from_bytes(data);
    });
}
