#![no_main]

use game_wire_protocol::config::CodecConfig;
use game_wire_protocol::protocol::handshake::{GateState, Session};
use game_wire_protocol::schema;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(registry) = schema::registry() else {
        return;
    };
    let mut session = Session::new(registry, CodecConfig::default());

    match session.accept_handshake(data) {
        Ok(read) => {
            assert_eq!(&data[..read], registry.protocol_hash().as_bytes());
            assert_eq!(session.state(), GateState::Verified);
        }
        Err(_) => assert_eq!(session.state(), GateState::Terminated),
    }
});
