#![no_main]

use game_wire_protocol::config::CodecConfig;
use game_wire_protocol::protocol::codec::{Codec, WireRecord};
use game_wire_protocol::schema::{self, IdChain, InteractionConfig, ItemCategory};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(registry) = schema::registry() else {
        return;
    };
    let codec = Codec::new(registry, CodecConfig::default());

    for layout in [
        InteractionConfig::layout(),
        ItemCategory::layout(),
        IdChain::layout(),
    ]
    .into_iter()
    .flatten()
    {
        // Validation must accept exactly what decode accepts
        let validation = codec.validate(layout, data, 0);
        let decoded = codec.decode(layout, data, 0);
        assert_eq!(validation.is_ok(), decoded.is_ok());

        if let Ok((record, consumed)) = decoded {
            assert_eq!(validation.consumed_bytes(), Some(consumed));
            // Absent slots and boolean bytes normalize, sizes do not
            let bytes = codec.encode_to_vec(&record).expect("decoded record encodes");
            assert_eq!(bytes.len(), consumed);
            assert!(codec.validate(layout, &bytes, 0).is_ok());
        }
    }
});
