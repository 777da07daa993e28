#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for hostile and damaged input
//! Truncation, offset tampering, malformed prefixes, limits and depth bounds

use game_wire_protocol::config::CodecConfig;
use game_wire_protocol::core::layout::{ElementKind, FieldKind, PrimitiveType, RecordLayout};
use game_wire_protocol::core::value::{Record, Value};
use game_wire_protocol::error::ErrorKind;
use game_wire_protocol::protocol::codec::{Codec, WireRecord};
use game_wire_protocol::schema::{
    self, IdChain, InteractionConfig, InteractionTarget, ItemCategory, ParamValue, Selector,
    Vector3f,
};

fn codec() -> Codec<'static> {
    Codec::new(schema::registry().unwrap(), CodecConfig::default())
}

fn interaction() -> InteractionConfig {
    InteractionConfig::new("blast", InteractionTarget::Owner)
        .with_cooldown(2.0)
        .with_selector(Selector::AoeCircle {
            range: 3.0,
            offset: Vector3f::new(0.0, 1.0, 0.0),
        })
        .with_param(ParamValue::Double(0.75))
        .with_param(ParamValue::String("fire".into()))
        .with_tag("vfx", "explosion")
        .with_tag("sfx", "boom")
}

fn category_tree() -> ItemCategory {
    ItemCategory::new("root", 0).with_children(vec![
        ItemCategory::new("a", 1)
            .with_name("A")
            .with_children(vec![ItemCategory::new("a1", 0).with_icon("a1.png")]),
        ItemCategory::new("b", 2),
    ])
}

// ============================================================================
// TRUNCATION
// ============================================================================

fn assert_every_truncation_fails<T: WireRecord>(bytes: &[u8]) {
    let codec = codec();
    for k in 0..bytes.len() {
        let result = codec.validate_value::<T>(&bytes[..k], 0);
        assert!(!result.is_ok(), "truncation at {k} validated");
        assert!(
            codec.decode_value::<T>(&bytes[..k], 0).is_err(),
            "truncation at {k} decoded"
        );
    }
    assert!(codec.validate_value::<T>(bytes, 0).is_ok());
}

#[test]
fn test_truncated_interaction_always_rejected() {
    let bytes = codec().encode_value_to_vec(&interaction()).unwrap();
    assert_every_truncation_fails::<InteractionConfig>(&bytes);
}

#[test]
fn test_truncated_category_tree_always_rejected() {
    let bytes = codec().encode_value_to_vec(&category_tree()).unwrap();
    assert_every_truncation_fails::<ItemCategory>(&bytes);
}

#[test]
fn test_truncated_chain_always_rejected() {
    let chain = IdChain::new("x").with_parent(IdChain::new("yy").with_parent(IdChain::new("zzz")));
    let bytes = codec().encode_value_to_vec(&chain).unwrap();
    assert_every_truncation_fails::<IdChain>(&bytes);
}

// ============================================================================
// OFFSET TABLE AND BITMASK TAMPERING
// ============================================================================

#[test]
fn test_shifted_offset_rejected() {
    let codec = codec();
    let mut bytes = codec.encode_value_to_vec(&category_tree()).unwrap();
    let layout = ItemCategory::layout().unwrap();

    // The "children" slot is the last of four after bitmask(1) + order(4).
    let slot = layout.placement(4).unwrap().position;
    let offset = u32::from_le_bytes(bytes[slot..slot + 4].try_into().unwrap());
    bytes[slot..slot + 4].copy_from_slice(&(offset + 1).to_le_bytes());

    let result = codec.validate_value::<ItemCategory>(&bytes, 0);
    assert_eq!(result.reason(), Some(ErrorKind::InvalidOffset));
    assert_eq!(
        codec.decode_value::<ItemCategory>(&bytes, 0).unwrap_err().kind(),
        ErrorKind::InvalidOffset
    );
}

#[test]
fn test_offset_beyond_buffer_rejected() {
    let codec = codec();
    let mut bytes = codec.encode_value_to_vec(&IdChain::new("id")).unwrap();
    // id slot sits right after the one-byte bitmask
    bytes[1..5].copy_from_slice(&u32::MAX.to_le_bytes());

    let result = codec.validate_value::<IdChain>(&bytes, 0);
    assert_eq!(result.reason(), Some(ErrorKind::InvalidOffset));
}

#[test]
fn test_bitmask_padding_bits_rejected() {
    let codec = codec();
    let mut bytes = codec.encode_value_to_vec(&IdChain::new("id")).unwrap();
    bytes[0] |= 0x80;

    let result = codec.validate_value::<IdChain>(&bytes, 0);
    assert_eq!(result.reason(), Some(ErrorKind::BitmaskInconsistent));
}

#[test]
fn test_absent_slot_contents_ignored() {
    let codec = codec();
    let mut bytes = codec.encode_value_to_vec(&IdChain::new("solo")).unwrap();
    // Parent is absent; garbage in its slot must not matter.
    bytes[5..9].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

    let (decoded, _) = codec.decode_value::<IdChain>(&bytes, 0).unwrap();
    assert_eq!(decoded, IdChain::new("solo"));
}

#[test]
fn test_bit_claiming_absent_field_is_checked() {
    let codec = codec();
    let mut bytes = codec.encode_value_to_vec(&IdChain::new("solo")).unwrap();
    // Claim a parent that was never written.
    bytes[0] |= 0x01;

    assert!(!codec.validate_value::<IdChain>(&bytes, 0).is_ok());
    assert!(codec.decode_value::<IdChain>(&bytes, 0).is_err());
}

// ============================================================================
// PREFIXES AND LIMITS
// ============================================================================

fn text_layout() -> std::sync::Arc<RecordLayout> {
    RecordLayout::builder("Text")
        .field("s", FieldKind::VariableString)
        .build()
        .unwrap()
}

#[test]
fn test_malformed_varint_rejected() {
    let codec = codec();
    let buf = [0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
    let result = codec.validate(&text_layout(), &buf, 0);
    assert_eq!(result.reason(), Some(ErrorKind::MalformedVarInt));
}

#[test]
fn test_string_over_configured_limit() {
    let config = CodecConfig {
        max_string_len: 4,
        ..CodecConfig::default()
    };
    let codec = Codec::new(schema::registry().unwrap(), config);
    let buf = [0, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o'];

    let result = codec.validate(&text_layout(), &buf, 0);
    assert_eq!(result.reason(), Some(ErrorKind::LengthExceedsCapacity));

    let record = Record::builder(&text_layout())
        .set("s", Value::string("hello"))
        .unwrap()
        .build()
        .unwrap();
    let err = codec.encode_to_vec(&record).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LengthExceedsCapacity);
}

#[test]
fn test_huge_collection_count_rejected_without_allocation() {
    let layout = RecordLayout::builder("Many")
        .field(
            "v",
            FieldKind::VariableCollection(ElementKind::Primitive(PrimitiveType::U64)),
        )
        .build()
        .unwrap();
    // count = 2^31 - 1
    let buf = [0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0x07];
    let codec = codec();
    assert!(!codec.validate(&layout, &buf, 0).is_ok());
    assert!(codec.decode(&layout, &buf, 0).is_err());
}

#[test]
fn test_invalid_enum_byte_rejected() {
    let codec = codec();
    let mut bytes = codec.encode_value_to_vec(&interaction()).unwrap();
    let layout = InteractionConfig::layout().unwrap();
    let target_at = layout.placement(1).unwrap().position;
    bytes[target_at] = 9;

    let result = codec.validate_value::<InteractionConfig>(&bytes, 0);
    assert_eq!(result.reason(), Some(ErrorKind::InvalidEnumValue));
}

#[test]
fn test_decode_at_offset_past_end() {
    let codec = codec();
    let bytes = codec.encode_value_to_vec(&IdChain::new("a")).unwrap();
    let err = codec
        .decode_value::<IdChain>(&bytes, bytes.len() + 10)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TruncatedInput);
}

// ============================================================================
// DEPTH
// ============================================================================

#[test]
fn test_depth_limit_applies_to_encode_and_decode() {
    let mut chain = IdChain::new("0");
    for i in 1..10 {
        chain = IdChain::new(i.to_string()).with_parent(chain);
    }
    let bytes = codec().encode_value_to_vec(&chain).unwrap();

    let shallow = Codec::new(
        schema::registry().unwrap(),
        CodecConfig::default().with_max_depth(5),
    );
    assert_eq!(
        shallow.encode_value_to_vec(&chain).unwrap_err().kind(),
        ErrorKind::DepthExceeded
    );
    assert_eq!(
        shallow.validate_value::<IdChain>(&bytes, 0).reason(),
        Some(ErrorKind::DepthExceeded)
    );
    assert_eq!(
        shallow.bytes_consumed_value::<IdChain>(&bytes, 0).unwrap_err().kind(),
        ErrorKind::DepthExceeded
    );

    // Exactly at the limit is fine: ten links are depths 0..=9.
    let exact = Codec::new(
        schema::registry().unwrap(),
        CodecConfig::default().with_max_depth(9),
    );
    assert!(exact.decode_value::<IdChain>(&bytes, 0).is_ok());
}

#[test]
fn test_variant_records_count_towards_depth() {
    let config = interaction();
    let bytes = codec().encode_value_to_vec(&config).unwrap();

    // Root is depth 0; selector and params records are depth 1; the embedded
    // Vector3f inside the selector is depth 2.
    let tight = Codec::new(
        schema::registry().unwrap(),
        CodecConfig::default().with_max_depth(1),
    );
    assert_eq!(
        tight.validate_value::<InteractionConfig>(&bytes, 0).reason(),
        Some(ErrorKind::DepthExceeded)
    );
    let enough = Codec::new(
        schema::registry().unwrap(),
        CodecConfig::default().with_max_depth(2),
    );
    assert!(enough.validate_value::<InteractionConfig>(&bytes, 0).is_ok());
}
