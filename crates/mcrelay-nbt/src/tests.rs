use crate::{parse, serialize, Compound, NbtError, Value};

fn round_trip(bytes: &[u8]) {
    let value = parse(bytes).expect("parse should succeed");
    let out = serialize(&value);
    assert_eq!(out, bytes);
}

#[test]
fn round_trips_empty_named_compound() {
    // TAG_Compound "" { TAG_Compound "Level" {} }
    let mut bytes = vec![10, 0, 0]; // tag=Compound, name len=0
    bytes.push(10); // child tag=Compound
    bytes.extend_from_slice(&5_i16.to_be_bytes());
    bytes.extend_from_slice(b"Level");
    bytes.push(0); // end of Level
    round_trip(&bytes);
}

#[test]
fn round_trips_scalar_fields_in_order() {
    let mut bytes = vec![10, 0, 0];
    // Byte "b" = -1
    bytes.push(1);
    bytes.extend_from_slice(&1_i16.to_be_bytes());
    bytes.push(b'b');
    bytes.push(0xFF);
    // Int "i" = 42
    bytes.push(3);
    bytes.extend_from_slice(&1_i16.to_be_bytes());
    bytes.push(b'i');
    bytes.extend_from_slice(&42_i32.to_be_bytes());
    // String "s" = "hi"
    bytes.push(8);
    bytes.extend_from_slice(&1_i16.to_be_bytes());
    bytes.push(b's');
    bytes.extend_from_slice(&2_i16.to_be_bytes());
    bytes.extend_from_slice(b"hi");
    bytes.push(0); // end root child

    let value = parse(&bytes).expect("parse should succeed");
    let Value::Compound(root) = &value else {
        panic!("expected compound root")
    };
    let inner = root.get("").unwrap().as_compound().unwrap();
    assert_eq!(inner.get("i").unwrap().as_int(), Some(42));
    round_trip(&bytes);
}

#[test]
fn preserves_item_insertion_order() {
    let mut bytes = vec![10, 0, 0];
    for name in ["z", "a", "m"] {
        bytes.push(3);
        bytes.extend_from_slice(&(name.len() as i16).to_be_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&0_i32.to_be_bytes());
    }
    bytes.push(0);

    let value = parse(&bytes).expect("parse should succeed");
    let Value::Compound(root) = &value else {
        panic!("expected compound root")
    };
    let inner = root.get("").unwrap().as_compound().unwrap();
    let names: Vec<&str> = inner.iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["z", "a", "m"]);
}

#[test]
fn rejects_unknown_tag() {
    let bytes = [10, 0, 0, 200, 0, 0, 0];
    assert!(matches!(parse(&bytes), Err(NbtError::UnknownTag(200))));
}

#[test]
fn rejects_truncated_string() {
    let mut bytes = vec![10, 0, 0];
    bytes.push(8);
    bytes.extend_from_slice(&1_i16.to_be_bytes());
    bytes.push(b's');
    bytes.extend_from_slice(&10_i16.to_be_bytes()); // claims 10 bytes, has none
    assert!(matches!(parse(&bytes), Err(NbtError::Eof)));
}

#[test]
fn rejects_negative_byte_array_length() {
    let mut bytes = vec![10, 0, 0];
    bytes.push(7);
    bytes.extend_from_slice(&1_i16.to_be_bytes());
    bytes.push(b'a');
    bytes.extend_from_slice(&(-1_i32).to_be_bytes());
    assert!(matches!(parse(&bytes), Err(NbtError::NegativeLength(-1))));
}

#[test]
fn chunk_shaped_round_trip() {
    let mut level = Compound::new();
    level.insert("Blocks", Value::ByteArray(vec![1_u8; 32768]));
    level.insert("Data", Value::ByteArray(vec![0_u8; 16384]));
    level.insert("SkyLight", Value::ByteArray(vec![0xFF_u8; 16384]));
    level.insert("BlockLight", Value::ByteArray(vec![0_u8; 16384]));
    level.insert("xPos", Value::Int(0));
    level.insert("zPos", Value::Int(0));

    let mut root = Compound::new();
    root.insert("Level", Value::Compound(level));

    let mut wrapper = Compound::new();
    wrapper.insert("", Value::Compound(root));

    let value = Value::Compound(wrapper);
    let bytes = serialize(&value);
    let reparsed = parse(&bytes).expect("parse should succeed");
    assert_eq!(value, reparsed);
}
