//! Binary module round-trip and malformed-input scenarios (§8 scenario 7,
//! generalized from a raw LEB128 round-trip to a whole-module one).

use wasm_runtime::prelude::*;

fn add_one_module() -> Module {
    let ty = FuncType::new(vec![ValueType::I32], vec![ValueType::I32]);
    Module {
        types: vec![ty],
        functions: vec![Function {
            type_index: 0,
            body: FunctionBody {
                locals: vec![],
                instructions: vec![Instruction::LocalGet(0), Instruction::I32Const(1), Instruction::I32Add, Instruction::End],
            },
        }],
        exports: vec![Export { name: "add_one".to_string(), desc: ExportDesc::Function(0) }],
        ..Module::default()
    }
}

#[test]
fn module_survives_encode_decode_roundtrip() {
    let module = add_one_module();
    let bytes = encode_module(&module);
    let decoded = decode_module(&bytes).expect("decode should succeed");
    assert_eq!(module, decoded);
}

#[test]
fn decoded_module_runs_identically_to_the_original() {
    let module = add_one_module();
    let bytes = encode_module(&module);
    let decoded = decode_module(&bytes).unwrap();

    let engine = Engine::default();
    let mut store = Store::new(&engine);
    store.add_module("m", &decoded, &Imports::new()).unwrap();
    let addr = store.get_function("m", "add_one").unwrap();
    assert_eq!(store.invoke(addr, vec![Value::I32(41)]).unwrap(), vec![Value::I32(42)]);
}

#[test]
fn rejects_bad_magic() {
    let bytes = [0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
    assert!(matches!(decode_module(&bytes), Err(DecodeError::BadMagic { .. })));
}

#[test]
fn rejects_bad_version() {
    let bytes = [0x00, 0x61, 0x73, 0x6d, 0x02, 0x00, 0x00, 0x00];
    assert!(matches!(decode_module(&bytes), Err(DecodeError::BadVersion { .. })));
}

#[test]
fn rejects_truncated_section() {
    let mut bytes = encode_module(&add_one_module());
    bytes.truncate(bytes.len() - 1);
    assert!(decode_module(&bytes).is_err());
}

#[test]
fn rejects_trailing_bytes_after_a_complete_module() {
    let mut bytes = encode_module(&add_one_module());
    bytes.push(0xff);
    assert!(matches!(decode_module(&bytes), Err(DecodeError::TrailingBytes)));
}
