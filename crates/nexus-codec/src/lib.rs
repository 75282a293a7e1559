//! The cross-interpreter value codec.
//!
//! Encodes and decodes the closed set of [`Value`] shapes to/from a
//! stack-based opcode byte stream.

mod decode;
mod encode;
mod error;
pub mod opcode;
mod value;

pub use decode::decode;
pub use encode::encode;
pub use error::{DecodeError, EncodeError};
pub use opcode::VERSION;
pub use value::{DialectOptions, LegacyDialect, Value};

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let bytes = encode(&v).expect("encode");
        let back = decode(&bytes, &DialectOptions::default()).expect("decode");
        assert_eq!(back, v);
    }

    #[test]
    fn roundtrip_scalars() {
        roundtrip(Value::None);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
        roundtrip(Value::Int(-42));
        roundtrip(Value::Int(i32::MAX));
        roundtrip(Value::Int(i32::MIN));
        roundtrip(Value::Float(3.5));
        roundtrip(Value::Bytes(vec![0, 1, 2, 255]));
        roundtrip(Value::Text("ä".to_owned()));
    }

    #[test]
    fn roundtrip_nested() {
        roundtrip(Value::Tuple(vec![
            Value::Int(1),
            Value::Text("ä".to_owned()),
            Value::Bytes(vec![0, 1]),
            Value::Float(3.5),
            Value::None,
            Value::List(vec![
                Value::Bool(true),
                Value::Map(vec![(Value::Text("k".to_owned()), Value::Int(2))]),
            ]),
        ]));
    }

    #[test]
    fn roundtrip_empty_containers() {
        roundtrip(Value::List(vec![]));
        roundtrip(Value::Map(vec![]));
        roundtrip(Value::Tuple(vec![]));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut bytes = encode(&Value::None).unwrap();
        bytes[0] = 2;
        let err = decode(&bytes, &DialectOptions::default()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::VersionMismatch {
                got: 2,
                expected: 1
            }
        );
    }

    #[test]
    fn integer_overflow_is_rejected() {
        let huge = vec![0u8; (i32::MAX as usize) + 1];
        let err = encode(&Value::Bytes(huge)).unwrap_err();
        match err {
            EncodeError::LengthOverflow { what, .. } => assert_eq!(what, "byte string"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn legacy_dialect_options_affect_decode() {
        let bytes = encode(&Value::Legacy(LegacyDialect::A, vec![0xe9])).unwrap();
        let as_bytes = decode(&bytes, &DialectOptions::default()).unwrap();
        assert_eq!(as_bytes, Value::Bytes(vec![0xe9]));

        let opts = DialectOptions {
            legacy_a_as_text: true,
            legacy_b_as_text: false,
        };
        let as_text = decode(&bytes, &opts).unwrap();
        assert_eq!(as_text, Value::Text("é".to_owned()));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let bytes = encode(&Value::Int(1)).unwrap();
        let err = decode(&bytes[..bytes.len() - 2], &DialectOptions::default()).unwrap_err();
        assert_eq!(err, DecodeError::Truncated);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let bytes = vec![VERSION, b'?', STOP_BYTE_FOR_TEST];
        let err = decode(&bytes, &DialectOptions::default()).unwrap_err();
        assert_eq!(err, DecodeError::UnknownOpcode(b'?'));
    }

    const STOP_BYTE_FOR_TEST: u8 = b'S';
}
