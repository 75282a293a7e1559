use crate::error::EncodeError;
use crate::opcode::*;
use crate::value::{LegacyDialect, Value};

/// Encode `value` as a complete top-level stream: version byte, opcodes,
/// STOP.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    out.push(VERSION);
    encode_value(value, &mut out)?;
    out.push(STOP);
    Ok(out)
}

fn write_int4(out: &mut Vec<u8>, len: usize, what: &'static str) -> Result<(), EncodeError> {
    if len as i64 > FOUR_BYTE_INT_MAX {
        return Err(EncodeError::LengthOverflow { what, len });
    }
    out.extend_from_slice(&(len as i32).to_be_bytes());
    Ok(())
}

fn write_byte_sequence(out: &mut Vec<u8>, bytes: &[u8], what: &'static str) -> Result<(), EncodeError> {
    write_int4(out, bytes.len(), what)?;
    out.extend_from_slice(bytes);
    Ok(())
}

fn encode_value(value: &Value, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match value {
        Value::None => out.push(NONE),
        Value::Bool(true) => out.push(TRUE),
        Value::Bool(false) => out.push(FALSE),
        Value::Int(i) => {
            out.push(INT);
            out.extend_from_slice(&i.to_be_bytes());
        }
        Value::Float(f) => {
            out.push(FLOAT);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Value::Bytes(b) => {
            out.push(BYTES);
            write_byte_sequence(out, b, "byte string")?;
        }
        Value::Text(s) => {
            out.push(UNICODE);
            write_byte_sequence(out, s.as_bytes(), "text string")?;
        }
        Value::Legacy(LegacyDialect::A, b) => {
            out.push(LEGACY_A);
            write_byte_sequence(out, b, "legacy dialect-A string")?;
        }
        Value::Legacy(LegacyDialect::B, b) => {
            out.push(LEGACY_B);
            write_byte_sequence(out, b, "legacy dialect-B string")?;
        }
        Value::List(items) => {
            out.push(NEWLIST);
            write_int4(out, items.len(), "list")?;
            for (i, item) in items.iter().enumerate() {
                encode_value(&Value::Int(i as i32), out)?;
                encode_value(item, out)?;
                out.push(SETITEM);
            }
        }
        Value::Map(entries) => {
            out.push(NEWDICT);
            for (k, v) in entries {
                encode_value(k, out)?;
                encode_value(v, out)?;
                out.push(SETITEM);
            }
        }
        Value::Tuple(items) => {
            for item in items {
                encode_value(item, out)?;
            }
            out.push(BUILDTUPLE);
            write_int4(out, items.len(), "tuple")?;
        }
    }
    Ok(())
}
