use crate::error::DecodeError;
use crate::opcode::*;
use crate::value::{DialectOptions, LegacyDialect, Value};

/// Decode a complete top-level stream produced by [`crate::encode`].
///
/// `opts` controls how the two legacy-dialect opcodes are surfaced; see
/// [`DialectOptions`].
pub fn decode(bytes: &[u8], opts: &DialectOptions) -> Result<Value, DecodeError> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let version = cursor.read_u8()?;
    if version != VERSION {
        return Err(DecodeError::VersionMismatch {
            got: version,
            expected: VERSION,
        });
    }

    let mut stack: Vec<Value> = Vec::new();
    loop {
        let opcode = cursor.read_u8()?;
        match opcode {
            STOP => break,
            NONE => stack.push(Value::None),
            TRUE => stack.push(Value::Bool(true)),
            FALSE => stack.push(Value::Bool(false)),
            INT => stack.push(Value::Int(cursor.read_i32()?)),
            FLOAT => stack.push(Value::Float(cursor.read_f64()?)),
            BYTES => stack.push(Value::Bytes(cursor.read_byte_sequence()?)),
            UNICODE => {
                let raw = cursor.read_byte_sequence()?;
                let text = String::from_utf8(raw).map_err(|_| DecodeError::NotUtf8)?;
                stack.push(Value::Text(text));
            }
            LEGACY_A => {
                let raw = cursor.read_byte_sequence()?;
                stack.push(if opts.legacy_a_as_text {
                    Value::Text(decode_latin1(&raw))
                } else {
                    Value::Bytes(raw)
                });
            }
            LEGACY_B => {
                let raw = cursor.read_byte_sequence()?;
                stack.push(if opts.legacy_b_as_text {
                    Value::Text(String::from_utf8(raw).map_err(|_| DecodeError::NotUtf8)?)
                } else {
                    Value::Bytes(raw)
                });
            }
            NEWLIST => {
                let len = cursor.read_i32()?.max(0) as usize;
                stack.push(Value::List(vec![Value::None; len]));
            }
            SETITEM => {
                if stack.len() < 3 {
                    return Err(DecodeError::StackUnderflow);
                }
                let value = stack.pop().unwrap();
                let key = stack.pop().unwrap();
                match stack.last_mut().unwrap() {
                    Value::List(items) => {
                        if let Value::Int(idx) = key {
                            if idx >= 0 && (idx as usize) < items.len() {
                                items[idx as usize] = value;
                            }
                        }
                    }
                    Value::Map(entries) => entries.push((key, value)),
                    _ => return Err(DecodeError::StackUnderflow),
                }
            }
            NEWDICT => stack.push(Value::Map(Vec::new())),
            BUILDTUPLE => {
                let len = cursor.read_i32()?.max(0) as usize;
                if stack.len() < len {
                    return Err(DecodeError::StackUnderflow);
                }
                let items = stack.split_off(stack.len() - len);
                stack.push(Value::Tuple(items));
            }
            other => return Err(DecodeError::UnknownOpcode(other)),
        }
    }

    if stack.len() != 1 {
        return Err(DecodeError::TrailingStack {
            remaining: stack.len(),
        });
    }
    Ok(stack.pop().unwrap())
}

/// Decode latin-1: every byte maps 1:1 to the Unicode scalar of the same
/// value (latin-1 is a strict subset of the first 256 Unicode codepoints).
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self.bytes.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_n(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let raw: [u8; 4] = self.read_n(4)?.try_into().unwrap();
        Ok(i32::from_be_bytes(raw))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let raw: [u8; 8] = self.read_n(8)?.try_into().unwrap();
        Ok(f64::from_be_bytes(raw))
    }

    fn read_byte_sequence(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_i32()?.max(0) as usize;
        Ok(self.read_n(len)?.to_vec())
    }
}
