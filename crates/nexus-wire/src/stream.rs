//! Reads and writes frames directly against a [`Transport`], one opcode at a
//! time — there is no length prefix outside the codec itself, so framing a
//! message means decoding the value stream live off the wire rather than
//! buffering it first.

use nexus_codec::{opcode, DialectOptions, Value};
use nexus_transport::Transport;

use crate::error::WireError;
use crate::message::Message;

/// Write one message as a complete encoded frame.
pub async fn write_message(transport: &impl Transport, message: Message) -> Result<(), WireError> {
    let bytes = nexus_codec::encode(&message.into_tuple_value())?;
    transport.write_all(&bytes).await?;
    Ok(())
}

/// Read one message, blocking until a complete frame has arrived.
///
/// A clean EOF on the very first byte (the version byte) is reported as
/// [`nexus_transport::TransportError::Eof`] wrapped in [`WireError::Transport`];
/// callers use [`WireError::is_clean_eof`] to distinguish "peer hung up
/// between frames" from "peer sent a broken frame".
pub async fn read_message(
    transport: &impl Transport,
    opts: &DialectOptions,
) -> Result<Message, WireError> {
    let value = read_value(transport, opts).await?;
    Message::from_tuple_value(value)
}

async fn read_value(transport: &impl Transport, opts: &DialectOptions) -> Result<Value, WireError> {
    let version = read_u8(transport).await?;
    if version != opcode::VERSION {
        return Err(nexus_codec::DecodeError::VersionMismatch {
            got: version,
            expected: opcode::VERSION,
        }
        .into());
    }

    let mut stack: Vec<Value> = Vec::new();
    loop {
        let op = read_u8(transport).await?;
        match op {
            opcode::STOP => break,
            opcode::NONE => stack.push(Value::None),
            opcode::TRUE => stack.push(Value::Bool(true)),
            opcode::FALSE => stack.push(Value::Bool(false)),
            opcode::INT => stack.push(Value::Int(read_i32(transport).await?)),
            opcode::FLOAT => stack.push(Value::Float(read_f64(transport).await?)),
            opcode::BYTES => stack.push(Value::Bytes(read_byte_sequence(transport).await?)),
            opcode::UNICODE => {
                let raw = read_byte_sequence(transport).await?;
                let text = String::from_utf8(raw).map_err(|_| nexus_codec::DecodeError::NotUtf8)?;
                stack.push(Value::Text(text));
            }
            opcode::LEGACY_A => {
                let raw = read_byte_sequence(transport).await?;
                stack.push(if opts.legacy_a_as_text {
                    Value::Text(raw.iter().map(|&b| b as char).collect())
                } else {
                    Value::Bytes(raw)
                });
            }
            opcode::LEGACY_B => {
                let raw = read_byte_sequence(transport).await?;
                stack.push(if opts.legacy_b_as_text {
                    Value::Text(String::from_utf8(raw).map_err(|_| nexus_codec::DecodeError::NotUtf8)?)
                } else {
                    Value::Bytes(raw)
                });
            }
            opcode::NEWLIST => {
                let len = read_i32(transport).await?.max(0) as usize;
                stack.push(Value::List(vec![Value::None; len]));
            }
            opcode::SETITEM => {
                if stack.len() < 3 {
                    return Err(nexus_codec::DecodeError::StackUnderflow.into());
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
                    _ => return Err(nexus_codec::DecodeError::StackUnderflow.into()),
                }
            }
            opcode::NEWDICT => stack.push(Value::Map(Vec::new())),
            opcode::BUILDTUPLE => {
                let len = read_i32(transport).await?.max(0) as usize;
                if stack.len() < len {
                    return Err(nexus_codec::DecodeError::StackUnderflow.into());
                }
                let items = stack.split_off(stack.len() - len);
                stack.push(Value::Tuple(items));
            }
            other => return Err(nexus_codec::DecodeError::UnknownOpcode(other).into()),
        }
    }

    if stack.len() != 1 {
        return Err(nexus_codec::DecodeError::TrailingStack {
            remaining: stack.len(),
        }
        .into());
    }
    Ok(stack.pop().unwrap())
}

async fn read_u8(transport: &impl Transport) -> Result<u8, WireError> {
    let buf = transport.read_exact(1).await?;
    Ok(buf[0])
}

async fn read_i32(transport: &impl Transport) -> Result<i32, WireError> {
    let buf = transport.read_exact(4).await?;
    Ok(i32::from_be_bytes(buf.try_into().unwrap()))
}

async fn read_f64(transport: &impl Transport) -> Result<f64, WireError> {
    let buf = transport.read_exact(8).await?;
    Ok(f64::from_be_bytes(buf.try_into().unwrap()))
}

async fn read_byte_sequence(transport: &impl Transport) -> Result<Vec<u8>, WireError> {
    let len = read_i32(transport).await?.max(0) as usize;
    transport.read_exact(len).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_transport::MemTransport;

    #[tokio::test]
    async fn round_trips_channel_data() {
        let (a, b) = MemTransport::pair();
        let msg = Message::channel_data(3, Value::Tuple(vec![Value::Int(1), Value::Text("x".into())]));
        write_message(&a, msg.clone()).await.unwrap();
        let got = read_message(&b, &DialectOptions::default()).await.unwrap();
        assert_eq!(got, msg);
    }

    #[tokio::test]
    async fn every_message_kind_round_trips() {
        let (a, b) = MemTransport::pair();
        let msgs = vec![
            Message::channel_open(1, "channel.send(1)"),
            Message::channel_new(1, 4),
            Message::channel_data(1, Value::Int(42)),
            Message::channel_close(1),
            Message::channel_close_error(1, "boom"),
            Message::channel_last_message(1),
        ];
        for msg in &msgs {
            write_message(&a, msg.clone()).await.unwrap();
        }
        for expected in &msgs {
            let got = read_message(&b, &DialectOptions::default()).await.unwrap();
            assert_eq!(&got, expected);
        }
    }

    #[tokio::test]
    async fn clean_eof_between_frames_is_reported() {
        let (a, b) = MemTransport::pair();
        a.close_write();
        let err = read_message(&b, &DialectOptions::default()).await.unwrap_err();
        assert!(err.is_clean_eof());
    }
}
