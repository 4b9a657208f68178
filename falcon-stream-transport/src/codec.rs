use std::marker::PhantomData;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::StreamTransportError;

/// Newline-delimited JSON framing for the stream-message transport (4.3).
///
/// Retains partial-line state across `decode` calls the way
/// `FlydraPacketCodec` retains partial-header state: `decode` is called
/// repeatedly by `Framed` as more bytes arrive, and only consumes a full
/// line's worth of the buffer at a time.
pub struct LineCodec<T> {
    _marker: PhantomData<T>,
}

impl<T> Default for LineCodec<T> {
    fn default() -> Self {
        LineCodec { _marker: PhantomData }
    }
}

impl<T> LineCodec<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: DeserializeOwned> Decoder for LineCodec<T> {
    type Item = T;
    type Error = StreamTransportError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<T>, Self::Error> {
        let Some(pos) = memchr::memchr(b'\n', buf) else {
            return Ok(None);
        };
        let line = buf.split_to(pos + 1);
        let line = &line[..line.len() - 1];
        if line.is_empty() {
            return self.decode(buf);
        }
        let value = serde_json::from_slice(line)?;
        Ok(Some(value))
    }
}

impl<T: Serialize> Encoder<T> for LineCodec<T> {
    type Error = StreamTransportError;

    fn encode(&mut self, item: T, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let mut bytes = serde_json::to_vec(&item)?;
        bytes.push(b'\n');
        buf.extend_from_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Msg {
        n: u32,
    }

    #[test]
    fn encodes_then_decodes_one_message() {
        let mut codec = LineCodec::<Msg>::new();
        let mut buf = BytesMut::new();
        codec.encode(Msg { n: 7 }, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"{\"n\":7}\n");
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Msg { n: 7 });
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_returns_none_on_partial_line() {
        let mut codec = LineCodec::<Msg>::new();
        let mut buf = BytesMut::from(&b"{\"n\":1}"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Msg { n: 1 }));
    }

    #[test]
    fn decode_handles_two_messages_arriving_together() {
        let mut codec = LineCodec::<Msg>::new();
        let mut buf = BytesMut::from(&b"{\"n\":1}\n{\"n\":2}\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Msg { n: 1 }));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Msg { n: 2 }));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }
}
