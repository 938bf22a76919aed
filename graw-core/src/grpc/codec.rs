//! # Opaque Codec
//!
//! This module implements `tonic::codec::Codec` over [`OpaqueMessage`], letting `tonic`
//! transport message bytes it knows nothing about.
//!
//! ## How it works
//!
//! 1. **Encoder**: writes the bytes held by the message into the gRPC frame buffer, untouched.
//!    Length prefixing and compression stay with `tonic`.
//! 2. **Decoder**: copies every byte of the received frame into a fresh message.
//!
//! Neither step can fail, since there is no schema to validate against.
use bytes::{Buf, BufMut, Bytes};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A message made of raw bytes and nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpaqueMessage {
    payload: Bytes,
}

impl OpaqueMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Drops the held bytes.
    pub fn reset(&mut self) {
        self.payload = Bytes::new();
    }

    /// A human readable label for the message. Opaque messages have none.
    pub fn describe(&self) -> &'static str {
        ""
    }

    /// Returns the bytes last stored, unchanged.
    pub fn encode(&self) -> Bytes {
        self.payload.clone()
    }

    /// Replaces the held bytes with `payload`.
    pub fn decode(&mut self, payload: impl Into<Bytes>) {
        self.payload = payload.into();
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl From<Bytes> for OpaqueMessage {
    fn from(payload: Bytes) -> Self {
        Self::new(payload)
    }
}

impl From<Vec<u8>> for OpaqueMessage {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

/// A `tonic` codec that sends and receives [`OpaqueMessage`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueCodec;

impl Codec for OpaqueCodec {
    type Encode = OpaqueMessage;
    type Decode = OpaqueMessage;

    type Encoder = OpaqueEncoder;
    type Decoder = OpaqueDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        OpaqueEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        OpaqueDecoder
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueEncoder;

impl Encoder for OpaqueEncoder {
    type Item = OpaqueMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put(item.into_payload());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueDecoder;

impl Decoder for OpaqueDecoder {
    type Item = OpaqueMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut message = OpaqueMessage::default();
        message.decode(src.copy_to_bytes(src.remaining()));
        Ok(Some(message))
    }
}
