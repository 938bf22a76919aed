//! Test-only echo server used by the `graw-core` integration tests.
//!
//! It exposes a unary echo, a delayed echo for deadline and cancellation scenarios and a
//! method that always fails, plus the encoded descriptor set of `proto/echo.proto` so tests
//! can register it with a reflection service.

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/echo.rs"));
}

pub use pb::echo_service_server::{EchoService, EchoServiceServer};

/// Encoded `FileDescriptorSet` of the echo protocol.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");
