//! # Generic gRPC Transport
//!
//! This module contains the building blocks for performing gRPC calls without knowing the
//! Protobuf messages involved.
//!
//! Unlike standard `tonic` clients which are strongly typed (e.g., `HelloRequest`),
//! the components here move raw, already encoded message bytes in both directions.
pub mod client;
pub mod codec;
