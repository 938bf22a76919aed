//! # Graw Core
//!
//! `graw-core` is the library powering the Graw CLI. It talks to any gRPC server without
//! compile-time knowledge of its Protobuf schema, in two ways:
//!
//! * **[`Invoker`]:** Sends an arbitrary byte payload to an arbitrary method path
//!   (`/package.Service/Method`) and hands back the raw response bytes.
//! * **[`ReflectionClient`]:** Drives the gRPC Server Reflection Protocol to list the services a
//!   server exposes and to fetch the encoded schema (`FileDescriptorProto` bytes) of each one.
//!
//! Both open exactly one connection per call through a [`Dialer`] and release it on every exit
//! path, including cancellation through the [`CallContext`].
//!
//! ## OpaqueCodec
//!
//! An implementation of `tonic::codec::Codec` over [`OpaqueMessage`], a plain byte container.
//! Encoding returns the stored bytes and decoding stores the received bytes, so no schema is
//! ever needed to move a payload.
//!
//! ## Example
//!
//! ```rust,no_run
//! use graw_core::CallContext;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = CallContext::new();
//!
//! let reflection = graw_core::get_reflection(&ctx, "localhost:50051").await?;
//! println!("{:?}", reflection.services);
//!
//! let response = graw_core::invoke(&ctx, "localhost:50051", "/echo.EchoService/UnaryEcho", Vec::<u8>::new()).await?;
//! println!("{} bytes", response.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags (Internal use only)
//!
//! * `gen-proto`: Enables support for regenerating the reflection protocol types (internal use).
//!
//! ## Re-exports
//!
//! This crate re-exports `bytes` and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod context;
pub mod grpc;
pub mod reflection;
pub mod transport;

pub use context::CallContext;
pub use grpc::client::{InvokeError, InvokeRequest, Invoker};
pub use grpc::codec::{OpaqueCodec, OpaqueMessage};
pub use reflection::{
    ReflectionResult, ReflectionVersion,
    client::{ReflectionClient, ReflectionError},
};
pub use transport::{ConnectOptions, DialError, Dialer, InsecureDialer, ServiceDialer};

// Re-exports
pub use bytes;
pub use tonic;

use bytes::Bytes;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Calls `method_path` on the server at `address` with the raw `payload`, over an
/// unauthenticated connection, and returns the raw response bytes.
pub async fn invoke(
    ctx: &CallContext,
    address: &str,
    method_path: &str,
    payload: impl Into<Bytes>,
) -> Result<Bytes, InvokeError> {
    Invoker::new()
        .invoke(ctx, address, method_path, payload)
        .await
}

/// Lists the services exposed by the server at `address` and fetches the schema of each one
/// through the server reflection service.
pub async fn get_reflection(
    ctx: &CallContext,
    address: &str,
) -> Result<ReflectionResult, ReflectionError> {
    ReflectionClient::new().get_reflection(ctx, address).await
}
