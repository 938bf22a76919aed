//! # Server Reflection
//!
//! This module contains the logic necessary to interact with the gRPC Server Reflection Protocol.
//!
//! It lets the client ask a server which services it exposes and retrieve the encoded
//! `FileDescriptorProto`s describing them, without decoding them.
//!
//! Both protocol versions in use today (`grpc.reflection.v1alpha` and `grpc.reflection.v1`)
//! share the same wire format and only differ in the service path, so a single set of
//! message types serves both.
pub mod client;
mod discovery;
mod generated;

use bytes::Bytes;
use http::uri::PathAndQuery;

/// The version of the reflection protocol spoken to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReflectionVersion {
    #[default]
    V1Alpha,
    V1,
}

impl ReflectionVersion {
    pub const ALL: [ReflectionVersion; 2] = [ReflectionVersion::V1Alpha, ReflectionVersion::V1];

    /// The name the reflection service advertises itself under.
    pub fn service_name(self) -> &'static str {
        match self {
            ReflectionVersion::V1Alpha => "grpc.reflection.v1alpha.ServerReflection",
            ReflectionVersion::V1 => "grpc.reflection.v1.ServerReflection",
        }
    }

    pub(crate) fn path(self) -> PathAndQuery {
        match self {
            ReflectionVersion::V1Alpha => PathAndQuery::from_static(
                "/grpc.reflection.v1alpha.ServerReflection/ServerReflectionInfo",
            ),
            ReflectionVersion::V1 => {
                PathAndQuery::from_static("/grpc.reflection.v1.ServerReflection/ServerReflectionInfo")
            }
        }
    }

    /// Whether `service` is one of the reflection services themselves.
    ///
    /// Matching is an exact comparison against the well-known names.
    pub fn is_reflection_service(service: &str) -> bool {
        Self::ALL.iter().any(|v| v.service_name() == service)
    }
}

/// What a server exposes, as discovered through reflection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionResult {
    /// Fully qualified names of the exposed services, in the order the server listed them.
    /// The reflection service itself is never part of this list.
    pub services: Vec<String>,
    /// Encoded `FileDescriptorProto`s, all fragments of the first service followed by all
    /// fragments of the second one, and so on.
    pub schemas: Vec<Bytes>,
}
