//! # Generic Invoker
//!
//! This module performs single gRPC calls against any method of any service, sending and
//! receiving raw message bytes.
//!
//! ## How it works
//!
//! The [`Invoker`] dials one [`Connection`] per call, wraps the payload in an
//! [`OpaqueMessage`], performs a unary call through the [`OpaqueCodec`] and returns the bytes
//! the server answered with. The connection is released when the call returns, fails or is
//! interrupted through its [`CallContext`].
//!
//! ## Features
//!
//! * **Dynamic Pathing**: Uses the caller's HTTP/2 path (e.g., `/package.Service/Method`) as is.
//! * **Metadata Handling**: Converts standard Rust string tuples into Tonic's `MetadataMap` for headers.
//! * **Deadlines**: Forwards the context deadline to the server as the gRPC timeout.
use super::codec::{OpaqueCodec, OpaqueMessage};
use crate::{
    BoxError,
    context::{CallContext, Interrupted},
    transport::{ConnectOptions, Connection, DialError, Dialer, InsecureDialer},
};
use bytes::Bytes;
use http::uri::{InvalidUri, PathAndQuery};
use http_body::Body as HttpBody;
use std::{str::FromStr, time::Duration};
use tonic::{
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
};

/// Errors that can occur while invoking a method.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error("Invalid method path '{path}': '{source}'")]
    InvalidMethodPath { path: String, source: InvalidUri },
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
    #[error("The call failed: '{0}'")]
    CallFailed(#[source] tonic::Status),
    #[error("The call was cancelled")]
    Cancelled,
    #[error("The call deadline was exceeded")]
    DeadlineExceeded,
}

impl From<Interrupted> for InvokeError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => InvokeError::Cancelled,
            Interrupted::DeadlineExceeded => InvokeError::DeadlineExceeded,
        }
    }
}

/// A request for a single generic call.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// The fully qualified method path (e.g., `/my.package.Service/Method`).
    pub method_path: String,
    /// The already encoded request message.
    pub payload: Bytes,
    /// Custom gRPC metadata (headers) to attach to the request.
    pub headers: Vec<(String, String)>,
}

impl InvokeRequest {
    pub fn new(method_path: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            method_path: method_path.into(),
            payload: payload.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Invokes methods on remote servers with raw byte payloads.
#[derive(Debug, Clone, Default)]
pub struct Invoker<D = InsecureDialer> {
    dialer: D,
}

impl Invoker<InsecureDialer> {
    /// An invoker that dials plain-text connections with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConnectOptions) -> Self {
        Self::with_dialer(InsecureDialer::new(options))
    }
}

impl<D, S> Invoker<D>
where
    D: Dialer<Service = S>,
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn with_dialer(dialer: D) -> Self {
        Self { dialer }
    }

    /// Performs a unary call of `method_path` on the server at `address`.
    ///
    /// # Returns
    ///
    /// * `Ok(Bytes)` - The response message bytes, exactly as the server encoded them.
    /// * `Err(InvokeError)` - Failed to connect, the server answered with an error status,
    ///   or the call was interrupted through `ctx`.
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        address: &str,
        method_path: &str,
        payload: impl Into<Bytes>,
    ) -> Result<Bytes, InvokeError> {
        self.invoke_request(ctx, address, InvokeRequest::new(method_path, payload))
            .await
    }

    /// Same as [`Invoker::invoke`], for a request carrying custom metadata.
    pub async fn invoke_request(
        &self,
        ctx: &CallContext,
        address: &str,
        request: InvokeRequest,
    ) -> Result<Bytes, InvokeError> {
        ctx.run(self.call(address, request, ctx.remaining())).await?
    }

    #[tracing::instrument(skip_all, fields(address = %address, method = %request.method_path))]
    async fn call(
        &self,
        address: &str,
        request: InvokeRequest,
        timeout: Option<Duration>,
    ) -> Result<Bytes, InvokeError> {
        let path = PathAndQuery::from_str(&request.method_path).map_err(|source| {
            InvokeError::InvalidMethodPath {
                path: request.method_path.clone(),
                source,
            }
        })?;

        let mut grpc_request = build_request(OpaqueMessage::new(request.payload), request.headers)?;

        if let Some(timeout) = timeout {
            grpc_request.set_timeout(timeout);
        }

        let mut connection = Connection::open(&self.dialer, address).await?;
        let client = connection.client();

        client
            .ready()
            .await
            .map_err(|e| InvokeError::ClientNotReady(e.into()))?;

        let response = client
            .unary(grpc_request, path, OpaqueCodec)
            .await
            .map_err(InvokeError::CallFailed)?;

        Ok(response.into_inner().into_payload())
    }
}

fn build_request<T>(
    payload: T,
    headers: Vec<(String, String)>,
) -> Result<tonic::Request<T>, InvokeError> {
    let mut request = tonic::Request::new(payload);
    for (k, v) in headers {
        let key = MetadataKey::from_str(&k).map_err(|source| InvokeError::InvalidMetadataKey {
            key: k.clone(),
            source,
        })?;
        let val = MetadataValue::from_str(&v)
            .map_err(|source| InvokeError::InvalidMetadataValue { key: k, source })?;
        request.metadata_mut().insert(key, val);
    }
    Ok(request)
}
