//! # Reflection Client
//!
//! A discovery client for the gRPC Server Reflection Protocol (`grpc.reflection.v1alpha` by
//! default, `grpc.reflection.v1` on request).
//!
//! Every call dials its own connection, opens one bidirectional `ServerReflectionInfo` stream
//! on it and runs the discovery exchange to completion:
//!
//! 1. A `list_services` request. The reflection service itself is filtered out of the answer.
//! 2. One `file_containing_symbol` request per remaining service, all queued before any
//!    response is read. The responses are then consumed in the same order and their schema
//!    fragments appended to the result.
//!
//! Any failure ends the call with no partial result. The stream and the connection are
//! released on every exit path.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use super::{
    ReflectionResult, ReflectionVersion,
    discovery::{Discovery, Next},
    generated::reflection_v1alpha::{ServerReflectionRequest, ServerReflectionResponse},
};
use crate::{
    BoxError,
    context::{CallContext, Interrupted},
    transport::{ConnectOptions, Connection, DialError, Dialer, InsecureDialer},
};
use bytes::Bytes;
use http_body::Body as HttpBody;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::{
    Streaming,
    client::{Grpc, GrpcService},
};

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error(transparent)]
    Dial(#[from] DialError),

    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),

    #[error(
        "Failed to start a stream request with the reflection server, reflection might not be supported: '{0}'"
    )]
    StreamInitFailed(#[source] tonic::Status),

    #[error("The server stream returned an error status: '{0}'")]
    StreamFailure(#[source] tonic::Status),

    #[error("Reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("Internal error: Failed to send request to stream")]
    SendFailed,

    /// The server answered with an error response. `message` is the server's text, verbatim.
    #[error("Server returned reflection error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Protocol error: Received unexpected response type: {0}")]
    UnexpectedResponse(String),

    #[error("The reflection call was cancelled")]
    Cancelled,

    #[error("The reflection call deadline was exceeded")]
    DeadlineExceeded,
}

impl From<Interrupted> for ReflectionError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => ReflectionError::Cancelled,
            Interrupted::DeadlineExceeded => ReflectionError::DeadlineExceeded,
        }
    }
}

/// A discovery client for the gRPC Server Reflection Protocol.
#[derive(Debug, Clone, Default)]
pub struct ReflectionClient<D = InsecureDialer> {
    dialer: D,
    version: ReflectionVersion,
}

impl ReflectionClient<InsecureDialer> {
    /// A client that dials plain-text connections with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConnectOptions) -> Self {
        Self::with_dialer(InsecureDialer::new(options))
    }
}

impl<D, S> ReflectionClient<D>
where
    D: Dialer<Service = S>,
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn with_dialer(dialer: D) -> Self {
        Self {
            dialer,
            version: ReflectionVersion::default(),
        }
    }

    /// Selects the reflection protocol version spoken to servers.
    pub fn version(mut self, version: ReflectionVersion) -> Self {
        self.version = version;
        self
    }

    /// Lists the services exposed by the server at `address` and fetches the schema of each.
    ///
    /// # Returns
    ///
    /// * `Ok(ReflectionResult)` - Every service with all of its schema fragments.
    /// * `Err(ReflectionError)` - The connection, the stream or the server failed, a response
    ///   had an unexpected shape, or the call was interrupted through `ctx`.
    pub async fn get_reflection(
        &self,
        ctx: &CallContext,
        address: &str,
    ) -> Result<ReflectionResult, ReflectionError> {
        let (discovery, first) = Discovery::start();
        ctx.run(self.discover(address, discovery, first, ctx.remaining()))
            .await?
    }

    /// Lists the services exposed by the server at `address`, without fetching any schema.
    pub async fn list_services(
        &self,
        ctx: &CallContext,
        address: &str,
    ) -> Result<Vec<String>, ReflectionError> {
        let (discovery, first) = Discovery::services_only();
        let result = ctx
            .run(self.discover(address, discovery, first, ctx.remaining()))
            .await??;

        Ok(result.services)
    }

    #[tracing::instrument(skip_all, fields(address = %address, version = ?self.version))]
    async fn discover(
        &self,
        address: &str,
        mut discovery: Discovery,
        first: ServerReflectionRequest,
        timeout: Option<Duration>,
    ) -> Result<ReflectionResult, ReflectionError> {
        let mut connection = Connection::open(&self.dialer, address).await?;

        let mut session =
            DiscoverySession::open(connection.client(), self.version, first, timeout).await?;

        loop {
            let response = session.receive().await?;

            match discovery.handle(response)? {
                Next::Receive => {}
                Next::Send(requests) => {
                    tracing::debug!(count = requests.len(), "requesting schemas");
                    for request in requests {
                        session.send(request)?;
                    }
                }
                Next::Complete(result) => return Ok(result),
            }
        }
    }
}

/// One `ServerReflectionInfo` stream.
///
/// Requests go through an unbounded queue, so queueing a whole batch never waits on the
/// server reading it.
struct DiscoverySession {
    requests: mpsc::UnboundedSender<ServerReflectionRequest>,
    responses: Streaming<ServerReflectionResponse>,
}

impl DiscoverySession {
    /// Opens the stream with `first` already queued, since some servers only answer the
    /// stream headers once they have a request to handle.
    async fn open<S>(
        client: &mut Grpc<S>,
        version: ReflectionVersion,
        first: ServerReflectionRequest,
        timeout: Option<Duration>,
    ) -> Result<Self, ReflectionError>
    where
        S: GrpcService<tonic::body::Body>,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        client
            .ready()
            .await
            .map_err(|e| ReflectionError::ClientNotReady(e.into()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(first).map_err(|_| ReflectionError::SendFailed)?;

        let mut request = tonic::Request::new(UnboundedReceiverStream::new(rx));

        if let Some(timeout) = timeout {
            request.set_timeout(timeout);
        }

        let responses = client
            .streaming(request, version.path(), tonic_prost::ProstCodec::default())
            .await
            .map_err(ReflectionError::StreamInitFailed)?
            .into_inner();

        tracing::debug!("reflection stream opened");

        Ok(Self {
            requests: tx,
            responses,
        })
    }

    fn send(&self, request: ServerReflectionRequest) -> Result<(), ReflectionError> {
        self.requests
            .send(request)
            .map_err(|_| ReflectionError::SendFailed)
    }

    async fn receive(&mut self) -> Result<ServerReflectionResponse, ReflectionError> {
        self.responses
            .message()
            .await
            .map_err(ReflectionError::StreamFailure)?
            .ok_or(ReflectionError::StreamClosed)
    }
}
