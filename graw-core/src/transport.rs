//! # Transport
//!
//! Connection establishment for the invoker and the reflection client.
//!
//! A [`Dialer`] turns an address into a tonic `GrpcService`. The default [`InsecureDialer`]
//! opens a plain HTTP/2 channel with no TLS and no credentials. [`ServiceDialer`] hands out
//! an already built service instead, which is how in-process servers and custom channels are
//! plugged in.
//!
//! Each call wraps the dialed service in a [`Connection`] that lives exactly as long as the
//! call. Dropping it releases the underlying service, whichever way the call ends.
use std::time::Duration;
use tonic::{
    client::Grpc,
    transport::{Channel, Endpoint},
};

#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("Cannot connect to an empty address")]
    EmptyAddress,
    #[error("Invalid address '{0}': {1}")]
    InvalidAddress(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// Opens the transport a single call runs over.
pub trait Dialer {
    /// The service calls are dispatched to, typically a tonic [`Channel`].
    type Service;

    fn dial(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Service, DialError>> + Send;
}

/// Settings applied to every endpoint opened by the [`InsecureDialer`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Upper bound for establishing the TCP connection.
    pub connect_timeout: Option<Duration>,
    /// Upper bound for each request sent over the connection.
    pub timeout: Option<Duration>,
}

/// Dials plain-text HTTP/2 connections.
#[derive(Debug, Clone, Default)]
pub struct InsecureDialer {
    options: ConnectOptions,
}

impl InsecureDialer {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }

    fn endpoint(&self, address: &str) -> Result<Endpoint, DialError> {
        let mut endpoint = Endpoint::new(endpoint_uri(address))
            .map_err(|e| DialError::InvalidAddress(address.to_string(), e))?;

        if let Some(timeout) = self.options.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        if let Some(timeout) = self.options.timeout {
            endpoint = endpoint.timeout(timeout);
        }

        Ok(endpoint)
    }
}

impl Dialer for InsecureDialer {
    type Service = Channel;

    async fn dial(&self, address: &str) -> Result<Channel, DialError> {
        let endpoint = self.endpoint(address)?;

        endpoint
            .connect()
            .await
            .map_err(|e| DialError::ConnectionFailed(address.to_string(), e))
    }
}

/// Hands out a clone of an existing service for every call, ignoring the address.
#[derive(Debug, Clone)]
pub struct ServiceDialer<S> {
    service: S,
}

impl<S> ServiceDialer<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S> Dialer for ServiceDialer<S>
where
    S: Clone + Send + Sync,
{
    type Service = S;

    async fn dial(&self, _address: &str) -> Result<S, DialError> {
        Ok(self.service.clone())
    }
}

/// A connection owned by a single call.
///
/// The dialed service is dropped together with this value, which closes it.
pub struct Connection<S> {
    address: String,
    client: Grpc<S>,
}

impl<S> Connection<S> {
    pub async fn open<D>(dialer: &D, address: &str) -> Result<Self, DialError>
    where
        D: Dialer<Service = S>,
    {
        if address.trim().is_empty() {
            return Err(DialError::EmptyAddress);
        }

        let service = dialer.dial(address).await?;
        tracing::debug!(address, "connection opened");

        Ok(Self {
            address: address.to_string(),
            client: Grpc::new(service),
        })
    }

    pub fn client(&mut self) -> &mut Grpc<S> {
        &mut self.client
    }
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        tracing::debug!(address = %self.address, "connection closed");
    }
}

// `Endpoint` needs a full URI, while callers usually pass a bare `host:port`.
fn endpoint_uri(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}
