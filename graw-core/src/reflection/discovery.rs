//! The two-phase discovery exchange, as a state machine with no I/O.
//!
//! Phase 1 lists the services. Phase 2 asks for the schema of every listed service at once
//! and then consumes exactly one response per request, in the order the requests were queued.
//! The stream keeps responses in request order, so the `i`-th response belongs to the `i`-th
//! service and responses are never matched by content.
use super::{
    ReflectionResult, ReflectionVersion,
    client::ReflectionError,
    generated::reflection_v1alpha::{
        ServerReflectionRequest, ServerReflectionResponse, server_reflection_request::MessageRequest,
        server_reflection_response::MessageResponse,
    },
};
use bytes::Bytes;
use std::collections::VecDeque;

// The host defined in the reflection requests doesn't seem to be a mandatory field
// and there is no documentation about what it is about.
// So we won't enforce it from the user.
const EMPTY_HOST: &str = "";

#[derive(Debug)]
enum State {
    AwaitingServiceList,
    AwaitingSchemas {
        services: Vec<String>,
        /// Indices into `services` whose response has not been received yet, in send order.
        pending: VecDeque<usize>,
        schemas: Vec<Bytes>,
    },
    Done,
    Failed,
}

/// What the session has to do after a response was handled.
#[derive(Debug, PartialEq)]
pub(crate) enum Next {
    /// Read the next response.
    Receive,
    /// Queue all these requests, then read the next response.
    Send(Vec<ServerReflectionRequest>),
    /// The exchange is over.
    Complete(ReflectionResult),
}

#[derive(Debug)]
pub(crate) struct Discovery {
    state: State,
    fetch_schemas: bool,
}

impl Discovery {
    /// Starts a full discovery: service list, then every schema.
    pub(crate) fn start() -> (Self, ServerReflectionRequest) {
        Self::with_schemas(true)
    }

    /// Starts a discovery that stops after the service list.
    pub(crate) fn services_only() -> (Self, ServerReflectionRequest) {
        Self::with_schemas(false)
    }

    fn with_schemas(fetch_schemas: bool) -> (Self, ServerReflectionRequest) {
        let discovery = Self {
            state: State::AwaitingServiceList,
            fetch_schemas,
        };
        let request = request(MessageRequest::ListServices(String::new()));

        (discovery, request)
    }

    /// Advances the exchange with the next response read from the stream.
    ///
    /// Any error leaves the discovery in its failed state; no partial result is ever returned.
    pub(crate) fn handle(
        &mut self,
        response: ServerReflectionResponse,
    ) -> Result<Next, ReflectionError> {
        let state = std::mem::replace(&mut self.state, State::Failed);

        let (state, next) = match state {
            State::AwaitingServiceList => self.on_service_list(response)?,
            State::AwaitingSchemas {
                services,
                pending,
                schemas,
            } => on_schema(services, pending, schemas, response)?,
            State::Done | State::Failed => {
                return Err(ReflectionError::UnexpectedResponse(
                    "Response received after the discovery ended".into(),
                ));
            }
        };

        self.state = state;
        Ok(next)
    }

    fn on_service_list(
        &self,
        response: ServerReflectionResponse,
    ) -> Result<(State, Next), ReflectionError> {
        let services: Vec<String> = match response.message_response {
            Some(MessageResponse::ListServicesResponse(resp)) => resp
                .service
                .into_iter()
                .map(|s| s.name)
                .filter(|name| !ReflectionVersion::is_reflection_service(name))
                .collect(),
            other => return Err(protocol_error(other)),
        };

        tracing::debug!(count = services.len(), "services listed");

        if !self.fetch_schemas || services.is_empty() {
            return Ok(complete(services, Vec::new()));
        }

        let requests = services
            .iter()
            .map(|service| request(MessageRequest::FileContainingSymbol(service.clone())))
            .collect();

        let state = State::AwaitingSchemas {
            pending: (0..services.len()).collect(),
            schemas: Vec::new(),
            services,
        };

        Ok((state, Next::Send(requests)))
    }
}

fn on_schema(
    services: Vec<String>,
    mut pending: VecDeque<usize>,
    mut schemas: Vec<Bytes>,
    response: ServerReflectionResponse,
) -> Result<(State, Next), ReflectionError> {
    let index = pending.pop_front().ok_or_else(|| {
        ReflectionError::UnexpectedResponse("No schema request is pending".into())
    })?;

    let fragments = match response.message_response {
        Some(MessageResponse::FileDescriptorResponse(resp)) => resp.file_descriptor_proto,
        other => return Err(protocol_error(other)),
    };

    tracing::trace!(
        service = %services[index],
        fragments = fragments.len(),
        "schema received"
    );

    schemas.extend(fragments.into_iter().map(Bytes::from));

    if pending.is_empty() {
        return Ok(complete(services, schemas));
    }

    let state = State::AwaitingSchemas {
        services,
        pending,
        schemas,
    };

    Ok((state, Next::Receive))
}

fn complete(services: Vec<String>, schemas: Vec<Bytes>) -> (State, Next) {
    let result = ReflectionResult { services, schemas };
    (State::Done, Next::Complete(result))
}

fn request(message_request: MessageRequest) -> ServerReflectionRequest {
    ServerReflectionRequest {
        host: EMPTY_HOST.to_string(),
        message_request: Some(message_request),
    }
}

// Turns anything but the expected payload into the matching error.
fn protocol_error(response: Option<MessageResponse>) -> ReflectionError {
    match response {
        Some(MessageResponse::ErrorResponse(e)) => ReflectionError::ServerError {
            code: e.error_code,
            message: e.error_message,
        },
        Some(other) => ReflectionError::UnexpectedResponse(format!("{other:?}")),
        None => ReflectionError::UnexpectedResponse("Empty Message".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::generated::reflection_v1alpha::{
        ErrorResponse, ExtensionNumberResponse, FileDescriptorResponse, ListServiceResponse,
        ServiceResponse,
    };

    fn list(names: &[&str]) -> ServerReflectionResponse {
        response(MessageResponse::ListServicesResponse(ListServiceResponse {
            service: names
                .iter()
                .map(|name| ServiceResponse {
                    name: name.to_string(),
                })
                .collect(),
        }))
    }

    fn schema(fragments: &[&str]) -> ServerReflectionResponse {
        response(MessageResponse::FileDescriptorResponse(
            FileDescriptorResponse {
                file_descriptor_proto: fragments.iter().map(|f| f.as_bytes().to_vec()).collect(),
            },
        ))
    }

    fn error(code: i32, message: &str) -> ServerReflectionResponse {
        response(MessageResponse::ErrorResponse(ErrorResponse {
            error_code: code,
            error_message: message.to_string(),
        }))
    }

    fn response(message_response: MessageResponse) -> ServerReflectionResponse {
        ServerReflectionResponse {
            message_response: Some(message_response),
            ..Default::default()
        }
    }

    fn symbols(next: Next) -> Vec<String> {
        match next {
            Next::Send(requests) => requests
                .into_iter()
                .map(|r| match r.message_request {
                    Some(MessageRequest::FileContainingSymbol(symbol)) => symbol,
                    other => panic!("Expected a symbol request, got {other:?}"),
                })
                .collect(),
            other => panic!("Expected requests to send, got {other:?}"),
        }
    }

    #[test]
    fn starts_by_listing_services() {
        let (_, first) = Discovery::start();

        assert_eq!(
            first.message_request,
            Some(MessageRequest::ListServices(String::new()))
        );
    }

    #[test]
    fn requests_every_schema_in_list_order_before_reading() {
        let (mut discovery, _) = Discovery::start();

        let next = discovery.handle(list(&["A", "B", "C"])).unwrap();

        assert_eq!(symbols(next), ["A", "B", "C"]);
    }

    #[test]
    fn aggregates_schemas_in_response_order() {
        let (mut discovery, _) = Discovery::start();
        discovery.handle(list(&["A", "B", "C"])).unwrap();

        assert_eq!(discovery.handle(schema(&["a"])).unwrap(), Next::Receive);
        assert_eq!(
            discovery.handle(schema(&["b1", "b2"])).unwrap(),
            Next::Receive
        );

        let next = discovery.handle(schema(&["c"])).unwrap();

        assert_eq!(
            next,
            Next::Complete(ReflectionResult {
                services: vec!["A".into(), "B".into(), "C".into()],
                schemas: vec![
                    Bytes::from_static(b"a"),
                    Bytes::from_static(b"b1"),
                    Bytes::from_static(b"b2"),
                    Bytes::from_static(b"c"),
                ],
            })
        );
    }

    #[test]
    fn filters_out_the_reflection_services() {
        let (mut discovery, _) = Discovery::start();

        let next = discovery
            .handle(list(&[
                "grpc.reflection.v1alpha.ServerReflection",
                "pkg.Test",
                "grpc.reflection.v1.ServerReflection",
            ]))
            .unwrap();

        assert_eq!(symbols(next), ["pkg.Test"]);
    }

    #[test]
    fn only_reflection_advertised_completes_empty() {
        let (mut discovery, _) = Discovery::start();

        let next = discovery
            .handle(list(&["grpc.reflection.v1alpha.ServerReflection"]))
            .unwrap();

        assert_eq!(next, Next::Complete(ReflectionResult::default()));
    }

    #[test]
    fn services_only_stops_after_the_list() {
        let (mut discovery, _) = Discovery::services_only();

        let next = discovery.handle(list(&["A", "B"])).unwrap();

        assert_eq!(
            next,
            Next::Complete(ReflectionResult {
                services: vec!["A".into(), "B".into()],
                schemas: vec![],
            })
        );
    }

    #[test]
    fn server_error_on_list_fails_with_its_message() {
        let (mut discovery, _) = Discovery::start();

        let result = discovery.handle(error(5, "boom"));

        assert!(matches!(
            result,
            Err(ReflectionError::ServerError { code: 5, message }) if message == "boom"
        ));
    }

    #[test]
    fn server_error_on_schema_fails_the_whole_discovery() {
        let (mut discovery, _) = Discovery::start();
        discovery.handle(list(&["A", "B"])).unwrap();
        discovery.handle(schema(&["a"])).unwrap();

        let result = discovery.handle(error(5, "unknown symbol B"));

        assert!(matches!(
            result,
            Err(ReflectionError::ServerError { message, .. }) if message == "unknown symbol B"
        ));
        assert!(matches!(
            discovery.handle(schema(&["b"])),
            Err(ReflectionError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn wrong_payload_kind_is_unexpected() {
        let (mut discovery, _) = Discovery::start();
        let result = discovery.handle(schema(&["a"]));
        assert!(matches!(result, Err(ReflectionError::UnexpectedResponse(_))));

        let (mut discovery, _) = Discovery::start();
        discovery.handle(list(&["A"])).unwrap();
        let result = discovery.handle(response(MessageResponse::AllExtensionNumbersResponse(
            ExtensionNumberResponse::default(),
        )));
        assert!(matches!(result, Err(ReflectionError::UnexpectedResponse(_))));
    }

    #[test]
    fn empty_response_is_unexpected() {
        let (mut discovery, _) = Discovery::start();

        let result = discovery.handle(ServerReflectionResponse::default());

        assert!(matches!(
            result,
            Err(ReflectionError::UnexpectedResponse(msg)) if msg == "Empty Message"
        ));
    }

    #[test]
    fn responses_after_completion_are_unexpected() {
        let (mut discovery, _) = Discovery::start();
        discovery.handle(list(&["A"])).unwrap();
        discovery.handle(schema(&["a"])).unwrap();

        let result = discovery.handle(schema(&["again"]));

        assert!(matches!(result, Err(ReflectionError::UnexpectedResponse(_))));
    }
}
