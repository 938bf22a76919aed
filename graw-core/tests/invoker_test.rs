use echo_service::EchoServiceServer;
use echo_service::pb::{EchoRequest, EchoResponse};
use echo_service_impl::EchoServiceImpl;
use graw_core::{
    CallContext, DialError, InvokeError, InvokeRequest, Invoker, ServiceDialer, bytes::Bytes,
};
use prost::Message;
use std::time::Duration;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::Code;
use tracked_service::{ClosedCounter, Tracked};

mod echo_service_impl;

type EchoInvoker = Invoker<ServiceDialer<Tracked<EchoServiceServer<EchoServiceImpl>>>>;

fn setup_invoker() -> (EchoInvoker, ClosedCounter) {
    let (service, closed) = Tracked::new(EchoServiceServer::new(EchoServiceImpl));
    (Invoker::with_dialer(ServiceDialer::new(service)), closed)
}

fn echo_request(message: &str) -> Vec<u8> {
    EchoRequest {
        message: message.to_string(),
        delay_ms: 0,
    }
    .encode_to_vec()
}

#[tokio::test]
async fn test_invoke_returns_the_server_bytes() {
    let (invoker, closed) = setup_invoker();

    let response = invoker
        .invoke(
            &CallContext::new(),
            "in-process",
            "/echo.EchoService/UnaryEcho",
            echo_request("hello"),
        )
        .await
        .unwrap();

    let response = EchoResponse::decode(response).unwrap();
    assert_eq!(response.message, "hello");
    assert_eq!(closed.get(), 1);
}

#[tokio::test]
async fn test_invoke_with_empty_payload() {
    let (invoker, closed) = setup_invoker();

    // An empty EchoRequest echoes back as an empty EchoResponse, which encodes to no bytes.
    let response = invoker
        .invoke(
            &CallContext::new(),
            "in-process",
            "/echo.EchoService/UnaryEcho",
            Bytes::new(),
        )
        .await
        .unwrap();

    assert!(response.is_empty());
    assert_eq!(closed.get(), 1);
}

#[tokio::test]
async fn test_invoke_sends_metadata() {
    let (invoker, _closed) = setup_invoker();

    let request = InvokeRequest::new("/echo.EchoService/UnaryEcho", echo_request("tagged"))
        .header("x-echo-tag", "blue");

    let response = invoker
        .invoke_request(&CallContext::new(), "in-process", request)
        .await
        .unwrap();

    let response = EchoResponse::decode(response).unwrap();
    assert_eq!(response.message, "tagged");
    assert_eq!(response.tag.as_deref(), Some("blue"));
}

#[tokio::test]
async fn test_invalid_metadata_fails_before_connecting() {
    let (invoker, closed) = setup_invoker();

    let request = InvokeRequest::new("/echo.EchoService/UnaryEcho", echo_request("x"))
        .header("invalid key", "value");

    let result = invoker
        .invoke_request(&CallContext::new(), "in-process", request)
        .await;

    assert!(matches!(
        result,
        Err(InvokeError::InvalidMetadataKey { key, .. }) if key == "invalid key"
    ));
    assert_eq!(closed.get(), 0);
}

#[tokio::test]
async fn test_invalid_method_path() {
    let (invoker, _closed) = setup_invoker();

    let result = invoker
        .invoke(
            &CallContext::new(),
            "in-process",
            "/echo.EchoService/Unary Echo",
            Bytes::new(),
        )
        .await;

    assert!(matches!(result, Err(InvokeError::InvalidMethodPath { .. })));
}

#[tokio::test]
async fn test_unknown_method_surfaces_the_status() {
    let (invoker, closed) = setup_invoker();

    let result = invoker
        .invoke(
            &CallContext::new(),
            "in-process",
            "/echo.EchoService/GhostEcho",
            echo_request("boo"),
        )
        .await;

    match result {
        Err(InvokeError::CallFailed(status)) => assert_eq!(status.code(), Code::Unimplemented),
        other => panic!("Expected an Unimplemented status, got: {other:?}"),
    }
    assert_eq!(closed.get(), 1);
}

#[tokio::test]
async fn test_server_error_surfaces_the_status() {
    let (invoker, closed) = setup_invoker();

    let result = invoker
        .invoke(
            &CallContext::new(),
            "in-process",
            "/echo.EchoService/FailingEcho",
            echo_request("nope"),
        )
        .await;

    match result {
        Err(InvokeError::CallFailed(status)) => {
            assert_eq!(status.code(), Code::FailedPrecondition);
            assert_eq!(status.message(), "nope");
        }
        other => panic!("Expected a FailedPrecondition status, got: {other:?}"),
    }
    assert_eq!(closed.get(), 1);
}

#[tokio::test]
async fn test_deadline_abandons_the_call() {
    let (invoker, closed) = setup_invoker();
    let ctx = CallContext::new().with_timeout(Duration::from_millis(50));

    let payload = EchoRequest {
        message: "slow".to_string(),
        delay_ms: 10_000,
    }
    .encode_to_vec();

    let result = invoker
        .invoke(&ctx, "in-process", "/echo.EchoService/DelayedEcho", payload)
        .await;

    assert!(matches!(result, Err(InvokeError::DeadlineExceeded)));
    assert_eq!(closed.get(), 1);
}

#[tokio::test]
async fn test_cancellation_abandons_the_call() {
    let (invoker, closed) = setup_invoker();
    let ctx = CallContext::new();

    let token = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let payload = EchoRequest {
        message: "slow".to_string(),
        delay_ms: 10_000,
    }
    .encode_to_vec();

    let result = invoker
        .invoke(&ctx, "in-process", "/echo.EchoService/DelayedEcho", payload)
        .await;

    assert!(matches!(result, Err(InvokeError::Cancelled)));
    assert_eq!(closed.get(), 1);
}

#[tokio::test]
async fn test_cancelled_context_never_connects() {
    let (invoker, closed) = setup_invoker();
    let ctx = CallContext::new();
    ctx.cancel();

    let result = invoker
        .invoke(
            &ctx,
            "in-process",
            "/echo.EchoService/UnaryEcho",
            echo_request("x"),
        )
        .await;

    assert!(matches!(result, Err(InvokeError::Cancelled)));
    assert_eq!(closed.get(), 0);
}

#[tokio::test]
async fn test_invoke_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(
        tonic::transport::Server::builder()
            .add_service(EchoServiceServer::new(EchoServiceImpl))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );

    let response = graw_core::invoke(
        &CallContext::new(),
        &address.to_string(),
        "/echo.EchoService/UnaryEcho",
        echo_request("over the wire"),
    )
    .await
    .unwrap();

    let response = EchoResponse::decode(response).unwrap();
    assert_eq!(response.message, "over the wire");
}

#[tokio::test]
async fn test_nothing_listening_is_a_connection_error() {
    // Reserve a free port, then release it so nothing listens there.
    let address = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let result = graw_core::invoke(
        &CallContext::new(),
        &address.to_string(),
        "/echo.EchoService/UnaryEcho",
        echo_request("anyone?"),
    )
    .await;

    assert!(matches!(
        result,
        Err(InvokeError::Dial(DialError::ConnectionFailed(addr, _))) if addr == address.to_string()
    ));
}
