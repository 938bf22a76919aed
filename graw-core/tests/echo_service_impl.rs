use echo_service::EchoService;
use echo_service::pb::{EchoRequest, EchoResponse};
use std::time::Duration;
use tonic::{Request, Response, Status};

pub struct EchoServiceImpl;

#[tonic::async_trait]
impl EchoService for EchoServiceImpl {
    async fn unary_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        let tag = request
            .metadata()
            .get("x-echo-tag")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(Response::new(EchoResponse {
            message: request.into_inner().message,
            tag,
        }))
    }

    async fn delayed_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        let request = request.into_inner();
        tokio::time::sleep(Duration::from_millis(request.delay_ms)).await;

        Ok(Response::new(EchoResponse {
            message: request.message,
            tag: None,
        }))
    }

    async fn failing_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        Err(Status::failed_precondition(request.into_inner().message))
    }
}
