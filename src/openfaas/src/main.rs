use hyper::header::CONTENT_TYPE;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Request, Response, Server, StatusCode};
use log::{error, info};
use pdd_serve::{
    router, ApiResponse, InferenceService, S3Store, ServiceConfig, TfClassifier, CONTENT_TYPE_JSON,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

type Service = InferenceService<S3Store, TfClassifier>;

/// Value of the `route` parameter in a raw query string.
fn route_param(query: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == "route")
        .map(|(_, value)| value.into_owned())
}

fn render(response: &ApiResponse) -> Response<Body> {
    Response::builder()
        .status(response.status())
        .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
        .body(Body::from(response.body_json()))
        .unwrap_or_else(|err| {
            error!("Could not build response: {}", err);
            let mut fallback = Response::new(Body::empty());
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

async fn handle(req: Request<Body>, service: Arc<Service>) -> Result<Response<Body>, Infallible> {
    let method = req.method().as_str().to_owned();
    let route = req.uri().query().and_then(route_param);

    let response = match body::to_bytes(req.into_body()).await {
        Ok(raw) => router::dispatch(&service, &method, route.as_deref(), &raw).await,
        Err(err) => {
            error!("Could not read request body: {}", err);
            ApiResponse::internal_error()
        }
    };

    Ok(render(&response))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let config = ServiceConfig::from_env()?;
    let service = Arc::new(Service::cold_start(config).await?);

    // A `MakeService` that produces a `Service` to handle each connection.
    let make_service = make_service_fn(move |_conn: &AddrStream| {
        let service = Arc::clone(&service);

        let svc = service_fn(move |req| handle(req, service.clone()));

        async move { Ok::<_, Infallible>(svc) }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("Listening on http://{}", addr);

    Server::bind(&addr).serve(make_service).await?;

    Ok(())
}
