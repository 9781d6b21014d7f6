use lambda_http::http::header::CONTENT_TYPE;
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};

use log::debug;
use pdd_serve::{
    router, Classifier, InferenceService, ObjectStore, S3Store, ServiceConfig, TfClassifier,
    CONTENT_TYPE_JSON,
};

type Service = InferenceService<S3Store, TfClassifier>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    // Cold start: a failure here takes the whole instance down.
    let config = ServiceConfig::from_env()?;
    let service = Service::cold_start(config).await?;

    debug!("Loaded model in memory");

    let service_ref = &service;

    let handler_closure =
        move |event: Request| async move { handle_request(event, service_ref).await };

    debug!("Dispatching handler");
    run(service_fn(handler_closure)).await
}

async fn handle_request<S, C>(
    event: Request,
    service: &InferenceService<S, C>,
) -> Result<Response<Body>, Error>
where
    S: ObjectStore,
    C: Classifier,
{
    debug!("Received request: {:#?}", event);

    let params = event.query_string_parameters();
    let route = params.first("route");

    let response = router::dispatch(
        service,
        event.method().as_str(),
        route,
        event.body().as_ref(),
    )
    .await;

    Ok(Response::builder()
        .status(response.status())
        .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
        .body(Body::from(response.body_json()))?)
}
