//! Request dispatch shared by every host.
//!
//! A request is reduced to its method, the raw `route` query parameter and
//! the body; the answer is always an [`ApiResponse`].

use log::{debug, error};
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::model::Classifier;
use crate::obj_key::ObjKey;
use crate::response::ApiResponse;
use crate::service::InferenceService;
use crate::storage::ObjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    GetUploadUrl,
    GetInference,
}

/// What a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Value of the `route` query parameter
    pub name: &'static str,

    pub method: &'static str,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::GetUploadUrl, Route::GetInference];

    pub fn descriptor(self) -> RouteDescriptor {
        match self {
            Route::GetUploadUrl => RouteDescriptor {
                name: "upload",
                method: "GET",
            },
            Route::GetInference => RouteDescriptor {
                name: "getinf",
                method: "POST",
            },
        }
    }

    /// Lookup by the (already normalized) route name.
    pub fn from_name(name: &str) -> Option<Route> {
        Route::ALL
            .iter()
            .copied()
            .find(|r| r.descriptor().name == name)
    }
}

/// URL-decode (`+` as space), trim and lower-case a raw route value.
pub fn normalize_route(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8_lossy()
        .trim()
        .to_lowercase()
}

pub fn route_error_message() -> String {
    let [upload, inference] = Route::ALL.map(|r| r.descriptor().name);
    format!(
        "'route' Parameter can only be either `{}` or `{}`",
        upload, inference
    )
}

const MISSING_ROUTE: &str = "Please provide a 'route' Query Parameter";
const INVALID_OBJ_KEY: &str = "Please provide a valid 'obj_key'";

/// The object key of an inference request body, if it has a valid one.
fn obj_key_from_body(body: &[u8]) -> Option<ObjKey> {
    let json: Value = serde_json::from_slice(body).ok()?;
    json.get("obj_key")?.as_str().and_then(ObjKey::parse)
}

/// Validate and serve one request.
pub async fn dispatch<S, C>(
    service: &InferenceService<S, C>,
    method: &str,
    route: Option<&str>,
    body: &[u8],
) -> ApiResponse
where
    S: ObjectStore,
    C: Classifier,
{
    debug!("{} route={:?} ({} byte body)", method, route, body.len());

    let route = match route {
        Some(raw) => normalize_route(raw),
        None => return ApiResponse::bad_request(MISSING_ROUTE),
    };

    let route = match Route::from_name(&route) {
        Some(route) => route,
        None => return ApiResponse::bad_request(&route_error_message()),
    };

    if method != route.descriptor().method {
        return ApiResponse::method_not_allowed();
    }

    let result = match route {
        Route::GetUploadUrl => service
            .get_upload_url()
            .await
            .map(|ticket| ApiResponse::success(&ticket)),
        Route::GetInference => {
            let key = match obj_key_from_body(body) {
                Some(key) => key,
                None => return ApiResponse::bad_request(INVALID_OBJ_KEY),
            };
            service
                .get_inference(&key)
                .await
                .map(|prediction| ApiResponse::success(&prediction))
        }
    };

    result.unwrap_or_else(|err| {
        error!("{} failed: {}", route.descriptor().name, err);
        ApiResponse::internal_error()
    })
}
