use crate::allow_list::AllowList;
use crate::errors::{CiStatusError, ServerError};
use crate::metrics_defs::{REQUESTS, UPSTREAM_DURATION};
use crate::provider::{CiProvider, StatusQuery};
use crate::schema::ShieldSchema;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use shared::http::{full_body, make_boxed_error_response, make_text_response};
use shared::routing::{Resolution, Route, RouteMatch, RouteTable};
use shared::{counter, histogram};
use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub const HEALTH_PATH: &str = "/health";
pub const CI_STATUS_PATH: &str = "/ci/status/{user}/{repo}/{branch}/";

pub type ServiceBody = BoxBody<Bytes, ServerError>;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Endpoint {
    Health,
    CiStatus,
}

#[derive(Serialize)]
struct HealthResponse {
    alive: bool,
}

struct Inner {
    provider: Arc<dyn CiProvider>,
    allow_list: AllowList,
    routes: RouteTable<Endpoint>,
}

/// Serves `/health` and the badge endpoint.
///
/// Cheap to clone; all state is read-only after construction and shared
/// between connections.
#[derive(Clone)]
pub struct CiStatusService {
    inner: Arc<Inner>,
}

impl CiStatusService {
    pub fn new(provider: Arc<dyn CiProvider>, allow_list: AllowList) -> Self {
        let routes = RouteTable::new(vec![
            Route::new(Method::GET, HEALTH_PATH, Endpoint::Health),
            Route::new(Method::GET, CI_STATUS_PATH, Endpoint::CiStatus),
        ]);

        CiStatusService {
            inner: Arc::new(Inner {
                provider,
                allow_list,
                routes,
            }),
        }
    }
}

// The request body is never read, so any body type is accepted.
impl<B> Service<Request<B>> for CiStatusService {
    type Response = Response<ServiceBody>;
    type Error = ServerError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let inner = self.inner.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        Box::pin(async move { Ok(inner.dispatch(&method, &path).await) })
    }
}

impl Inner {
    async fn dispatch(&self, method: &Method, path: &str) -> Response<ServiceBody> {
        tracing::debug!(%method, path, "request");

        match self.routes.resolve(method, path) {
            Resolution::Matched(route) => match route.action {
                Endpoint::Health => health(),
                Endpoint::CiStatus => self.ci_status(&route).await,
            },
            Resolution::MethodNotAllowed => {
                make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED)
            }
            Resolution::NotFound => make_boxed_error_response(StatusCode::NOT_FOUND),
        }
    }

    async fn ci_status(&self, route: &RouteMatch<'_, Endpoint>) -> Response<ServiceBody> {
        let (Some(user), Some(repo), Some(branch)) =
            (route.param("user"), route.param("repo"), route.param("branch"))
        else {
            return make_boxed_error_response(StatusCode::NOT_FOUND);
        };

        let result = match decode_query(user, repo, branch) {
            Ok(query) => self.lookup(&query).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(schema) => {
                counter!(REQUESTS, "endpoint" => "ci_status", "outcome" => "ok").increment(1);
                json_response(&schema)
            }
            Err(e) => {
                tracing::warn!(
                    owner = user,
                    repo,
                    branch,
                    error = %e,
                    "ci status request failed"
                );
                counter!(REQUESTS, "endpoint" => "ci_status", "outcome" => e.kind()).increment(1);
                make_text_response(e.status_code(), e.to_string())
            }
        }
    }

    /// Rejected owners never reach the provider.
    async fn lookup(&self, query: &StatusQuery) -> Result<ShieldSchema, CiStatusError> {
        if !self.allow_list.is_allowed(&query.owner) {
            return Err(CiStatusError::UserNotAllowed);
        }

        let start = Instant::now();
        let result = self.provider.status(query).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        histogram!(
            UPSTREAM_DURATION,
            "provider" => self.provider.name(),
            "outcome" => outcome
        )
        .record(start.elapsed().as_secs_f64());

        result
    }
}

/// Path parameters arrive percent-encoded; owner, repo and branch names are
/// matched and forwarded decoded.
fn decode_query(user: &str, repo: &str, branch: &str) -> Result<StatusQuery, CiStatusError> {
    let decode = |segment: &str| {
        percent_decode_str(segment)
            .decode_utf8()
            .map(Cow::into_owned)
            .map_err(|_| CiStatusError::InvalidPathSegment(segment.to_string()))
    };

    Ok(StatusQuery::new(decode(user)?, decode(repo)?, decode(branch)?))
}

fn health() -> Response<ServiceBody> {
    counter!(REQUESTS, "endpoint" => "health", "outcome" => "ok").increment(1);
    json_response(&HealthResponse { alive: true })
}

fn json_response<T: Serialize>(value: &T) -> Response<ServiceBody> {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            let mut response = Response::new(full_body(bytes));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
