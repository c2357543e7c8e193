use crate::errors::CiStatusError;
use crate::provider::{CiProvider, StatusQuery};
use crate::schema::{GITHUB_ACTIONS_LOGO, ShieldSchema};
use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{AUTHORIZATION, HeaderName, USER_AGENT};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Provider double that answers every query with a scripted outcome.
pub struct FakeProvider {
    outcome: Result<(String, String), CiStatusError>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn succeeding(workflow: &str, conclusion: &str) -> Self {
        FakeProvider {
            outcome: Ok((workflow.to_string(), conclusion.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: CiStatusError) -> Self {
        FakeProvider {
            outcome: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CiProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn status(&self, query: &StatusQuery) -> Result<ShieldSchema, CiStatusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (workflow, conclusion) = self.outcome.clone()?;
        Ok(ShieldSchema::for_brand(GITHUB_ACTIONS_LOGO).with_run(
            &query.owner,
            &query.repo,
            &workflow,
            &conclusion,
        ))
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
}

/// A loopback HTTP server that plays the part of the GitHub REST API.
///
/// Responses are looked up by exact request path; anything else gets
/// GitHub's 404 body.
pub struct MockGitHub {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockGitHub {
    pub async fn start(responses: Vec<(&str, StatusCode, String)>) -> Self {
        let responses: Arc<HashMap<String, (StatusCode, String)>> = Arc::new(
            responses
                .into_iter()
                .map(|(path, status, body)| (path.to_string(), (status, body)))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let responses = responses.clone();
                let recorded = recorded.clone();

                tokio::spawn(async move {
                    let svc = service_fn(move |req: Request<Incoming>| {
                        let responses = responses.clone();
                        let recorded = recorded.clone();
                        async move { Ok::<_, Infallible>(respond(&responses, &recorded, req)) }
                    });

                    if let Err(err) =
                        hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                    {
                        eprintln!("Error serving connection: {:?}", err);
                    }
                });
            }
        });

        MockGitHub {
            url: format!("http://127.0.0.1:{port}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn respond(
    responses: &HashMap<String, (StatusCode, String)>,
    recorded: &Mutex<Vec<RecordedRequest>>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    recorded.lock().unwrap().push(RecordedRequest {
        path: req.uri().path().to_string(),
        query: req.uri().query().map(String::from),
        authorization: header(AUTHORIZATION),
        user_agent: header(USER_AGENT),
    });

    let (status, body) = responses.get(req.uri().path()).cloned().unwrap_or((
        StatusCode::NOT_FOUND,
        r#"{"message":"Not Found"}"#.to_string(),
    ));

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

/// Body of `GET /repos/{owner}/{repo}/actions/runs`, newest run first.
pub fn runs_body(runs: &[(u64, Option<&str>)]) -> String {
    let workflow_runs: Vec<_> = runs
        .iter()
        .enumerate()
        .map(|(i, (workflow_id, conclusion))| {
            serde_json::json!({
                "id": 1000 + i,
                "workflow_id": workflow_id,
                "status": if conclusion.is_some() { "completed" } else { "in_progress" },
                "conclusion": conclusion,
                "head_branch": "main",
            })
        })
        .collect();

    serde_json::json!({
        "total_count": runs.len(),
        "workflow_runs": workflow_runs,
    })
    .to_string()
}

/// Body of `GET /repos/{owner}/{repo}/actions/workflows/{id}`.
pub fn workflow_body(id: u64, name: &str) -> String {
    serde_json::json!({
        "id": id,
        "name": name,
        "path": ".github/workflows/ci.yml",
        "state": "active",
    })
    .to_string()
}
