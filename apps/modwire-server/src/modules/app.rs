use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use modwire::{
    AppError, ApiDocs, ContainerError, Controller, Declarator, Dependency, HandlerArgs,
    HandlerError, Injectable, MetadataRegistry, ModuleDescriptor, ParamDoc, Reply, Resolver,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::hash::{HashModule, HashService};
use super::http::HttpModule;

/// Process facts supplied to the container from outside the module graph.
#[derive(Debug)]
pub struct RuntimeInfo {
    pub name: String,
    pub version: String,
    started: Instant,
}

impl RuntimeInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            started: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/* ---------------------------------- DTOs ---------------------------------- */

#[derive(Debug, Deserialize)]
pub struct HashRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct HashResponse {
    pub hash: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

pub struct StatusDto;
pub struct HealthDto;

/* ------------------------------- Controllers ------------------------------ */

pub struct AppController {
    info: Arc<RuntimeInfo>,
}

impl Injectable for AppController {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<RuntimeInfo>()]
    }

    fn construct(deps: &mut Resolver<'_>) -> Result<Self, ContainerError> {
        Ok(Self { info: deps.get()? })
    }
}

#[async_trait]
impl Controller for AppController {
    async fn handle(&self, handler: &str, _args: HandlerArgs) -> Result<Reply, HandlerError> {
        match handler {
            "status" => Reply::json(&json!({
                "data": {
                    "message": format!("Welcome to {}", self.info.name),
                    "version": self.info.version,
                    "uptime": self.info.uptime_secs(),
                },
                "message": "API is running successfully",
            })),
            "health" => Reply::json(&json!({
                "status": "ok",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "uptime": self.info.uptime_secs(),
            })),
            other => Err(HandlerError::unknown_handler(other)),
        }
    }
}

pub struct HashController {
    hashes: Arc<HashService>,
}

impl Injectable for HashController {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<HashService>()]
    }

    fn construct(deps: &mut Resolver<'_>) -> Result<Self, ContainerError> {
        Ok(Self {
            hashes: deps.get()?,
        })
    }
}

#[async_trait]
impl Controller for HashController {
    async fn handle(&self, handler: &str, mut args: HandlerArgs) -> Result<Reply, HandlerError> {
        match handler {
            "create" => {
                let req: Option<HashRequest> = args.take(0)?;
                let req = req.ok_or_else(|| AppError::bad_request("Request body is required"))?;
                Reply::created(&HashResponse {
                    hash: self.hashes.hash(&req.value),
                })
            }
            "verify" => {
                let value: Option<String> = args.take(0)?;
                let hash: Option<String> = args.take(1)?;
                let (Some(value), Some(hash)) = (value, hash) else {
                    return Err(AppError::bad_request("Both 'value' and 'hash' are required").into());
                };
                Reply::json(&VerifyResponse {
                    valid: self.hashes.verify(&value, &hash),
                })
            }
            other => Err(HandlerError::unknown_handler(other)),
        }
    }
}

/* --------------------------------- Module --------------------------------- */

pub struct AppModule;

fn declare(reg: &mut MetadataRegistry) {
    super::hash::declare(reg);
    super::http::declare(reg);

    reg.module::<AppModule>(
        ModuleDescriptor::new()
            .import::<HashModule>()
            .import::<HttpModule>()
            .controller::<AppController>()
            .controller::<HashController>(),
    );

    reg.controller::<AppController>("")
        .get("", "status", |op| op.response_of::<StatusDto>(200, "API status"))
        .get("/health", "health", |op| op.response_of::<HealthDto>(200, "Health check"));
    reg.api_docs::<AppController>(
        ApiDocs::new("App")
            .endpoint("status", |op| op.summary("API status"))
            .endpoint("health", |op| {
                op.summary("Health check")
                    .description("Liveness probe with server time and uptime")
            }),
    );

    reg.controller::<HashController>("/hash")
        .tags(["Hash"])
        .post("/", "create", |op| {
            op.body(0)
                .summary("Hash a value")
                .request_body_of::<HashRequest>()
                .response_of::<HashResponse>(201, "Salted hash")
                .response(400, "Missing body")
        })
        .get("/verify", "verify", |op| {
            op.query(0, "value")
                .query(1, "hash")
                .summary("Verify a value against a stored hash")
                .api_query(ParamDoc::new("value").description("Plain value").required(true))
                .api_query(ParamDoc::new("hash").description("Stored hash").required(true))
                .response_of::<VerifyResponse>(200, "Verification result")
        });

    reg.schema::<HashRequest>()
        .property("value", |p| p.min_length(1).example("s3cret"));
    reg.schema::<HashResponse>()
        .property("hash", |p| p.description("`<salt hex>$<sha256 hex>`"));
    reg.schema::<VerifyResponse>().property("valid", |p| p.boolean());
    reg.schema::<StatusDto>()
        .property("data", |p| p.object())
        .property("message", |p| p.example("API is running successfully"));
    reg.schema::<HealthDto>()
        .property("status", |p| p.one_of(["ok"]))
        .property("timestamp", |p| p.format("date-time"))
        .property("uptime", |p| p.number().minimum(0.0));
}

inventory::submit! {
    Declarator(declare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use modwire::Application;
    use serde_json::Value;
    use tower::ServiceExt;

    fn router() -> axum::Router {
        Application::builder(MetadataRegistry::discover())
            .instance(Arc::new(RuntimeInfo::new("modwire-server", "0.1.0")))
            .bootstrap::<AppModule>()
            .expect("bootstrap")
            .into_router()
    }

    async fn send(router: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn root_and_health() {
        let (status, body) = send(router(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "API is running successfully");
        assert_eq!(body["data"]["version"], "0.1.0");

        let (status, body) = send(router(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn hash_and_verify_round_trip() {
        let req = Request::builder()
            .method("POST")
            .uri("/hash")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"value":"s3cret"}"#))
            .unwrap();
        let (status, body) = send(router(), req).await;
        assert_eq!(status, StatusCode::CREATED);
        let hash = body["hash"].as_str().unwrap().to_string();

        let uri = format!("/hash/verify?value=s3cret&hash={}", hash.replace('$', "%24"));
        let (_, body) = send(router(), get(&uri)).await;
        assert_eq!(body, serde_json::json!({"valid": true}));

        let (status, body) = send(router(), get("/hash/verify?value=x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["title"], "Bad Request");
    }

    #[tokio::test]
    async fn missing_body_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/hash/")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Request body is required");
    }

    #[test]
    fn bootstrap_requires_runtime_info() {
        let err = Application::builder(MetadataRegistry::discover())
            .bootstrap::<AppModule>()
            .err()
            .expect("must fail without RuntimeInfo");
        assert!(err.to_string().contains("RuntimeInfo"));
    }

    #[test]
    fn openapi_document_covers_sample_routes() {
        let app = Application::builder(MetadataRegistry::discover())
            .instance(Arc::new(RuntimeInfo::new("modwire-server", "0.1.0")))
            .bootstrap::<AppModule>()
            .expect("bootstrap");
        let v = serde_json::to_value(app.openapi()).unwrap();

        assert_eq!(v.pointer("/paths/~1/get/tags"), Some(&serde_json::json!(["App"])));
        assert_eq!(
            v.pointer("/paths/~1hash~1verify/get/tags"),
            Some(&serde_json::json!(["Hash"]))
        );
        assert!(v.pointer("/components/schemas/HashRequest").is_some());
        assert!(v.pointer("/components/schemas/HealthDto").is_some());
        assert_eq!(
            v.pointer("/paths/~1hash/post/responses/201/content/application~1json/schema/$ref")
                .and_then(Value::as_str),
            Some("#/components/schemas/HashResponse")
        );
    }
}
