//! Request dispatch: argument extraction, controller invocation, reply
//! rendering and the axum binding.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use serde_json::{json, Map, Value};
use tracing::Instrument;

use modwire_bootstrap::RouterConfig;

use super::{RouteEntry, RouteTable};
use crate::api::{HandlerArgs, Reply};
use crate::context::AppContext;
use crate::descriptor::{ParamBinding, ParamSource};
use crate::errors::{not_found_response, AppError, ErrorFilter, HandlerError};

/// The parts of a request handlers can bind arguments to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub path_params: Map<String, Value>,
    /// Repeated keys collect into an array.
    pub query: Map<String, Value>,
    /// Lower-cased names; repeated headers are joined with `, `.
    pub headers: Map<String, Value>,
    /// `null` when the request had no body.
    pub body: Value,
}

impl RequestContext {
    pub async fn from_request(
        captures: Vec<(String, String)>,
        request: Request,
        max_body_bytes: usize,
    ) -> Result<Self, HandlerError> {
        let (parts, body) = request.into_parts();

        let path_params = captures
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        let query = parts.uri.query().map(parse_query).unwrap_or_default();

        let mut headers = Map::new();
        for (name, value) in &parts.headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            match headers.get_mut(name.as_str()) {
                Some(Value::String(existing)) => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                _ => {
                    headers.insert(name.as_str().to_string(), Value::String(value.to_string()));
                }
            }
        }

        let bytes = axum::body::to_bytes(body, max_body_bytes)
            .await
            .map_err(|e| AppError::new(413, format!("Failed to read request body: {e}")))?;
        let body = parse_body(
            parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            &bytes,
        )?;

        Ok(Self {
            path_params,
            query,
            headers,
            body,
        })
    }

    /// Lay out handler arguments by binding index. Unbound positions and
    /// missing keys are `null`.
    pub fn arguments(&self, bindings: &[ParamBinding]) -> HandlerArgs {
        let len = bindings.iter().map(|b| b.index + 1).max().unwrap_or(0);
        let mut values = vec![Value::Null; len];
        for binding in bindings {
            values[binding.index] = self.extract(binding);
        }
        HandlerArgs::new(values)
    }

    fn extract(&self, binding: &ParamBinding) -> Value {
        let key = binding.key.as_deref();
        match binding.source {
            ParamSource::Path => keyed(&self.path_params, key),
            ParamSource::Query => keyed(&self.query, key),
            ParamSource::Header => {
                keyed(&self.headers, key.map(str::to_ascii_lowercase).as_deref())
            }
            ParamSource::Body => match key {
                Some(k) => self.body.get(k).cloned().unwrap_or(Value::Null),
                None => self.body.clone(),
            },
        }
    }
}

fn keyed(collection: &Map<String, Value>, key: Option<&str>) -> Value {
    match key {
        Some(k) => collection.get(k).cloned().unwrap_or(Value::Null),
        None => Value::Object(collection.clone()),
    }
}

fn parse_query(raw: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
        let v = Value::String(v.into_owned());
        match out.get_mut(k.as_ref()) {
            Some(Value::Array(items)) => items.push(v),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, v]);
            }
            None => {
                out.insert(k.into_owned(), v);
            }
        }
    }
    out
}

fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Result<Value, HandlerError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let is_form = content_type
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if is_form {
        let raw = String::from_utf8_lossy(bytes);
        return Ok(Value::Object(parse_query(&raw)));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::bad_request(format!("Invalid JSON body: {e}")).into())
}

/// Shared, cloneable request handler behind the axum fallback.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<AppContext>,
    table: Arc<RouteTable>,
    filter: Arc<dyn ErrorFilter>,
    wrap_responses: bool,
    max_body_bytes: usize,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<AppContext>,
        table: Arc<RouteTable>,
        filter: Arc<dyn ErrorFilter>,
        config: &RouterConfig,
    ) -> Self {
        Self {
            ctx,
            table,
            filter,
            wrap_responses: config.wrap_responses,
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Route a request through the table; unmatched requests get the 404
    /// envelope. `HEAD` runs the `GET` handler and drops the body.
    pub async fn handle(&self, request: Request) -> Response {
        let matched = self
            .table
            .match_request(request.method(), request.uri().path())
            .map(|(entry, captures)| (entry.clone(), captures));
        match matched {
            Some((entry, captures)) if request.method() == http::Method::HEAD => {
                let (parts, _) = self.dispatch(&entry, captures, request).await.into_parts();
                Response::from_parts(parts, Body::empty())
            }
            Some((entry, captures)) => self.dispatch(&entry, captures, request).await,
            None => {
                tracing::debug!(method = %request.method(), path = %request.uri().path(), "no route matched");
                not_found_response()
            }
        }
    }

    pub async fn dispatch(
        &self,
        entry: &RouteEntry,
        captures: Vec<(String, String)>,
        request: Request,
    ) -> Response {
        let span = tracing::info_span!(
            "dispatch",
            method = %entry.method,
            route = %entry.path,
            controller = %entry.controller.token(),
            handler = %entry.handler,
        );
        async {
            match self.invoke(entry, captures, request).await {
                Ok(reply) => self.render(reply),
                Err(e) => self.filter.catch(e),
            }
        }
        .instrument(span)
        .await
    }

    async fn invoke(
        &self,
        entry: &RouteEntry,
        captures: Vec<(String, String)>,
        request: Request,
    ) -> Result<Reply, HandlerError> {
        let request = RequestContext::from_request(captures, request, self.max_body_bytes).await?;
        let args = request.arguments(&entry.bindings);
        let controller = self
            .ctx
            .controller(&entry.controller)
            .map_err(anyhow::Error::from)?;
        controller.handle(&entry.handler, args).await
    }

    fn render(&self, reply: Reply) -> Response {
        match reply {
            Reply::Json { status, body } if self.wrap_responses => {
                let body = json!({ "data": body, "code": status.as_u16() });
                (status, Json(body)).into_response()
            }
            Reply::Json { status, body } => (status, Json(body)).into_response(),
            Reply::NoContent => (StatusCode::NO_CONTENT, Body::empty()).into_response(),
            Reply::Handled(response) => response,
        }
    }

    /// Mount the dispatcher as the router's fallback so table order decides
    /// which route serves a request.
    pub fn into_router(self) -> axum::Router {
        axum::Router::new().fallback(move |request: Request| {
            let dispatcher = self.clone();
            async move { dispatcher.handle(request).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request as HttpRequest;

    fn binding(index: usize, source: ParamSource, key: Option<&str>) -> ParamBinding {
        ParamBinding {
            index,
            source,
            key: key.map(str::to_owned),
        }
    }

    #[test]
    fn query_repeated_keys_become_array() {
        let q = parse_query("tag=a&tag=b&tag=c&page=2&name=J%C3%BCrgen+X");
        assert_eq!(q["tag"], json!(["a", "b", "c"]));
        assert_eq!(q["page"], json!("2"));
        assert_eq!(q["name"], json!("Jürgen X"));
    }

    #[test]
    fn body_parsing_by_content_type() {
        assert_eq!(parse_body(None, b"").unwrap(), Value::Null);
        assert_eq!(
            parse_body(Some("application/json"), br#"{"a":1}"#).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            parse_body(Some("application/x-www-form-urlencoded"), b"a=1&b=2").unwrap(),
            json!({"a": "1", "b": "2"})
        );
        match parse_body(Some("application/json"), b"{oops").unwrap_err() {
            HandlerError::App(e) => assert_eq!(e.status_code, 400),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_context_collects_all_sources() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/items/42?verbose=true")
            .header("X-Trace", "abc")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"box"}"#))
            .unwrap();

        let ctx = RequestContext::from_request(
            vec![("id".to_string(), "42".to_string())],
            request,
            1024,
        )
        .await
        .unwrap();

        assert_eq!(ctx.path_params["id"], json!("42"));
        assert_eq!(ctx.query["verbose"], json!("true"));
        assert_eq!(ctx.headers["x-trace"], json!("abc"));
        assert_eq!(ctx.body, json!({"name": "box"}));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let request = HttpRequest::builder()
            .uri("/")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        match RequestContext::from_request(vec![], request, 8).await.unwrap_err() {
            HandlerError::App(e) => assert_eq!(e.status_code, 413),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn arguments_follow_binding_indexes() {
        let mut ctx = RequestContext {
            body: json!({"name": "box", "size": 3}),
            ..Default::default()
        };
        ctx.path_params.insert("id".into(), json!("42"));
        ctx.query.insert("page".into(), json!("2"));
        ctx.headers.insert("x-trace".into(), json!("abc"));

        let args = ctx.arguments(&[
            binding(0, ParamSource::Path, Some("id")),
            binding(1, ParamSource::Body, None),
            binding(3, ParamSource::Header, Some("X-Trace")),
            binding(4, ParamSource::Query, None),
            binding(5, ParamSource::Body, Some("size")),
            binding(6, ParamSource::Query, Some("missing")),
        ]);

        assert_eq!(args.len(), 7);
        assert_eq!(args.raw(0), Some(&json!("42")));
        assert_eq!(args.raw(1), Some(&json!({"name": "box", "size": 3})));
        assert_eq!(args.raw(2), Some(&Value::Null));
        assert_eq!(args.raw(3), Some(&json!("abc")));
        assert_eq!(args.raw(4), Some(&json!({"page": "2"})));
        assert_eq!(args.raw(5), Some(&json!(3)));
        assert_eq!(args.raw(6), Some(&Value::Null));
    }

    #[test]
    fn unkeyed_path_binding_yields_all_params() {
        let mut ctx = RequestContext::default();
        ctx.path_params.insert("a".into(), json!("1"));
        ctx.path_params.insert("b".into(), json!("2"));
        let args = ctx.arguments(&[binding(0, ParamSource::Path, None)]);
        assert_eq!(args.raw(0), Some(&json!({"a": "1", "b": "2"})));
    }
}
