//! Route table construction.
//!
//! Reads each loaded controller's prefix, routes and parameter bindings,
//! normalizes paths, orders every controller's routes by specificity and
//! produces a flat [`RouteTable`]. Binding the table to axum lives in
//! [`dispatch`].

pub mod dispatch;

use std::collections::HashMap;
use std::fmt;

use modwire_bootstrap::RouteOrdering;

use crate::context::AppContext;
use crate::descriptor::{ControllerDef, HttpMethod, ParamBinding, RouteDescriptor};
use crate::loader::BootstrapError;
use crate::metadata::kinds::{ControllerPrefix, Params, Routes};

/// Collapse repeated `/`, force one leading `/`, drop a trailing `/` unless
/// the result is the root. The empty string (no prefix) stays empty.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Join a normalized prefix with a normalized route path. An empty or root
/// side disappears; two roots give `/`.
pub fn build_full_path(prefix: &str, route: &str) -> String {
    let prefix_is_root = prefix.is_empty() || prefix == "/";
    let route_is_root = route.is_empty() || route == "/";
    match (prefix_is_root, route_is_root) {
        (true, true) => "/".to_string(),
        (true, false) => route.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}{route}"),
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn is_param(segment: &str) -> bool {
    segment.starts_with(':')
}

pub fn literal_segments(path: &str) -> usize {
    segments(path).filter(|s| !is_param(s)).count()
}

pub fn param_segments(path: &str) -> usize {
    segments(path).filter(|s| is_param(s)).count()
}

/// Names of `:name` segments, in order.
pub fn path_param_names(path: &str) -> Vec<String> {
    segments(path)
        .filter_map(|s| s.strip_prefix(':'))
        .map(str::to_owned)
        .collect()
}

/// `/users/:id` -> `/users/{id}`.
pub fn template_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|s| match s.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => s.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Sort most specific first. The sort is stable, so routes that compare equal
/// keep declaration order.
pub fn sort_routes(routes: &mut [RouteDescriptor], ordering: RouteOrdering) {
    match ordering {
        RouteOrdering::MostLiteral => routes.sort_by(|a, b| {
            literal_segments(&b.path)
                .cmp(&literal_segments(&a.path))
                .then_with(|| param_segments(&a.path).cmp(&param_segments(&b.path)))
                .then_with(|| b.path.len().cmp(&a.path.len()))
        }),
        RouteOrdering::FewestParams => routes.sort_by(|a, b| {
            param_segments(&a.path)
                .cmp(&param_segments(&b.path))
                .then_with(|| b.path.len().cmp(&a.path.len()))
        }),
    }
}

/// Order a controller's routes as declared, then normalize their paths. The
/// length tie-break sees the declared path text.
pub fn ordered_routes(
    mut routes: Vec<RouteDescriptor>,
    ordering: RouteOrdering,
) -> Vec<RouteDescriptor> {
    sort_routes(&mut routes, ordering);
    routes
        .into_iter()
        .map(|r| RouteDescriptor {
            path: normalize_path(&r.path),
            ..r
        })
        .collect()
}

/// One bound route: where it lives, which controller handles it and how its
/// arguments are extracted.
#[derive(Clone)]
pub struct RouteEntry {
    pub method: HttpMethod,
    /// Full normalized path with `:name` parameters.
    pub path: String,
    pub handler: String,
    pub controller: ControllerDef,
    pub bindings: Vec<ParamBinding>,
}

impl RouteEntry {
    /// Match a request path against this entry's pattern, returning the
    /// percent-decoded `:name` captures. Empty segments are ignored on both
    /// sides, so `/users/42/` matches `/users/:id`.
    pub fn capture(&self, request_path: &str) -> Option<Vec<(String, String)>> {
        let mut pattern = segments(&self.path);
        let mut actual = segments(request_path);
        let mut captures = Vec::new();
        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return Some(captures),
                (Some(p), Some(a)) => match p.strip_prefix(':') {
                    Some(name) => {
                        let value = urlencoding::decode(a)
                            .map(|v| v.into_owned())
                            .unwrap_or_else(|_| a.to_string());
                        captures.push((name.to_string(), value));
                    }
                    None if p == a => {}
                    None => return None,
                },
                _ => return None,
            }
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("controller", &self.controller.token())
            .field("handler", &self.handler)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn build(ctx: &AppContext, ordering: RouteOrdering) -> Result<Self, BootstrapError> {
        let registry = ctx.registry();
        let mut entries = Vec::new();
        let mut owners: HashMap<(HttpMethod, String), crate::token::Token> = HashMap::new();

        for controller in ctx.controllers() {
            let token = controller.token();
            let prefix = normalize_path(
                registry
                    .get::<ControllerPrefix>(token, None)
                    .as_deref()
                    .unwrap_or(""),
            );

            let routes = ordered_routes(registry.get::<Routes>(token, None), ordering);

            for route in routes {
                let path = build_full_path(&prefix, &route.path);
                if let Some(first) = owners.insert((route.method, path.clone()), token) {
                    return Err(BootstrapError::DuplicateRoute {
                        method: route.method,
                        path,
                        first,
                        second: token,
                    });
                }
                tracing::info!("Registering: {} {}", route.method, path);
                let bindings = registry.get::<Params>(token, Some(&route.handler));
                entries.push(RouteEntry {
                    method: route.method,
                    path,
                    handler: route.handler,
                    controller: controller.clone(),
                    bindings,
                });
            }
        }

        tracing::debug!(routes = entries.len(), ?ordering, "route table built");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup by method and full `:name`-style path.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.method == method && e.path == path)
    }

    /// First entry, in table order, whose method and pattern match the
    /// request. `HEAD` is answered by the matching `GET` entry.
    pub fn match_request(
        &self,
        method: &http::Method,
        path: &str,
    ) -> Option<(&RouteEntry, Vec<(String, String)>)> {
        let method = if *method == http::Method::HEAD {
            HttpMethod::Get
        } else {
            HttpMethod::from_http(method)?
        };
        self.entries
            .iter()
            .filter(|e| e.method == method)
            .find_map(|e| e.capture(path).map(|captures| (e, captures)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> RouteDescriptor {
        RouteDescriptor {
            method: HttpMethod::Get,
            path: path.to_string(),
            handler: path.to_string(),
        }
    }

    fn paths(routes: &[RouteDescriptor]) -> Vec<&str> {
        routes.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize_path("//users//"), "/users");
        assert_eq!(normalize_path("users/:id/"), "/users/:id");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("///"), "/");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for p in ["//a//b/", "/", "", "x", "/users/:id", "a///:b//c"] {
            let once = normalize_path(p);
            assert_eq!(normalize_path(&once), once, "input {p:?}");
        }
    }

    #[test]
    fn full_path_collapses_root_sides() {
        assert_eq!(build_full_path("", "/"), "/");
        assert_eq!(build_full_path("/", ""), "/");
        assert_eq!(build_full_path("/users", "/"), "/users");
        assert_eq!(build_full_path("/users", ""), "/users");
        assert_eq!(build_full_path("", "/health"), "/health");
        assert_eq!(build_full_path("/", "/health"), "/health");
        assert_eq!(build_full_path("/users", "/:id"), "/users/:id");
    }

    #[test]
    fn literal_route_sorts_before_param_sibling() {
        let mut routes = vec![get("/users/:id"), get("/users/active")];
        sort_routes(&mut routes, RouteOrdering::MostLiteral);
        assert_eq!(paths(&routes), vec!["/users/active", "/users/:id"]);

        let mut routes = vec![get("/users/:id"), get("/users/active")];
        sort_routes(&mut routes, RouteOrdering::FewestParams);
        assert_eq!(paths(&routes), vec!["/users/active", "/users/:id"]);
    }

    #[test]
    fn orderings_differ_on_literal_count() {
        // Two literals and two params vs. no literals and one param.
        let declared = vec![get("/:a"), get("/x/:b/y/:c")];

        let mut most_literal = declared.clone();
        sort_routes(&mut most_literal, RouteOrdering::MostLiteral);
        assert_eq!(paths(&most_literal), vec!["/x/:b/y/:c", "/:a"]);

        let mut fewest_params = declared;
        sort_routes(&mut fewest_params, RouteOrdering::FewestParams);
        assert_eq!(paths(&fewest_params), vec!["/:a", "/x/:b/y/:c"]);
    }

    #[test]
    fn longer_path_breaks_remaining_ties() {
        let mut routes = vec![get("/a/:id"), get("/abc/:id"), get("/ab/:id")];
        sort_routes(&mut routes, RouteOrdering::MostLiteral);
        assert_eq!(paths(&routes), vec!["/abc/:id", "/ab/:id", "/a/:id"]);
    }

    #[test]
    fn length_tie_break_uses_declared_path() {
        // Declared "///x/:id" is longer than "/ab/:id"; normalized it is shorter.
        let routes = ordered_routes(
            vec![get("/ab/:id"), get("///x/:id")],
            RouteOrdering::MostLiteral,
        );
        assert_eq!(paths(&routes), vec!["/x/:id", "/ab/:id"]);
        assert_eq!(routes[0].handler, "///x/:id");
    }

    mod matching {
        use super::super::*;
        use crate::api::{HandlerArgs, Reply};
        use crate::container::{ContainerError, Resolver};
        use crate::contracts::{Controller, Injectable};
        use crate::errors::HandlerError;
        use async_trait::async_trait;

        struct Noop;
        impl Injectable for Noop {
            fn construct(_: &mut Resolver<'_>) -> Result<Self, ContainerError> {
                Ok(Noop)
            }
        }
        #[async_trait]
        impl Controller for Noop {
            async fn handle(&self, h: &str, _: HandlerArgs) -> Result<Reply, HandlerError> {
                Err(HandlerError::unknown_handler(h))
            }
        }

        fn entry(method: HttpMethod, path: &str) -> RouteEntry {
            RouteEntry {
                method,
                path: path.to_string(),
                handler: path.to_string(),
                controller: ControllerDef::of::<Noop>(),
                bindings: Vec::new(),
            }
        }

        #[test]
        fn capture_decodes_params_and_tolerates_trailing_slash() {
            let e = entry(HttpMethod::Get, "/users/:id/files/:name");
            let caps = e.capture("/users/42/files/a%20b.txt/").unwrap();
            assert_eq!(
                caps,
                vec![
                    ("id".to_string(), "42".to_string()),
                    ("name".to_string(), "a b.txt".to_string())
                ]
            );
            assert!(e.capture("/users/42/files").is_none());
            assert!(e.capture("/users/42/other/x").is_none());
        }

        #[test]
        fn root_entry_matches_only_root() {
            let e = entry(HttpMethod::Get, "/");
            assert_eq!(e.capture("/"), Some(vec![]));
            assert!(e.capture("/health").is_none());
        }

        #[test]
        fn first_matching_entry_in_table_order_wins() {
            let table = RouteTable {
                entries: vec![
                    entry(HttpMethod::Get, "/users/active"),
                    entry(HttpMethod::Get, "/users/:id"),
                    entry(HttpMethod::Delete, "/users/:userId"),
                ],
            };

            let (e, caps) = table.match_request(&http::Method::GET, "/users/active").unwrap();
            assert_eq!(e.path, "/users/active");
            assert!(caps.is_empty());

            let (e, caps) = table.match_request(&http::Method::GET, "/users/7").unwrap();
            assert_eq!(e.path, "/users/:id");
            assert_eq!(caps[0].1, "7");

            let (e, _) = table.match_request(&http::Method::DELETE, "/users/7").unwrap();
            assert_eq!(e.path, "/users/:userId");

            assert!(table.match_request(&http::Method::POST, "/users/7").is_none());
            let (e, caps) = table.match_request(&http::Method::HEAD, "/users/7").unwrap();
            assert_eq!(e.method, HttpMethod::Get);
            assert_eq!(e.path, "/users/:id");
            assert_eq!(caps[0].1, "7");
            assert!(table.match_request(&http::Method::OPTIONS, "/users/7").is_none());
            assert!(table.find(HttpMethod::Get, "/users/:id").is_some());
        }
    }

    #[test]
    fn template_and_param_names() {
        assert_eq!(template_path("/users/:id/posts/:post"), "/users/{id}/posts/{post}");
        assert_eq!(template_path("/"), "/");
        assert_eq!(template_path(""), "/");
        assert_eq!(path_param_names("/users/:id/posts/:post"), vec!["id", "post"]);
        assert_eq!(literal_segments("/users/:id/posts"), 2);
        assert_eq!(param_segments("/users/:id/posts"), 1);
    }
}
