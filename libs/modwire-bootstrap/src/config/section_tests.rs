//! Parsing tests for the router, openapi and logging sections.

use super::{OpenApiConfig, RouteOrdering, RouterConfig, Section};

#[test]
fn test_parse_empty_router_section_uses_defaults() {
    let cfg: RouterConfig = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.ordering, RouteOrdering::MostLiteral);
    assert!(!cfg.wrap_responses);
    assert!(!cfg.debug_routes);
    assert_eq!(cfg.docs_path, "/api-docs.json");
    assert_eq!(cfg.max_body_bytes, 2 * 1024 * 1024);
}

#[test]
fn test_parse_full_router_section() {
    let yaml = r#"
ordering: fewest_params
wrap_responses: true
debug_routes: true
docs_path: ""
max_body_bytes: 1024
"#;
    let cfg: RouterConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.ordering, RouteOrdering::FewestParams);
    assert!(cfg.wrap_responses);
    assert!(cfg.debug_routes);
    assert!(cfg.docs_path.is_empty());
    assert_eq!(cfg.max_body_bytes, 1024);
}

#[test]
fn test_unknown_ordering_is_rejected() {
    let res: Result<RouterConfig, _> = serde_yaml::from_str("ordering: alphabetical");
    assert!(res.is_err());
}

#[test]
fn test_parse_openapi_section() {
    let yaml = r#"
title: "Billing"
version: "2.3.0"
description: "Billing endpoints"
server_url: "http://billing.local"
"#;
    let cfg: OpenApiConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.title, "Billing");
    assert_eq!(cfg.version, "2.3.0");
    assert_eq!(cfg.description, "Billing endpoints");
    assert_eq!(cfg.server_url.as_deref(), Some("http://billing.local"));
    assert_eq!(cfg.server_description, "Development server");
}

#[test]
fn test_parse_logging_section_optional_fields() {
    let yaml = r#"
console_level: warn
file: "logs/http.log"
"#;
    let section: Section = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(section.console_level, "warn");
    assert_eq!(section.file, "logs/http.log");
    assert!(section.file_level.is_empty());
    assert!(section.max_backups.is_none());
    assert!(section.max_size_mb.is_none());
}
