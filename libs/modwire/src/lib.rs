//! # Modwire - Metadata-Driven Web Bootstrap
//!
//! Modules, providers and controllers are declared once into a typed
//! [`MetadataRegistry`]; bootstrap then resolves the module graph into a
//! singleton [`DependencyContainer`], builds an ordered route table and
//! synthesizes an OpenAPI document from the same metadata.
//!
//! ## Features
//!
//! - **Module graph**: imports/exports with reachability checks and cycle detection
//! - **Singleton DI**: lazy construction, cycle reporting, construct-once under contention
//! - **Route table**: path normalization and specificity ordering (`/users/active` before `/users/:id`)
//! - **OpenAPI**: operations, parameters, bodies, responses and DTO schemas via utoipa
//! - **Auto-discovery**: declarations submitted through `inventory`
//!
//! ## Example
//!
//! ```rust,ignore
//! use modwire::{
//!     async_trait, Application, Controller, ContainerError, Dependency, HandlerArgs,
//!     HandlerError, Injectable, MetadataRegistry, ModuleDescriptor, Reply, Resolver,
//! };
//! use std::sync::Arc;
//!
//! struct ItemService;
//! impl Injectable for ItemService {
//!     fn construct(_: &mut Resolver<'_>) -> Result<Self, ContainerError> {
//!         Ok(ItemService)
//!     }
//! }
//!
//! struct ItemsController {
//!     svc: Arc<ItemService>,
//! }
//! impl Injectable for ItemsController {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::of::<ItemService>()]
//!     }
//!     fn construct(deps: &mut Resolver<'_>) -> Result<Self, ContainerError> {
//!         Ok(Self { svc: deps.get()? })
//!     }
//! }
//!
//! #[async_trait]
//! impl Controller for ItemsController {
//!     async fn handle(&self, handler: &str, mut args: HandlerArgs) -> Result<Reply, HandlerError> {
//!         match handler {
//!             "find" => {
//!                 let id: String = args.take(0)?;
//!                 Reply::json(&serde_json::json!({ "id": id }))
//!             }
//!             other => Err(HandlerError::unknown_handler(other)),
//!         }
//!     }
//! }
//!
//! struct ItemsModule;
//!
//! let mut reg = MetadataRegistry::new();
//! reg.module::<ItemsModule>(
//!     ModuleDescriptor::new()
//!         .provider::<ItemService>()
//!         .controller::<ItemsController>(),
//! );
//! reg.controller::<ItemsController>("/items")
//!     .get("/:id", "find", |op| op.param(0, "id"));
//!
//! let app = Application::builder(reg).bootstrap::<ItemsModule>()?;
//! let router: axum::Router = app.into_router();
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

// Re-export inventory for declaration discovery
pub use inventory;

pub mod api;
pub mod container;
pub mod context;
pub mod contracts;
pub mod descriptor;
pub mod errors;
pub mod loader;
pub mod metadata;
pub mod router;
pub mod runtime;
pub mod token;

pub use api::{
    ApiDocs, BodyDoc, ControllerDecl, EnumValues, HandlerArgs, OpenApiGenerator, OperationDecl,
    OperationDoc, ParamDoc, ParamType, PropertyDoc, PropertyType, Reply, ResponseDoc, SchemaDecl,
};
pub use container::{ContainerError, DependencyContainer, Lifetime, ProviderSource, Resolver};
pub use context::AppContext;
pub use contracts::{Controller, Dependency, Injectable};
pub use descriptor::{
    ControllerDef, HttpMethod, ModuleDescriptor, ParamBinding, ParamSource, ProviderDef,
    RouteDescriptor,
};
pub use errors::{not_found_response, AppError, AppExceptionFilter, ErrorFilter, HandlerError};
pub use loader::{BootstrapError, ModuleLoader};
pub use metadata::{Declarator, MetadataKind, MetadataRegistry};
pub use router::{RouteEntry, RouteTable};
pub use runtime::{serve, serve_listener, Application, ApplicationBuilder, ShutdownOptions};
pub use token::Token;

pub use modwire_bootstrap::{OpenApiConfig, RouteOrdering, RouterConfig};
