//! Declaration surface: typed builders that write module, controller, route,
//! binding, OpenAPI and DTO-schema metadata into a [`MetadataRegistry`].
//!
//! ```ignore
//! reg.module::<UsersModule>(
//!     ModuleDescriptor::new()
//!         .provider::<UserService>()
//!         .controller::<UsersController>()
//!         .export::<UserService>(),
//! );
//!
//! reg.controller::<UsersController>("/users")
//!     .tags(["Users"])
//!     .get("/:id", "find", |op| {
//!         op.param(0, "id")
//!             .summary("Get user by id")
//!             .response_of::<UserDto>(200, "User found")
//!             .response(404, "User not found")
//!     })
//!     .post("/", "create", |op| op.body(0).request_body_of::<CreateUserDto>());
//!
//! reg.schema::<UserDto>()
//!     .property("id", |p| p.integer().example(1))
//!     .property("email", |p| p.format("email"));
//! ```

use std::marker::PhantomData;

use crate::api::docs::{BodyDoc, OperationDoc, ParamDoc, PropertyDoc, ResponseDoc};
use crate::contracts::Controller;
use crate::descriptor::{HttpMethod, ModuleDescriptor, ParamBinding, ParamSource, RouteDescriptor};
use crate::metadata::kinds::{
    ApiBody, ApiOperation, ApiParams, ApiQueries, ApiResponses, ApiTags, ControllerPrefix,
    ModuleMeta, Params, Routes, SchemaProperties,
};
use crate::metadata::MetadataRegistry;
use crate::token::Token;

impl MetadataRegistry {
    /// Attach a module descriptor to `M`.
    pub fn module<M: 'static>(&mut self, descriptor: ModuleDescriptor) -> &mut Self {
        self.define::<ModuleMeta>(Token::of::<M>(), None, Some(descriptor));
        self
    }

    /// Mark `C` as a controller mounted under `prefix` and start declaring its routes.
    pub fn controller<C: Controller>(&mut self, prefix: impl Into<String>) -> ControllerDecl<'_, C> {
        self.define::<ControllerPrefix>(Token::of::<C>(), None, Some(prefix.into()));
        ControllerDecl {
            registry: self,
            _controller: PhantomData,
        }
    }

    /// Start declaring the fields of DTO `D`.
    pub fn schema<D: 'static>(&mut self) -> SchemaDecl<'_, D> {
        SchemaDecl {
            registry: self,
            _dto: PhantomData,
        }
    }

    /// Apply a tag and per-handler documentation to `C` in one call.
    pub fn api_docs<C: 'static>(&mut self, docs: ApiDocs) -> &mut Self {
        let token = Token::of::<C>();
        if let Some(tag) = docs.tag {
            self.define::<ApiTags>(token, None, vec![tag]);
        }
        for (handler, op) in docs.endpoints {
            op.apply_docs(self, token, &handler);
        }
        self
    }
}

pub struct ControllerDecl<'r, C> {
    registry: &'r mut MetadataRegistry,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Controller> ControllerDecl<'_, C> {
    pub fn tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        self.registry.define::<ApiTags>(Token::of::<C>(), None, tags);
        self
    }

    /// Append a route bound to `handler`; `configure` adds bindings and docs.
    pub fn route(
        self,
        method: HttpMethod,
        path: impl Into<String>,
        handler: impl Into<String>,
        configure: impl FnOnce(OperationDecl) -> OperationDecl,
    ) -> Self {
        let token = Token::of::<C>();
        let handler = handler.into();
        let route = RouteDescriptor {
            method,
            path: path.into(),
            handler: handler.clone(),
        };
        self.registry.define::<Routes>(token, None, vec![route]);

        let op = configure(OperationDecl::default());
        self.registry
            .define::<Params>(token, Some(&handler), op.bindings.clone());
        op.apply_docs(self.registry, token, &handler);
        self
    }

    pub fn get(
        self,
        path: impl Into<String>,
        handler: impl Into<String>,
        configure: impl FnOnce(OperationDecl) -> OperationDecl,
    ) -> Self {
        self.route(HttpMethod::Get, path, handler, configure)
    }

    pub fn post(
        self,
        path: impl Into<String>,
        handler: impl Into<String>,
        configure: impl FnOnce(OperationDecl) -> OperationDecl,
    ) -> Self {
        self.route(HttpMethod::Post, path, handler, configure)
    }

    pub fn put(
        self,
        path: impl Into<String>,
        handler: impl Into<String>,
        configure: impl FnOnce(OperationDecl) -> OperationDecl,
    ) -> Self {
        self.route(HttpMethod::Put, path, handler, configure)
    }

    pub fn patch(
        self,
        path: impl Into<String>,
        handler: impl Into<String>,
        configure: impl FnOnce(OperationDecl) -> OperationDecl,
    ) -> Self {
        self.route(HttpMethod::Patch, path, handler, configure)
    }

    pub fn delete(
        self,
        path: impl Into<String>,
        handler: impl Into<String>,
        configure: impl FnOnce(OperationDecl) -> OperationDecl,
    ) -> Self {
        self.route(HttpMethod::Delete, path, handler, configure)
    }
}

/// Bindings and documentation of one handler.
#[derive(Debug, Clone, Default)]
pub struct OperationDecl {
    bindings: Vec<ParamBinding>,
    doc: Option<OperationDoc>,
    tags: Vec<String>,
    params: Vec<ParamDoc>,
    queries: Vec<ParamDoc>,
    body: Option<BodyDoc>,
    responses: Vec<ResponseDoc>,
}

impl OperationDecl {
    fn bind(mut self, index: usize, source: ParamSource, key: Option<&str>) -> Self {
        self.bindings.push(ParamBinding {
            index,
            source,
            key: key.map(str::to_owned),
        });
        self
    }

    /// Argument `index` <- path parameter `key`.
    pub fn param(self, index: usize, key: &str) -> Self {
        self.bind(index, ParamSource::Path, Some(key))
    }

    /// Argument `index` <- all path parameters as an object.
    pub fn params(self, index: usize) -> Self {
        self.bind(index, ParamSource::Path, None)
    }

    pub fn query(self, index: usize, key: &str) -> Self {
        self.bind(index, ParamSource::Query, Some(key))
    }

    pub fn queries(self, index: usize) -> Self {
        self.bind(index, ParamSource::Query, None)
    }

    /// Argument `index` <- the whole request body.
    pub fn body(self, index: usize) -> Self {
        self.bind(index, ParamSource::Body, None)
    }

    /// Argument `index` <- one top-level field of the request body.
    pub fn body_field(self, index: usize, key: &str) -> Self {
        self.bind(index, ParamSource::Body, Some(key))
    }

    pub fn header(self, index: usize, key: &str) -> Self {
        self.bind(index, ParamSource::Header, Some(key))
    }

    pub fn headers(self, index: usize) -> Self {
        self.bind(index, ParamSource::Header, None)
    }

    fn doc_mut(&mut self) -> &mut OperationDoc {
        self.doc.get_or_insert_with(OperationDoc::default)
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.doc_mut().summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.doc_mut().description = Some(description.into());
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.doc_mut().operation_id = Some(id.into());
        self
    }

    /// Tag for this operation only; overrides the controller's tags.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn api_param(mut self, param: ParamDoc) -> Self {
        self.params.push(param);
        self
    }

    pub fn path_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.api_param(ParamDoc::new(name).description(description))
    }

    pub fn api_query(mut self, query: ParamDoc) -> Self {
        self.queries.push(query);
        self
    }

    pub fn query_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.api_query(ParamDoc::new(name).description(description))
    }

    pub fn api_body(mut self, body: BodyDoc) -> Self {
        self.body = Some(body);
        self
    }

    /// Request body documented as a `$ref` to `D`.
    pub fn request_body_of<D: 'static>(self) -> Self {
        self.api_body(BodyDoc {
            schema: Some(Token::of::<D>()),
            ..BodyDoc::default()
        })
    }

    /// Request body documented as an untyped object.
    pub fn open_request_body(self) -> Self {
        self.api_body(BodyDoc::default())
    }

    pub fn api_response(mut self, response: ResponseDoc) -> Self {
        self.responses.push(response);
        self
    }

    /// Response without content.
    pub fn response(self, status: u16, description: impl Into<String>) -> Self {
        self.api_response(ResponseDoc::new(status, description))
    }

    pub fn response_of<D: 'static>(self, status: u16, description: impl Into<String>) -> Self {
        self.api_response(ResponseDoc::new(status, description).of::<D>())
    }

    pub fn response_list_of<D: 'static>(self, status: u16, description: impl Into<String>) -> Self {
        self.api_response(ResponseDoc::new(status, description).list_of::<D>())
    }

    fn apply_docs(self, registry: &mut MetadataRegistry, token: Token, handler: &str) {
        let member = Some(handler);
        if let Some(doc) = self.doc {
            registry.define::<ApiOperation>(token, member, Some(doc));
        }
        if !self.tags.is_empty() {
            registry.define::<ApiTags>(token, member, self.tags);
        }
        if !self.params.is_empty() {
            registry.define::<ApiParams>(token, member, self.params);
        }
        if !self.queries.is_empty() {
            registry.define::<ApiQueries>(token, member, self.queries);
        }
        if let Some(body) = self.body {
            registry.define::<ApiBody>(token, member, Some(body));
        }
        if !self.responses.is_empty() {
            registry.define::<ApiResponses>(token, member, self.responses);
        }
    }
}

/// Tag plus per-handler documentation for a controller, applied in bulk by
/// [`MetadataRegistry::api_docs`]. Only documentation is applied; bindings set
/// here are ignored.
#[derive(Debug, Clone, Default)]
pub struct ApiDocs {
    tag: Option<String>,
    endpoints: Vec<(String, OperationDecl)>,
}

impl ApiDocs {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            endpoints: Vec::new(),
        }
    }

    pub fn untagged() -> Self {
        Self::default()
    }

    pub fn endpoint(
        mut self,
        handler: impl Into<String>,
        configure: impl FnOnce(OperationDecl) -> OperationDecl,
    ) -> Self {
        self.endpoints
            .push((handler.into(), configure(OperationDecl::default())));
        self
    }
}

pub struct SchemaDecl<'r, D> {
    registry: &'r mut MetadataRegistry,
    _dto: PhantomData<fn() -> D>,
}

impl<D: 'static> SchemaDecl<'_, D> {
    /// Append a field; `configure` starts from a required string property.
    pub fn property(
        self,
        name: impl Into<String>,
        configure: impl FnOnce(PropertyDoc) -> PropertyDoc,
    ) -> Self {
        let property = configure(PropertyDoc::new(name));
        self.registry
            .define::<SchemaProperties>(Token::of::<D>(), None, vec![property]);
        self
    }
}
