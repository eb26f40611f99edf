//! OpenAPI document synthesis from controller, route and DTO metadata.

use std::collections::{BTreeMap, HashSet};

use modwire_bootstrap::OpenApiConfig;
use utoipa::openapi::{
    content::ContentBuilder,
    info::InfoBuilder,
    path::{
        HttpMethod as UHttpMethod, OperationBuilder as UOperationBuilder, ParameterBuilder,
        ParameterIn, PathItemBuilder, PathsBuilder,
    },
    request_body::RequestBodyBuilder,
    response::{ResponseBuilder, ResponsesBuilder},
    schema::{Array, ComponentsBuilder, ObjectBuilder, Schema, SchemaFormat, SchemaType, Type},
    server::ServerBuilder,
    OpenApi, OpenApiBuilder, Ref, RefOr, Required,
};

use crate::api::docs::{ParamDoc, ParamType, PropertyDoc, PropertyType};
use crate::context::AppContext;
use crate::descriptor::{ControllerDef, HttpMethod, RouteDescriptor};
use crate::metadata::kinds::{
    ApiBody, ApiOperation, ApiParams, ApiQueries, ApiResponses, ApiTags, ControllerPrefix, Routes,
    SchemaProperties,
};
use crate::metadata::MetadataRegistry;
use crate::router::{build_full_path, normalize_path, path_param_names, template_path};
use crate::token::Token;

const JSON: &str = "application/json";

/// Name of the built-in error envelope schema.
pub const ERROR_RESPONSE_SCHEMA: &str = "ErrorResponse";

fn object(builder: ObjectBuilder) -> RefOr<Schema> {
    RefOr::T(Schema::Object(builder.build()))
}

fn typed(ty: Type) -> ObjectBuilder {
    ObjectBuilder::new().schema_type(SchemaType::Type(ty))
}

fn reference(token: Token) -> RefOr<Schema> {
    RefOr::Ref(Ref::from_schema_name(token.name()))
}

fn param_type(ty: ParamType) -> Type {
    match ty {
        ParamType::String => Type::String,
        ParamType::Number => Type::Number,
        ParamType::Integer => Type::Integer,
        ParamType::Boolean => Type::Boolean,
    }
}

/// `UsersController` -> `Users`.
fn default_tag(controller: Token) -> String {
    match controller.name().strip_suffix("Controller") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => controller.name().to_string(),
    }
}

pub struct OpenApiGenerator {
    config: OpenApiConfig,
}

impl OpenApiGenerator {
    pub fn new(config: &OpenApiConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn generate(&self, ctx: &AppContext) -> OpenApi {
        let registry = ctx.registry();
        let mut items: BTreeMap<String, PathItemBuilder> = BTreeMap::new();
        let mut dtos = DtoSet::default();
        let mut operations = 0usize;

        for controller in ctx.controllers() {
            let token = controller.token();
            let prefix = normalize_path(
                registry
                    .get::<ControllerPrefix>(token, None)
                    .as_deref()
                    .unwrap_or(""),
            );
            for route in registry.get::<Routes>(token, None) {
                let full = build_full_path(&prefix, &normalize_path(&route.path));
                let op = self.operation(registry, controller, &route, &full, &mut dtos);
                let item = items.remove(&template_path(&full)).unwrap_or_default();
                items.insert(template_path(&full), item.operation(method(route.method), op));
                operations += 1;
            }
        }

        let mut paths = PathsBuilder::new();
        for (path, item) in items {
            paths = paths.path(path, item.build());
        }

        let mut components = ComponentsBuilder::new().schema(ERROR_RESPONSE_SCHEMA, error_response());
        for dto in dtos.resolve(registry) {
            components = components.schema(dto.name(), dto_schema(registry, dto));
        }

        let info = InfoBuilder::new()
            .title(&self.config.title)
            .version(&self.config.version)
            .description(Some(&self.config.description))
            .build();

        let mut doc = OpenApiBuilder::new()
            .info(info)
            .paths(paths.build())
            .components(Some(components.build()));
        if let Some(url) = &self.config.server_url {
            let server = ServerBuilder::new()
                .url(url)
                .description(Some(&self.config.server_description))
                .build();
            doc = doc.servers(Some(vec![server]));
        }

        tracing::info!(operations, "OpenAPI document generated");
        doc.build()
    }

    fn operation(
        &self,
        registry: &MetadataRegistry,
        controller: &ControllerDef,
        route: &RouteDescriptor,
        full_path: &str,
        dtos: &mut DtoSet,
    ) -> utoipa::openapi::path::Operation {
        let token = controller.token();
        let member = Some(route.handler.as_str());
        let doc = registry.get::<ApiOperation>(token, member).unwrap_or_default();

        let mut op = UOperationBuilder::new()
            .operation_id(doc.operation_id.or_else(|| Some(route.handler.clone())))
            .summary(doc.summary.or_else(|| Some(route.handler.clone())))
            .description(doc.description);

        let mut tags = registry.get::<ApiTags>(token, member);
        if tags.is_empty() {
            tags = registry.get::<ApiTags>(token, None);
        }
        if tags.is_empty() {
            tags.push(default_tag(token));
        }
        for tag in tags {
            op = op.tag(tag);
        }

        // Path parameters: declared ones first, then any template segment
        // nobody documented.
        let mut declared = registry.get::<ApiParams>(token, member);
        for name in path_param_names(full_path) {
            if !declared.iter().any(|p| p.name == name) {
                declared.push(ParamDoc::new(name));
            }
        }
        for p in &declared {
            op = op.parameter(parameter(p, ParameterIn::Path, true));
        }
        for q in &registry.get::<ApiQueries>(token, member) {
            op = op.parameter(parameter(q, ParameterIn::Query, false));
        }

        if let Some(body) = registry.get::<ApiBody>(token, member) {
            let schema = match body.schema {
                Some(dto) => {
                    dtos.insert(dto);
                    reference(dto)
                }
                None => object(typed(Type::Object)),
            };
            let required = if body.required.unwrap_or(true) {
                Required::True
            } else {
                Required::False
            };
            let rb = RequestBodyBuilder::new()
                .description(body.description)
                .content(JSON, ContentBuilder::new().schema(Some(schema)).build())
                .required(Some(required))
                .build();
            op = op.request_body(Some(rb));
        }

        let mut responses = ResponsesBuilder::new();
        let declared = registry.get::<ApiResponses>(token, member);
        if declared.is_empty() {
            let content = ContentBuilder::new()
                .schema(Some(object(typed(Type::Object))))
                .build();
            responses = responses.response(
                "200",
                ResponseBuilder::new()
                    .description("Success")
                    .content(JSON, content)
                    .build(),
            );
        }
        for r in declared {
            let mut resp = ResponseBuilder::new().description(&r.description);
            if let Some(dto) = r.schema {
                dtos.insert(dto);
                let schema = if r.is_array {
                    RefOr::T(Schema::Array(Array::new(reference(dto))))
                } else {
                    reference(dto)
                };
                resp = resp.content(JSON, ContentBuilder::new().schema(Some(schema)).build());
            }
            responses = responses.response(r.status.to_string(), resp.build());
        }
        op = op.responses(responses.build());

        op.build()
    }
}

fn method(m: HttpMethod) -> UHttpMethod {
    match m {
        HttpMethod::Get => UHttpMethod::Get,
        HttpMethod::Post => UHttpMethod::Post,
        HttpMethod::Put => UHttpMethod::Put,
        HttpMethod::Patch => UHttpMethod::Patch,
        HttpMethod::Delete => UHttpMethod::Delete,
    }
}

fn parameter(
    p: &ParamDoc,
    location: ParameterIn,
    required_by_default: bool,
) -> utoipa::openapi::path::Parameter {
    let required = if p.required.unwrap_or(required_by_default) {
        Required::True
    } else {
        Required::False
    };
    ParameterBuilder::new()
        .name(&p.name)
        .parameter_in(location)
        .required(required)
        .description(p.description.clone())
        .schema(Some(object(typed(param_type(p.ty)))))
        .build()
}

/// DTO tokens in first-seen order, deduplicated by identity.
#[derive(Default)]
struct DtoSet {
    order: Vec<Token>,
    seen: HashSet<Token>,
}

impl DtoSet {
    fn insert(&mut self, token: Token) {
        if self.seen.insert(token) {
            self.order.push(token);
        }
    }

    /// Close the set over `$ref` properties of its members.
    fn resolve(mut self, registry: &MetadataRegistry) -> Vec<Token> {
        let mut i = 0;
        while i < self.order.len() {
            let current = self.order[i];
            for prop in registry.get::<SchemaProperties>(current, None) {
                if let PropertyType::Ref(nested) = prop.ty {
                    self.insert(nested);
                }
            }
            i += 1;
        }
        self.order
    }
}

fn dto_schema(registry: &MetadataRegistry, dto: Token) -> RefOr<Schema> {
    let mut builder = typed(Type::Object);
    for prop in registry.get::<SchemaProperties>(dto, None) {
        if prop.required {
            builder = builder.required(&prop.name);
        }
        builder = builder.property(&prop.name, property_schema(&prop));
    }
    object(builder)
}

fn property_schema(p: &PropertyDoc) -> RefOr<Schema> {
    let item = match p.ty {
        PropertyType::Ref(nested) => reference(nested),
        ty => {
            let ty = match ty {
                PropertyType::String => Type::String,
                PropertyType::Number => Type::Number,
                PropertyType::Integer => Type::Integer,
                PropertyType::Boolean => Type::Boolean,
                PropertyType::Object | PropertyType::Ref(_) => Type::Object,
            };
            object(
                typed(ty)
                    .format(p.format.clone().map(SchemaFormat::Custom))
                    .description(p.description.clone())
                    .examples(p.example.clone())
                    .enum_values(p.enum_values.as_ref().map(|e| e.values()))
                    .minimum(p.minimum)
                    .maximum(p.maximum)
                    .min_length(p.min_length)
                    .max_length(p.max_length)
                    .pattern(p.pattern.clone())
                    .default(p.default.clone()),
            )
        }
    };
    if p.is_array {
        RefOr::T(Schema::Array(Array::new(item)))
    } else {
        item
    }
}

/// `{ code, error: { title, message }, data }`.
fn error_response() -> RefOr<Schema> {
    let error = typed(Type::Object)
        .property("title", object(typed(Type::String).examples(["Bad Request"])))
        .property("message", object(typed(Type::String).examples(["Validation failed"])))
        .required("title")
        .required("message");
    object(
        typed(Type::Object)
            .property("code", object(typed(Type::Number).examples([400])))
            .property("error", object(error))
            .property(
                "data",
                object(
                    ObjectBuilder::new()
                        .schema_type(SchemaType::AnyValue)
                        .description(Some("Additional error details")),
                ),
            )
            .required("code")
            .required("error"),
    )
}
