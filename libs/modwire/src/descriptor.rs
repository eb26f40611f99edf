//! Declaration-time data: module descriptors, provider/controller
//! definitions, routes and parameter bindings.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::container::{ContainerError, Resolver};
use crate::contracts::{Controller, Dependency, Injectable};
use crate::token::Token;

/// A constructed singleton as stored by the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Builds a singleton, pulling its dependencies from the resolver.
pub type Factory =
    Arc<dyn Fn(&mut Resolver<'_>) -> Result<Instance, ContainerError> + Send + Sync>;

/// A provider listed in a module: token, constructor dependencies and factory.
#[derive(Clone)]
pub struct ProviderDef {
    token: Token,
    dependencies: Vec<Dependency>,
    factory: Factory,
}

impl ProviderDef {
    pub fn of<T: Injectable>() -> Self {
        Self {
            token: Token::of::<T>(),
            dependencies: T::dependencies(),
            factory: Arc::new(|deps: &mut Resolver<'_>| {
                T::construct(deps).map(|v| Arc::new(v) as Instance)
            }),
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn factory(&self) -> Factory {
        self.factory.clone()
    }
}

impl fmt::Debug for ProviderDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDef")
            .field("token", &self.token)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

fn cast_controller<C: Controller>(instance: Instance) -> Option<Arc<dyn Controller>> {
    instance
        .downcast::<C>()
        .ok()
        .map(|c| c as Arc<dyn Controller>)
}

/// A controller listed in a module. Registered like a provider, plus a way to
/// view the stored instance as `dyn Controller`.
#[derive(Clone)]
pub struct ControllerDef {
    provider: ProviderDef,
    cast: fn(Instance) -> Option<Arc<dyn Controller>>,
}

impl ControllerDef {
    pub fn of<C: Controller>() -> Self {
        Self {
            provider: ProviderDef::of::<C>(),
            cast: cast_controller::<C>,
        }
    }

    pub fn token(&self) -> Token {
        self.provider.token
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.provider.dependencies
    }

    pub fn provider(&self) -> &ProviderDef {
        &self.provider
    }

    pub fn downcast(&self, instance: Instance) -> Option<Arc<dyn Controller>> {
        (self.cast)(instance)
    }
}

impl fmt::Debug for ControllerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDef")
            .field("token", &self.provider.token)
            .field("dependencies", &self.provider.dependencies)
            .finish()
    }
}

/// `{ imports, providers, controllers, exports }` attached to a module type.
#[derive(Debug, Clone, Default)]
pub struct ModuleDescriptor {
    pub imports: Vec<Token>,
    pub providers: Vec<ProviderDef>,
    pub controllers: Vec<ControllerDef>,
    pub exports: Vec<Token>,
}

impl ModuleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import<M: 'static>(mut self) -> Self {
        self.imports.push(Token::of::<M>());
        self
    }

    pub fn provider<T: Injectable>(mut self) -> Self {
        self.providers.push(ProviderDef::of::<T>());
        self
    }

    pub fn controller<C: Controller>(mut self) -> Self {
        self.controllers.push(ControllerDef::of::<C>());
        self
    }

    pub fn export<T: 'static>(mut self) -> Self {
        self.exports.push(Token::of::<T>());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// `None` for methods routes cannot be declared with.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::GET => Some(HttpMethod::Get),
            http::Method::POST => Some(HttpMethod::Post),
            http::Method::PUT => Some(HttpMethod::Put),
            http::Method::PATCH => Some(HttpMethod::Patch),
            http::Method::DELETE => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
        }
    }
}

/// `(method, path, handler)` as declared on a controller, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub method: HttpMethod,
    pub path: String,
    pub handler: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Path,
    Query,
    Body,
    Header,
}

/// Where handler argument `index` comes from. Without a key the whole
/// collection (all path params, all query pairs, all headers, whole body) is
/// passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub index: usize,
    pub source: ParamSource,
    pub key: Option<String>,
}
