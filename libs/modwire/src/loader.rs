//! Module graph traversal.
//!
//! `ModuleLoader::load` walks a module's imports depth-first, registers
//! providers and controllers into the container, checks that every
//! constructor dependency is reachable from the declaring module, and returns
//! the module's exports to its importer.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::container::{format_path, ContainerError, DependencyContainer};
use crate::context::AppContext;
use crate::contracts::Dependency;
use crate::descriptor::{ControllerDef, HttpMethod, Instance, ModuleDescriptor};
use crate::metadata::{kinds::ModuleMeta, MetadataRegistry};
use crate::token::Token;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{module} is not a valid module")]
    NotAModule { module: Token },

    #[error(
        "{consumer} has unresolved dependency at index {index}. Make sure {missing} is available in {consumer}'s module or imported from another module."
    )]
    DependencyResolution {
        consumer: Token,
        index: usize,
        missing: Token,
    },

    #[error("Cannot export {export} from {module} because it's not a provider of this module")]
    ExportViolation { module: Token, export: Token },

    #[error("'{token}' is already registered")]
    DuplicateRegistration { token: Token },

    #[error("cyclic module import detected: {}", format_path(path))]
    ModuleCycle { path: Vec<Token> },

    #[error("route {method} {path} is declared by both {first} and {second}")]
    DuplicateRoute {
        method: HttpMethod,
        path: String,
        first: Token,
        second: Token,
    },

    #[error("docs path {path} collides with the route listing")]
    ReservedPath { path: String },

    #[error(transparent)]
    Container(ContainerError),
}

impl From<ContainerError> for BootstrapError {
    fn from(e: ContainerError) -> Self {
        match e {
            ContainerError::DuplicateRegistration { token } => {
                BootstrapError::DuplicateRegistration { token }
            }
            other => BootstrapError::Container(other),
        }
    }
}

pub struct ModuleLoader {
    registry: Arc<MetadataRegistry>,
    container: Arc<DependencyContainer>,
    /// Tokens supplied from outside the module graph; visible to every module.
    external: HashSet<Token>,
    controllers: Vec<ControllerDef>,
    seen_controllers: HashSet<Token>,
    /// Modules on the current traversal path.
    in_progress: Vec<Token>,
}

impl ModuleLoader {
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self {
            registry,
            container: Arc::new(DependencyContainer::new()),
            external: HashSet::new(),
            controllers: Vec::new(),
            seen_controllers: HashSet::new(),
            in_progress: Vec::new(),
        }
    }

    /// Register an already constructed value (e.g. a persistence handle)
    /// before traversal. It satisfies dependencies in every module.
    pub fn with_instance<T: Send + Sync + 'static>(self, value: Arc<T>) -> Result<Self, BootstrapError> {
        self.with_instance_dyn(Token::of::<T>(), value)
    }

    pub(crate) fn with_instance_dyn(mut self, token: Token, value: Instance) -> Result<Self, BootstrapError> {
        self.container.register_instance_dyn(token, value)?;
        self.external.insert(token);
        tracing::info!(token = %token, "registered external instance");
        Ok(self)
    }

    pub fn container(&self) -> &Arc<DependencyContainer> {
        &self.container
    }

    pub fn controllers(&self) -> &[ControllerDef] {
        &self.controllers
    }

    /// Load `module` and everything it imports; returns its exports.
    pub fn load(&mut self, module: Token) -> Result<HashSet<Token>, BootstrapError> {
        if let Some(pos) = self.in_progress.iter().position(|t| *t == module) {
            let mut path = self.in_progress[pos..].to_vec();
            path.push(module);
            return Err(BootstrapError::ModuleCycle { path });
        }

        let descriptor = self
            .registry
            .get::<ModuleMeta>(module, None)
            .ok_or(BootstrapError::NotAModule { module })?;

        self.in_progress.push(module);
        let result = self.load_descriptor(module, &descriptor);
        self.in_progress.pop();
        result
    }

    fn load_descriptor(
        &mut self,
        module: Token,
        descriptor: &ModuleDescriptor,
    ) -> Result<HashSet<Token>, BootstrapError> {
        let mut available = HashSet::new();
        for import in &descriptor.imports {
            available.extend(self.load(*import)?);
        }

        let mut own = HashSet::new();
        for provider in &descriptor.providers {
            self.container.register_provider(provider)?;
            own.insert(provider.token());
        }

        for provider in &descriptor.providers {
            self.validate(provider.token(), provider.dependencies(), &own, &available)?;
        }

        for controller in &descriptor.controllers {
            self.validate(controller.token(), controller.dependencies(), &own, &available)?;
            self.container.register_provider(controller.provider())?;
            if self.seen_controllers.insert(controller.token()) {
                self.controllers.push(controller.clone());
            }
        }

        let mut exports = HashSet::new();
        for export in &descriptor.exports {
            if !own.contains(export) {
                return Err(BootstrapError::ExportViolation {
                    module,
                    export: *export,
                });
            }
            exports.insert(*export);
        }

        tracing::debug!(
            module = %module,
            providers = descriptor.providers.len(),
            controllers = descriptor.controllers.len(),
            exports = exports.len(),
            "module loaded"
        );
        Ok(exports)
    }

    fn validate(
        &self,
        consumer: Token,
        dependencies: &[Dependency],
        own: &HashSet<Token>,
        available: &HashSet<Token>,
    ) -> Result<(), BootstrapError> {
        for (index, dependency) in dependencies.iter().enumerate() {
            let Some(token) = dependency.token() else {
                continue;
            };
            if own.contains(&token) || available.contains(&token) || self.external.contains(&token) {
                continue;
            }
            return Err(BootstrapError::DependencyResolution {
                consumer,
                index,
                missing: token,
            });
        }
        Ok(())
    }

    /// Instantiate every loaded controller (and so its provider graph) and
    /// hand over the result.
    pub fn finish(self) -> Result<AppContext, BootstrapError> {
        for controller in &self.controllers {
            self.container.resolve(controller.token())?;
        }
        tracing::info!(
            controllers = self.controllers.len(),
            registered = self.container.len(),
            "modules loaded"
        );
        Ok(AppContext::new(self.registry, self.container, self.controllers))
    }
}
