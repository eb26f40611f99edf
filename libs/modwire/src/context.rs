use std::sync::Arc;

use crate::container::{ContainerError, DependencyContainer};
use crate::contracts::Controller;
use crate::descriptor::ControllerDef;
use crate::metadata::MetadataRegistry;

/// Everything produced by module loading: the read-only metadata, the
/// populated container and the ordered controller list. Built once at
/// startup and shared by the router and the OpenAPI generator.
#[derive(Debug)]
pub struct AppContext {
    registry: Arc<MetadataRegistry>,
    container: Arc<DependencyContainer>,
    controllers: Vec<ControllerDef>,
}

impl AppContext {
    pub(crate) fn new(
        registry: Arc<MetadataRegistry>,
        container: Arc<DependencyContainer>,
        controllers: Vec<ControllerDef>,
    ) -> Self {
        Self {
            registry,
            container,
            controllers,
        }
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn container(&self) -> &Arc<DependencyContainer> {
        &self.container
    }

    /// Controllers in module-load order, each listed once.
    pub fn controllers(&self) -> &[ControllerDef] {
        &self.controllers
    }

    pub fn controller(&self, def: &ControllerDef) -> Result<Arc<dyn Controller>, ContainerError> {
        let instance = self.container.resolve(def.token())?;
        def.downcast(instance)
            .ok_or(ContainerError::TypeMismatch { token: def.token() })
    }
}
