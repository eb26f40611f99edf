//! Singleton dependency container.
//!
//! Tokens map to factories; the first `resolve` of a token runs its factory,
//! recursively resolving dependencies through a [`Resolver`], and caches the
//! result. Every later `resolve` returns the same `Arc`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use std::sync::Arc;
use thiserror::Error;

use crate::descriptor::{Factory, Instance, ProviderDef};
use crate::token::Token;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("'{token}' is already registered")]
    DuplicateRegistration { token: Token },

    #[error("'{token}' is not registered")]
    UnregisteredToken { token: Token },

    #[error("circular dependency detected: {}", format_path(path))]
    CircularDependency { path: Vec<Token> },

    #[error("failed to construct '{token}'")]
    Construction {
        token: Token,
        #[source]
        source: anyhow::Error,
    },

    #[error("'{token}' resolved to a value of a different type")]
    TypeMismatch { token: Token },
}

impl ContainerError {
    /// Wrap a constructor failure of `T`.
    pub fn construction<T: 'static>(source: impl Into<anyhow::Error>) -> Self {
        ContainerError::Construction {
            token: Token::of::<T>(),
            source: source.into(),
        }
    }
}

pub(crate) fn format_path(path: &[Token]) -> String {
    path.iter()
        .map(Token::name)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Every registration is a process-wide singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Singleton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSource {
    /// Built on first resolution by a factory.
    Class,
    /// Supplied already constructed.
    Instance,
}

struct Registration {
    lifetime: Lifetime,
    source: ProviderSource,
    factory: Option<Factory>,
}

/// Handed to factories; resolves dependencies on the current resolution chain
/// so cycles are reported instead of recursing forever.
pub struct Resolver<'a> {
    container: &'a DependencyContainer,
    chain: &'a mut Vec<Token>,
}

impl Resolver<'_> {
    pub fn get<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, ContainerError> {
        let token = Token::of::<T>();
        let instance = self.container.resolve_in(token, self.chain)?;
        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch { token })
    }

    /// Token currently being constructed.
    pub fn consumer(&self) -> Option<Token> {
        self.chain.last().copied()
    }
}

pub struct DependencyContainer {
    registrations: DashMap<Token, Registration>,
    instances: DashMap<Token, Instance>,
    // Held while a factory runs so concurrent first resolutions construct once.
    construction: ReentrantMutex<()>,
}

impl Default for DependencyContainer {
    fn default() -> Self {
        Self {
            registrations: DashMap::new(),
            instances: DashMap::new(),
            construction: ReentrantMutex::new(()),
        }
    }
}

impl std::fmt::Debug for DependencyContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyContainer")
            .field("registered", &self.registrations.len())
            .field("instantiated", &self.instances.len())
            .finish()
    }
}

impl DependencyContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a factory for `token`. Registering a class token again is a
    /// no-op; clashing with a supplied instance is an error.
    pub fn register_singleton(&self, token: Token, factory: Factory) -> Result<(), ContainerError> {
        match self.registrations.entry(token) {
            Entry::Occupied(existing) => {
                if existing.get().source == ProviderSource::Class {
                    tracing::trace!(token = %token, "already registered; keeping first registration");
                    Ok(())
                } else {
                    Err(ContainerError::DuplicateRegistration { token })
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Registration {
                    lifetime: Lifetime::Singleton,
                    source: ProviderSource::Class,
                    factory: Some(factory),
                });
                tracing::debug!(token = %token, "registered singleton");
                Ok(())
            }
        }
    }

    pub fn register_provider(&self, def: &ProviderDef) -> Result<(), ContainerError> {
        self.register_singleton(def.token(), def.factory())
    }

    /// Register an already constructed value under `T`'s token.
    pub fn register_instance<T: Send + Sync + 'static>(&self, value: Arc<T>) -> Result<(), ContainerError> {
        self.register_instance_dyn(Token::of::<T>(), value)
    }

    pub(crate) fn register_instance_dyn(&self, token: Token, value: Instance) -> Result<(), ContainerError> {
        match self.registrations.entry(token) {
            Entry::Occupied(_) => Err(ContainerError::DuplicateRegistration { token }),
            Entry::Vacant(slot) => {
                slot.insert(Registration {
                    lifetime: Lifetime::Singleton,
                    source: ProviderSource::Instance,
                    factory: None,
                });
                self.instances.insert(token, value);
                tracing::debug!(token = %token, "registered instance");
                Ok(())
            }
        }
    }

    pub fn is_registered(&self, token: Token) -> bool {
        self.registrations.contains_key(&token)
    }

    /// Whether the singleton for `token` has been built (or supplied).
    pub fn is_instantiated(&self, token: Token) -> bool {
        self.instances.contains_key(&token)
    }

    pub fn lifetime(&self, token: Token) -> Option<Lifetime> {
        self.registrations.get(&token).map(|r| r.lifetime)
    }

    pub fn source(&self, token: Token) -> Option<ProviderSource> {
        self.registrations.get(&token).map(|r| r.source)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn resolve(&self, token: Token) -> Result<Instance, ContainerError> {
        let mut chain = Vec::new();
        self.resolve_in(token, &mut chain)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let token = Token::of::<T>();
        self.resolve(token)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch { token })
    }

    fn cached(&self, token: Token) -> Option<Instance> {
        self.instances.get(&token).map(|r| r.value().clone())
    }

    fn resolve_in(&self, token: Token, chain: &mut Vec<Token>) -> Result<Instance, ContainerError> {
        if let Some(instance) = self.cached(token) {
            return Ok(instance);
        }

        let factory = self
            .registrations
            .get(&token)
            .and_then(|r| r.factory.clone())
            .ok_or(ContainerError::UnregisteredToken { token })?;

        if let Some(pos) = chain.iter().position(|t| *t == token) {
            let mut path = chain[pos..].to_vec();
            path.push(token);
            return Err(ContainerError::CircularDependency { path });
        }

        let _guard = self.construction.lock();
        // Another thread may have finished while we waited for the lock.
        if let Some(instance) = self.cached(token) {
            return Ok(instance);
        }

        chain.push(token);
        let built = {
            let mut resolver = Resolver {
                container: self,
                chain: &mut *chain,
            };
            factory(&mut resolver)
        };
        chain.pop();

        let instance = built?;
        self.instances.insert(token, instance.clone());
        tracing::debug!(token = %token, "constructed singleton");
        Ok(instance)
    }
}
