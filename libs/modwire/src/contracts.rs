use async_trait::async_trait;
use std::any::type_name;

use crate::api::{HandlerArgs, Reply};
use crate::container::{ContainerError, Resolver};
use crate::errors::HandlerError;
use crate::token::Token;

/// One positional constructor parameter of a provider or controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// Resolved from the container; must be reachable from the declaring module.
    Token(Token),
    /// Plain value supplied by the constructor itself; ignored by validation.
    Primitive(&'static str),
}

impl Dependency {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Dependency::Token(Token::of::<T>())
    }

    pub fn primitive<T: ?Sized>() -> Self {
        Dependency::Primitive(type_name::<T>())
    }

    pub fn token(&self) -> Option<Token> {
        match self {
            Dependency::Token(t) => Some(*t),
            Dependency::Primitive(_) => None,
        }
    }
}

/// A type the container can build as a process-wide singleton.
///
/// `dependencies` lists constructor parameters in order so the module loader
/// can check reachability before anything is constructed; `construct` pulls
/// the same dependencies out of the [`Resolver`].
pub trait Injectable: Send + Sync + 'static {
    fn dependencies() -> Vec<Dependency>
    where
        Self: Sized,
    {
        Vec::new()
    }

    fn construct(deps: &mut Resolver<'_>) -> Result<Self, ContainerError>
    where
        Self: Sized;
}

/// An injectable that exposes named route handlers.
///
/// The router looks handlers up by the name given at route declaration time;
/// arguments arrive already extracted according to the handler's bindings.
#[async_trait]
pub trait Controller: Injectable {
    async fn handle(&self, handler: &str, args: HandlerArgs) -> Result<Reply, HandlerError>;
}
