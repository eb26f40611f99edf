//! Sample application modules. Declarations are submitted through
//! `inventory` and picked up by `MetadataRegistry::discover`.

pub mod app;
pub mod hash;
pub mod http;

pub use app::{AppModule, RuntimeInfo};
