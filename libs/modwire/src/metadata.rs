//! Typed metadata store keyed by `(kind, declaration, member)`.
//!
//! Declarations write into a [`MetadataRegistry`] once, before bootstrap; the
//! module loader, router and OpenAPI generator only read from it afterwards.
//! Each kind is a marker type implementing [`MetadataKind`], which fixes the
//! value type and whether repeated writes overwrite or append.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::token::Token;

/// A metadata kind: its value type and how a new write combines with the
/// stored value.
pub trait MetadataKind: 'static {
    type Value: Clone + Default + Send + Sync + 'static;

    /// Default is overwrite; accumulating kinds append.
    fn merge(slot: &mut Self::Value, value: Self::Value) {
        *slot = value;
    }
}

/// The function type submitted via `inventory::submit!` to contribute
/// declarations to [`MetadataRegistry::discover`].
pub struct Declarator(pub fn(&mut MetadataRegistry));

inventory::collect!(Declarator);

type Key = (TypeId, Token, Option<String>);

#[derive(Default)]
pub struct MetadataRegistry {
    entries: HashMap<Key, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every declarator linked into the binary.
    pub fn discover() -> Self {
        let mut registry = Self::new();
        let mut count = 0usize;
        for declarator in inventory::iter::<Declarator> {
            (declarator.0)(&mut registry);
            count += 1;
        }
        tracing::debug!(declarators = count, entries = registry.len(), "metadata discovered");
        registry
    }

    pub fn define<K: MetadataKind>(&mut self, target: Token, member: Option<&str>, value: K::Value) {
        let key = (TypeId::of::<K>(), target, member.map(str::to_owned));
        let slot = self
            .entries
            .entry(key)
            .or_insert_with(|| Box::new(K::Value::default()));
        if let Some(slot) = slot.downcast_mut::<K::Value>() {
            K::merge(slot, value);
        }
    }

    /// Stored value, or the kind's empty default when nothing was defined.
    pub fn get<K: MetadataKind>(&self, target: Token, member: Option<&str>) -> K::Value {
        let key = (TypeId::of::<K>(), target, member.map(str::to_owned));
        self.entries
            .get(&key)
            .and_then(|v| v.downcast_ref::<K::Value>())
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains<K: MetadataKind>(&self, target: Token, member: Option<&str>) -> bool {
        let key = (TypeId::of::<K>(), target, member.map(str::to_owned));
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built-in metadata kinds.
pub mod kinds {
    use super::MetadataKind;
    use crate::api::docs::{BodyDoc, OperationDoc, ParamDoc, PropertyDoc, ResponseDoc};
    use crate::descriptor::{ModuleDescriptor, ParamBinding, RouteDescriptor};

    macro_rules! overwrite_kind {
        ($(#[$meta:meta])* $name:ident => $value:ty) => {
            $(#[$meta])*
            pub struct $name;
            impl MetadataKind for $name {
                type Value = $value;
            }
        };
    }

    macro_rules! accumulating_kind {
        ($(#[$meta:meta])* $name:ident => $item:ty) => {
            $(#[$meta])*
            pub struct $name;
            impl MetadataKind for $name {
                type Value = Vec<$item>;
                fn merge(slot: &mut Self::Value, value: Self::Value) {
                    slot.extend(value);
                }
            }
        };
    }

    overwrite_kind!(
        /// Module descriptor of a module type.
        ModuleMeta => Option<ModuleDescriptor>
    );
    overwrite_kind!(
        /// Path prefix of a controller type.
        ControllerPrefix => Option<String>
    );
    overwrite_kind!(ApiTags => Vec<String>);
    overwrite_kind!(ApiOperation => Option<OperationDoc>);
    overwrite_kind!(ApiBody => Option<BodyDoc>);

    accumulating_kind!(
        /// Routes of a controller, in declaration order.
        Routes => RouteDescriptor
    );
    accumulating_kind!(
        /// Argument bindings of one handler (member = handler name).
        Params => ParamBinding
    );
    accumulating_kind!(ApiParams => ParamDoc);
    accumulating_kind!(ApiQueries => ParamDoc);
    accumulating_kind!(ApiResponses => ResponseDoc);
    accumulating_kind!(
        /// Fields of a DTO schema, in declaration order.
        SchemaProperties => PropertyDoc
    );
}

#[cfg(test)]
mod tests {
    use super::kinds::*;
    use super::*;
    use crate::descriptor::{HttpMethod, RouteDescriptor};

    struct UsersController;
    struct Other;

    fn route(path: &str, handler: &str) -> RouteDescriptor {
        RouteDescriptor {
            method: HttpMethod::Get,
            path: path.to_string(),
            handler: handler.to_string(),
        }
    }

    #[test]
    fn missing_value_yields_default() {
        let reg = MetadataRegistry::new();
        let t = Token::of::<UsersController>();
        assert!(reg.get::<ControllerPrefix>(t, None).is_none());
        assert!(reg.get::<Routes>(t, None).is_empty());
        assert!(!reg.contains::<Routes>(t, None));
    }

    #[test]
    fn overwrite_kind_replaces_value() {
        let mut reg = MetadataRegistry::new();
        let t = Token::of::<UsersController>();
        reg.define::<ControllerPrefix>(t, None, Some("/a".into()));
        reg.define::<ControllerPrefix>(t, None, Some("/b".into()));
        assert_eq!(reg.get::<ControllerPrefix>(t, None).as_deref(), Some("/b"));
    }

    #[test]
    fn accumulating_kind_appends_in_order() {
        let mut reg = MetadataRegistry::new();
        let t = Token::of::<UsersController>();
        reg.define::<Routes>(t, None, vec![route("/", "list")]);
        reg.define::<Routes>(t, None, vec![route("/:id", "find")]);

        let routes = reg.get::<Routes>(t, None);
        let handlers: Vec<_> = routes.iter().map(|r| r.handler.as_str()).collect();
        assert_eq!(handlers, vec!["list", "find"]);
    }

    #[test]
    fn entries_are_isolated_by_declaration_member_and_kind() {
        let mut reg = MetadataRegistry::new();
        let users = Token::of::<UsersController>();
        let other = Token::of::<Other>();

        reg.define::<ApiTags>(users, None, vec!["Users".into()]);
        reg.define::<ApiTags>(users, Some("find"), vec!["Lookup".into()]);

        assert_eq!(reg.get::<ApiTags>(users, None), vec!["Users".to_string()]);
        assert_eq!(reg.get::<ApiTags>(users, Some("find")), vec!["Lookup".to_string()]);
        assert!(reg.get::<ApiTags>(other, None).is_empty());
        // same triple under a different kind is a different entry
        assert!(reg.get::<ApiQueries>(users, None).is_empty());
        assert_eq!(reg.len(), 2);
    }

    fn declare_discovered(reg: &mut MetadataRegistry) {
        reg.define::<ControllerPrefix>(Token::of::<Other>(), None, Some("/discovered".into()));
    }

    inventory::submit! {
        Declarator(declare_discovered)
    }

    #[test]
    fn discover_runs_submitted_declarators() {
        let reg = MetadataRegistry::discover();
        assert_eq!(
            reg.get::<ControllerPrefix>(Token::of::<Other>(), None).as_deref(),
            Some("/discovered")
        );
    }
}
