//! The resource graph: metadata and typed accessors for every exposed
//! resource type.
//!
//! The graph is built once at startup and shared read-only afterwards.
//! Instead of looking struct fields up by name at runtime, every attribute
//! and relationship registers a typed setter closure; the builder wraps the
//! caller's strongly-typed closure in the `dyn Any` downcast so conversion
//! code stays fully dynamic while field access stays compile-checked.
//!
//! ```
//! use jsonapi_adapter::{
//!     AttrCapabilities, Identifiable, RelationshipCapabilities, ResourceGraphBuilder,
//! };
//! # use jsonapi_adapter::BoxError;
//! #[derive(Default)]
//! struct Tag { id: Option<i64>, local_id: Option<String>, label: Option<String> }
//! # impl Identifiable for Tag {
//! #     fn string_id(&self) -> Option<String> { self.id.map(|id| id.to_string()) }
//! #     fn assign_string_id(&mut self, value: Option<&str>) -> Result<(), BoxError> {
//! #         self.id = match value { Some(raw) => Some(raw.parse()?), None => None };
//! #         Ok(())
//! #     }
//! #     fn local_id(&self) -> Option<&str> { self.local_id.as_deref() }
//! #     fn assign_local_id(&mut self, value: Option<&str>) {
//! #         self.local_id = value.map(str::to_owned);
//! #     }
//! # }
//!
//! let graph = ResourceGraphBuilder::new()
//!     .resource::<Tag>("tags", |tag| {
//!         tag.attribute("label", AttrCapabilities::ALL, |tag: &mut Tag, value: Option<String>| {
//!             tag.label = value;
//!         })
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert!(graph.find_resource_type("tags").is_some());
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::{BoxError, GraphError};
use crate::resource::Identifiable;

/// Creates a fresh instance of a registered resource type.
pub type ResourceFactory = Box<dyn Fn() -> Box<dyn Identifiable> + Send + Sync>;

type CompoundFactory = Box<dyn Fn() -> Box<dyn Any> + Send + Sync>;
type ValueSetterFn = Box<dyn Fn(&mut dyn Any, Value) -> Result<(), BoxError> + Send + Sync>;
type CompoundSetterFn =
    Box<dyn Fn(&mut dyn Any, Option<Box<dyn Any>>) -> Result<(), BoxError> + Send + Sync>;
type CompoundListSetterFn =
    Box<dyn Fn(&mut dyn Any, Vec<Option<Box<dyn Any>>>) -> Result<(), BoxError> + Send + Sync>;
type ToOneSetterFn =
    Box<dyn Fn(&mut dyn Any, Option<Box<dyn Identifiable>>) -> Result<(), BoxError> + Send + Sync>;
type ToManySetterFn =
    Box<dyn Fn(&mut dyn Any, Vec<Box<dyn Identifiable>>) -> Result<(), BoxError> + Send + Sync>;

#[derive(Debug, Error)]
#[error("accessor invoked with a mismatched target type")]
struct AccessorTypeMismatch;

fn downcast_target<T: Any>(target: &mut dyn Any) -> Result<&mut T, BoxError> {
    target
        .downcast_mut::<T>()
        .ok_or_else(|| Box::new(AccessorTypeMismatch) as BoxError)
}

/// Structural kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Primitive,
    PrimitiveCollection,
    Compound(TypeId),
    CompoundCollection(TypeId),
}

/// Which writes an attribute participates in. An attribute allowing neither
/// is still readable in responses; it just rejects incoming values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttrCapabilities {
    pub allow_create: bool,
    pub allow_change: bool,
}

impl AttrCapabilities {
    pub const ALL: AttrCapabilities = AttrCapabilities {
        allow_create: true,
        allow_change: true,
    };
    pub const NONE: AttrCapabilities = AttrCapabilities {
        allow_create: false,
        allow_change: false,
    };
    pub const CREATE_ONLY: AttrCapabilities = AttrCapabilities {
        allow_create: true,
        allow_change: false,
    };
    pub const CHANGE_ONLY: AttrCapabilities = AttrCapabilities {
        allow_create: false,
        allow_change: true,
    };
}

pub(crate) enum AttrSetter {
    Value(ValueSetterFn),
    Compound(CompoundSetterFn),
    CompoundCollection(CompoundListSetterFn),
}

/// One attribute of a resource or compound type.
pub struct AttrDefinition {
    public_name: String,
    kind: AttrKind,
    capabilities: AttrCapabilities,
    setter: Option<AttrSetter>,
}

impl AttrDefinition {
    pub fn public_name(&self) -> &str {
        &self.public_name
    }

    pub fn kind(&self) -> AttrKind {
        self.kind
    }

    pub fn capabilities(&self) -> AttrCapabilities {
        self.capabilities
    }

    /// An attribute without a registered setter cannot be written at all.
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    pub(crate) fn setter(&self) -> Option<&AttrSetter> {
        self.setter.as_ref()
    }
}

impl fmt::Debug for AttrDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrDefinition")
            .field("public_name", &self.public_name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    ToOne { nullable: bool },
    ToMany,
}

impl RelationshipKind {
    pub fn is_to_many(&self) -> bool {
        matches!(self, RelationshipKind::ToMany)
    }
}

/// Which relationship writes are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipCapabilities {
    pub allow_set: bool,
    pub allow_add: bool,
    pub allow_remove: bool,
}

impl RelationshipCapabilities {
    pub const ALL: RelationshipCapabilities = RelationshipCapabilities {
        allow_set: true,
        allow_add: true,
        allow_remove: true,
    };
    pub const NONE: RelationshipCapabilities = RelationshipCapabilities {
        allow_set: false,
        allow_add: false,
        allow_remove: false,
    };
}

impl Default for RelationshipCapabilities {
    fn default() -> RelationshipCapabilities {
        RelationshipCapabilities::ALL
    }
}

pub(crate) enum RelationshipSetter {
    One(ToOneSetterFn),
    Many(ToManySetterFn),
}

/// One relationship of a resource type.
pub struct RelationshipDefinition {
    public_name: String,
    left_type: String,
    right_type: String,
    kind: RelationshipKind,
    capabilities: RelationshipCapabilities,
    setter: RelationshipSetter,
}

impl RelationshipDefinition {
    pub fn public_name(&self) -> &str {
        &self.public_name
    }

    /// Public name of the owning resource type.
    pub fn left_type(&self) -> &str {
        &self.left_type
    }

    /// Public name of the resource type on the other side.
    pub fn right_type(&self) -> &str {
        &self.right_type
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    pub fn capabilities(&self) -> RelationshipCapabilities {
        self.capabilities
    }

    pub(crate) fn setter(&self) -> &RelationshipSetter {
        &self.setter
    }
}

impl fmt::Debug for RelationshipDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipDefinition")
            .field("public_name", &self.public_name)
            .field("left_type", &self.left_type)
            .field("right_type", &self.right_type)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// A nested object type usable as a compound attribute.
pub(crate) struct CompoundType {
    name: String,
    factory: CompoundFactory,
    attrs: Vec<AttrDefinition>,
}

impl CompoundType {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn find_attribute(&self, name: &str) -> Option<&AttrDefinition> {
        self.attrs.iter().find(|attr| attr.public_name == name)
    }

    pub(crate) fn new_instance(&self) -> Box<dyn Any> {
        (self.factory)()
    }
}

/// Metadata for one exposed resource type.
pub struct ResourceType {
    public_name: String,
    base: Option<String>,
    factory: Option<ResourceFactory>,
    attrs: Vec<AttrDefinition>,
    relationships: Vec<RelationshipDefinition>,
}

impl ResourceType {
    pub fn public_name(&self) -> &str {
        &self.public_name
    }

    /// Public name of the type this type extends, if any.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Abstract types have no factory and cannot be instantiated.
    pub fn is_abstract(&self) -> bool {
        self.factory.is_none()
    }

    pub fn attributes(&self) -> &[AttrDefinition] {
        &self.attrs
    }

    pub fn relationships(&self) -> &[RelationshipDefinition] {
        &self.relationships
    }

    pub fn find_attribute(&self, name: &str) -> Option<&AttrDefinition> {
        self.attrs.iter().find(|attr| attr.public_name == name)
    }

    pub fn find_relationship(&self, name: &str) -> Option<&RelationshipDefinition> {
        self.relationships
            .iter()
            .find(|relationship| relationship.public_name == name)
    }

    pub(crate) fn new_instance(&self) -> Option<Box<dyn Identifiable>> {
        self.factory.as_ref().map(|factory| factory())
    }
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("public_name", &self.public_name)
            .field("base", &self.base)
            .field("abstract", &self.is_abstract())
            .field("attributes", &self.attrs)
            .field("relationships", &self.relationships)
            .finish()
    }
}

/// Read-only registry of resource and compound types, shared across
/// requests.
pub struct ResourceGraph {
    types: HashMap<String, ResourceType>,
    compounds: HashMap<TypeId, CompoundType>,
}

impl ResourceGraph {
    pub fn find_resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.types.get(name)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.types.values()
    }

    /// Whether `derived` is `expected` itself or transitively extends it.
    pub fn is_assignable_to(&self, derived: &str, expected: &str) -> bool {
        let mut current = Some(derived);
        while let Some(name) = current {
            if name == expected {
                return true;
            }
            current = self
                .find_resource_type(name)
                .and_then(|resource_type| resource_type.base());
        }
        false
    }

    pub(crate) fn find_compound(&self, id: TypeId) -> Option<&CompoundType> {
        self.compounds.get(&id)
    }
}

impl fmt::Debug for ResourceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ResourceGraph")
            .field("resource_types", &names)
            .field("compound_types", &self.compounds.len())
            .finish()
    }
}

/// Builds a [`ResourceGraph`], validating referential integrity on `build`.
#[derive(Default)]
pub struct ResourceGraphBuilder {
    types: Vec<ResourceType>,
    compounds: HashMap<TypeId, CompoundType>,
}

impl ResourceGraphBuilder {
    pub fn new() -> ResourceGraphBuilder {
        ResourceGraphBuilder::default()
    }

    /// Registers a concrete resource type backed by `T`.
    pub fn resource<T>(
        mut self,
        public_name: &str,
        configure: impl FnOnce(ResourceTypeBuilder<T>) -> ResourceTypeBuilder<T>,
    ) -> ResourceGraphBuilder
    where
        T: Identifiable + Default,
    {
        let builder = configure(ResourceTypeBuilder::new(public_name));
        self.types.push(builder.inner);
        self
    }

    /// Registers an abstract resource type: usable as a base or relationship
    /// target, never instantiated.
    pub fn abstract_resource(mut self, public_name: &str) -> ResourceGraphBuilder {
        self.types.push(ResourceType {
            public_name: public_name.to_owned(),
            base: None,
            factory: None,
            attrs: Vec::new(),
            relationships: Vec::new(),
        });
        self
    }

    /// Registers a compound type backed by `T`, usable in compound
    /// attributes. The public name appears in conversion error messages.
    pub fn compound<T>(
        mut self,
        public_name: &str,
        configure: impl FnOnce(CompoundTypeBuilder<T>) -> CompoundTypeBuilder<T>,
    ) -> ResourceGraphBuilder
    where
        T: Any + Default,
    {
        let builder = configure(CompoundTypeBuilder::new(public_name));
        self.compounds.insert(TypeId::of::<T>(), builder.inner);
        self
    }

    pub fn build(self) -> Result<ResourceGraph, GraphError> {
        let mut types: HashMap<String, ResourceType> = HashMap::with_capacity(self.types.len());
        for resource_type in self.types {
            if types.contains_key(&resource_type.public_name) {
                return Err(GraphError::DuplicateResourceType {
                    name: resource_type.public_name,
                });
            }
            types.insert(resource_type.public_name.clone(), resource_type);
        }

        for resource_type in types.values() {
            let mut seen: Vec<&str> = Vec::new();
            for attr in &resource_type.attrs {
                if seen.contains(&attr.public_name.as_str()) {
                    return Err(GraphError::DuplicateField {
                        resource_type: resource_type.public_name.clone(),
                        name: attr.public_name.clone(),
                    });
                }
                seen.push(&attr.public_name);

                let compound_id = match attr.kind {
                    AttrKind::Compound(id) | AttrKind::CompoundCollection(id) => Some(id),
                    _ => None,
                };
                if let Some(id) = compound_id {
                    if !self.compounds.contains_key(&id) {
                        return Err(GraphError::UnknownCompoundType {
                            resource_type: resource_type.public_name.clone(),
                            attribute: attr.public_name.clone(),
                        });
                    }
                }
            }

            for relationship in &resource_type.relationships {
                if seen.contains(&relationship.public_name.as_str()) {
                    return Err(GraphError::DuplicateField {
                        resource_type: resource_type.public_name.clone(),
                        name: relationship.public_name.clone(),
                    });
                }
                seen.push(&relationship.public_name);

                if !types.contains_key(&relationship.right_type) {
                    return Err(GraphError::UnknownRightType {
                        resource_type: resource_type.public_name.clone(),
                        relationship: relationship.public_name.clone(),
                        right_type: relationship.right_type.clone(),
                    });
                }
            }

            if let Some(base) = &resource_type.base {
                if !types.contains_key(base) {
                    return Err(GraphError::UnknownBaseType {
                        resource_type: resource_type.public_name.clone(),
                        base: base.clone(),
                    });
                }
            }
        }

        Ok(ResourceGraph {
            types,
            compounds: self.compounds,
        })
    }
}

/// Configures one resource type. Obtained through
/// [`ResourceGraphBuilder::resource`].
pub struct ResourceTypeBuilder<T> {
    inner: ResourceType,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ResourceTypeBuilder<T>
where
    T: Identifiable + Default,
{
    fn new(public_name: &str) -> ResourceTypeBuilder<T> {
        ResourceTypeBuilder {
            inner: ResourceType {
                public_name: public_name.to_owned(),
                base: None,
                factory: Some(Box::new(|| Box::new(T::default()))),
                attrs: Vec::new(),
                relationships: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Declares the (possibly abstract) base type this type is assignable
    /// to.
    pub fn extends(mut self, base: &str) -> ResourceTypeBuilder<T> {
        self.inner.base = Some(base.to_owned());
        self
    }

    fn push_attr(mut self, attr: AttrDefinition) -> ResourceTypeBuilder<T> {
        self.inner.attrs.push(attr);
        self
    }

    /// Registers a primitive attribute. `V` is the decoded value type; use
    /// an `Option` to accept explicit nulls.
    pub fn attribute<V, F>(
        self,
        name: &str,
        capabilities: AttrCapabilities,
        set: F,
    ) -> ResourceTypeBuilder<T>
    where
        V: DeserializeOwned + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::Primitive,
            capabilities,
            setter: Some(value_setter::<T, V, F>(set)),
        })
    }

    /// Registers a collection-of-primitives attribute. `V` is the declared
    /// collection type (`Vec<String>`, `BTreeSet<i64>`, ...).
    pub fn collection_attribute<V, F>(
        self,
        name: &str,
        capabilities: AttrCapabilities,
        set: F,
    ) -> ResourceTypeBuilder<T>
    where
        V: DeserializeOwned + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::PrimitiveCollection,
            capabilities,
            setter: Some(value_setter::<T, V, F>(set)),
        })
    }

    /// Registers an attribute that rejects every incoming value.
    pub fn readonly_attribute(
        self,
        name: &str,
        capabilities: AttrCapabilities,
    ) -> ResourceTypeBuilder<T> {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::Primitive,
            capabilities,
            setter: None,
        })
    }

    /// Registers a compound attribute of the registered compound type `V`.
    pub fn compound_attribute<V, F>(
        self,
        name: &str,
        capabilities: AttrCapabilities,
        set: F,
    ) -> ResourceTypeBuilder<T>
    where
        V: Any,
        F: Fn(&mut T, Option<V>) + Send + Sync + 'static,
    {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::Compound(TypeId::of::<V>()),
            capabilities,
            setter: Some(compound_setter::<T, V, F>(set)),
        })
    }

    /// Registers a collection-of-compound attribute; elements may be null.
    pub fn compound_collection_attribute<V, F>(
        self,
        name: &str,
        capabilities: AttrCapabilities,
        set: F,
    ) -> ResourceTypeBuilder<T>
    where
        V: Any,
        F: Fn(&mut T, Vec<Option<V>>) + Send + Sync + 'static,
    {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::CompoundCollection(TypeId::of::<V>()),
            capabilities,
            setter: Some(compound_list_setter::<T, V, F>(set)),
        })
    }

    fn push_relationship(
        mut self,
        name: &str,
        right_type: &str,
        kind: RelationshipKind,
        capabilities: RelationshipCapabilities,
        setter: RelationshipSetter,
    ) -> ResourceTypeBuilder<T> {
        let left_type = self.inner.public_name.clone();
        self.inner.relationships.push(RelationshipDefinition {
            public_name: name.to_owned(),
            left_type,
            right_type: right_type.to_owned(),
            kind,
            capabilities,
            setter,
        });
        self
    }

    /// Registers a to-one relationship whose targets have type `R`.
    pub fn has_one<R, F>(
        self,
        name: &str,
        right_type: &str,
        nullable: bool,
        capabilities: RelationshipCapabilities,
        set: F,
    ) -> ResourceTypeBuilder<T>
    where
        R: Identifiable,
        F: Fn(&mut T, Option<R>) + Send + Sync + 'static,
    {
        let setter = RelationshipSetter::One(Box::new(move |target, value| {
            let target = downcast_target::<T>(target)?;
            let value = match value {
                Some(resource) => match resource.downcast::<R>() {
                    Some(boxed) => Some(*boxed),
                    None => return Err(Box::new(AccessorTypeMismatch)),
                },
                None => None,
            };
            set(target, value);
            Ok(())
        }));
        self.push_relationship(
            name,
            right_type,
            RelationshipKind::ToOne { nullable },
            capabilities,
            setter,
        )
    }

    /// To-one relationship storing the target as a boxed trait object, for
    /// polymorphic right-hand types.
    pub fn has_one_dyn<F>(
        self,
        name: &str,
        right_type: &str,
        nullable: bool,
        capabilities: RelationshipCapabilities,
        set: F,
    ) -> ResourceTypeBuilder<T>
    where
        F: Fn(&mut T, Option<Box<dyn Identifiable>>) + Send + Sync + 'static,
    {
        let setter = RelationshipSetter::One(Box::new(move |target, value| {
            let target = downcast_target::<T>(target)?;
            set(target, value);
            Ok(())
        }));
        self.push_relationship(
            name,
            right_type,
            RelationshipKind::ToOne { nullable },
            capabilities,
            setter,
        )
    }

    /// Registers a to-many relationship whose targets have type `R`.
    pub fn has_many<R, F>(
        self,
        name: &str,
        right_type: &str,
        capabilities: RelationshipCapabilities,
        set: F,
    ) -> ResourceTypeBuilder<T>
    where
        R: Identifiable,
        F: Fn(&mut T, Vec<R>) + Send + Sync + 'static,
    {
        let setter = RelationshipSetter::Many(Box::new(move |target, values| {
            let target = downcast_target::<T>(target)?;
            let mut typed = Vec::with_capacity(values.len());
            for value in values {
                match value.downcast::<R>() {
                    Some(boxed) => typed.push(*boxed),
                    None => return Err(Box::new(AccessorTypeMismatch)),
                }
            }
            set(target, typed);
            Ok(())
        }));
        self.push_relationship(name, right_type, RelationshipKind::ToMany, capabilities, setter)
    }

    /// To-many relationship storing boxed trait objects, for polymorphic
    /// right-hand types.
    pub fn has_many_dyn<F>(
        self,
        name: &str,
        right_type: &str,
        capabilities: RelationshipCapabilities,
        set: F,
    ) -> ResourceTypeBuilder<T>
    where
        F: Fn(&mut T, Vec<Box<dyn Identifiable>>) + Send + Sync + 'static,
    {
        let setter = RelationshipSetter::Many(Box::new(move |target, values| {
            let target = downcast_target::<T>(target)?;
            set(target, values);
            Ok(())
        }));
        self.push_relationship(name, right_type, RelationshipKind::ToMany, capabilities, setter)
    }
}

/// Configures one compound type. Obtained through
/// [`ResourceGraphBuilder::compound`].
pub struct CompoundTypeBuilder<T> {
    inner: CompoundType,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CompoundTypeBuilder<T>
where
    T: Any + Default,
{
    fn new(public_name: &str) -> CompoundTypeBuilder<T> {
        CompoundTypeBuilder {
            inner: CompoundType {
                name: public_name.to_owned(),
                factory: Box::new(|| Box::new(T::default())),
                attrs: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    fn push_attr(mut self, attr: AttrDefinition) -> CompoundTypeBuilder<T> {
        self.inner.attrs.push(attr);
        self
    }

    pub fn attribute<V, F>(
        self,
        name: &str,
        capabilities: AttrCapabilities,
        set: F,
    ) -> CompoundTypeBuilder<T>
    where
        V: DeserializeOwned + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::Primitive,
            capabilities,
            setter: Some(value_setter::<T, V, F>(set)),
        })
    }

    pub fn collection_attribute<V, F>(
        self,
        name: &str,
        capabilities: AttrCapabilities,
        set: F,
    ) -> CompoundTypeBuilder<T>
    where
        V: DeserializeOwned + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::PrimitiveCollection,
            capabilities,
            setter: Some(value_setter::<T, V, F>(set)),
        })
    }

    pub fn readonly_attribute(
        self,
        name: &str,
        capabilities: AttrCapabilities,
    ) -> CompoundTypeBuilder<T> {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::Primitive,
            capabilities,
            setter: None,
        })
    }

    /// Nested compound attribute; compounds may nest arbitrarily deep.
    pub fn compound_attribute<V, F>(
        self,
        name: &str,
        capabilities: AttrCapabilities,
        set: F,
    ) -> CompoundTypeBuilder<T>
    where
        V: Any,
        F: Fn(&mut T, Option<V>) + Send + Sync + 'static,
    {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::Compound(TypeId::of::<V>()),
            capabilities,
            setter: Some(compound_setter::<T, V, F>(set)),
        })
    }

    pub fn compound_collection_attribute<V, F>(
        self,
        name: &str,
        capabilities: AttrCapabilities,
        set: F,
    ) -> CompoundTypeBuilder<T>
    where
        V: Any,
        F: Fn(&mut T, Vec<Option<V>>) + Send + Sync + 'static,
    {
        self.push_attr(AttrDefinition {
            public_name: name.to_owned(),
            kind: AttrKind::CompoundCollection(TypeId::of::<V>()),
            capabilities,
            setter: Some(compound_list_setter::<T, V, F>(set)),
        })
    }
}

fn value_setter<T, V, F>(set: F) -> AttrSetter
where
    T: Any,
    V: DeserializeOwned + 'static,
    F: Fn(&mut T, V) + Send + Sync + 'static,
{
    AttrSetter::Value(Box::new(move |target, value| {
        let target = downcast_target::<T>(target)?;
        let value: V = serde_json::from_value(value)?;
        set(target, value);
        Ok(())
    }))
}

fn compound_setter<T, V, F>(set: F) -> AttrSetter
where
    T: Any,
    V: Any,
    F: Fn(&mut T, Option<V>) + Send + Sync + 'static,
{
    AttrSetter::Compound(Box::new(move |target, value| {
        let target = downcast_target::<T>(target)?;
        let value = match value {
            Some(boxed) => match boxed.downcast::<V>() {
                Ok(typed) => Some(*typed),
                Err(_) => return Err(Box::new(AccessorTypeMismatch)),
            },
            None => None,
        };
        set(target, value);
        Ok(())
    }))
}

fn compound_list_setter<T, V, F>(set: F) -> AttrSetter
where
    T: Any,
    V: Any,
    F: Fn(&mut T, Vec<Option<V>>) + Send + Sync + 'static,
{
    AttrSetter::CompoundCollection(Box::new(move |target, values| {
        let target = downcast_target::<T>(target)?;
        let mut typed = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Some(boxed) => match boxed.downcast::<V>() {
                    Ok(element) => typed.push(Some(*element)),
                    Err(_) => return Err(Box::new(AccessorTypeMismatch)),
                },
                None => typed.push(None),
            }
        }
        set(target, typed);
        Ok(())
    }))
}
