//! Traits connecting domain structs to the conversion pipeline.
//!
//! Domain resources implement [`Identifiable`]; the adapters only ever see
//! `dyn Identifiable` and reach concrete fields through the typed accessors
//! registered on the resource graph. Identifier parsing lives in the trait
//! impl so each resource keeps its own id representation (integer, UUID,
//! string) behind the string form the wire uses.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::BoxError;
use crate::request::JsonApiRequest;

/// A domain resource addressable by JSON:API identity.
pub trait Identifiable: Any + Send {
    /// String form of the persisted identifier, if one is assigned.
    fn string_id(&self) -> Option<String>;

    /// Parses the wire identifier into the typed id. Fails when the value
    /// does not fit the id representation (surfaced as an incompatible id
    /// value by the conversion).
    fn assign_string_id(&mut self, value: Option<&str>) -> Result<(), BoxError>;

    /// Local identifier, only meaningful inside an atomic-operations
    /// request.
    fn local_id(&self) -> Option<&str>;

    fn assign_local_id(&mut self, value: Option<&str>);
}

impl fmt::Debug for dyn Identifiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identifiable")
            .field("string_id", &self.string_id())
            .field("local_id", &self.local_id())
            .finish()
    }
}

impl dyn Identifiable {
    pub fn is<T: Identifiable>(&self) -> bool {
        let any: &dyn Any = self;
        any.is::<T>()
    }

    pub fn downcast_ref<T: Identifiable>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref()
    }

    pub fn downcast_mut<T: Identifiable>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self;
        any.downcast_mut()
    }

    /// Consumes the box when the contained resource has type `T`.
    pub fn downcast<T: Identifiable>(self: Box<Self>) -> Option<Box<T>> {
        let any: Box<dyn Any> = self;
        any.downcast().ok()
    }
}

/// Identity-based equality key for deduplicating relationship targets.
///
/// Two resources refer to the same entity when their string ids match, or
/// when neither has one and their local ids match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub string_id: Option<String>,
    pub local_id: Option<String>,
}

impl IdentityKey {
    pub fn of(resource: &dyn Identifiable) -> IdentityKey {
        IdentityKey {
            string_id: resource.string_id(),
            local_id: resource.local_id().map(str::to_owned),
        }
    }
}

type DeserializeHook = Box<dyn Fn(&mut dyn Identifiable, &JsonApiRequest) + Send + Sync>;

/// Per-resource-type callbacks invoked after a top-level resource has been
/// converted.
///
/// The hook observes the request descriptor in its final, flushed form.
/// Registration is keyed by public resource type name and typed on the
/// concrete resource struct:
///
/// ```
/// use jsonapi_adapter::{Identifiable, ResourceDefinitionAccessor};
/// # use jsonapi_adapter::BoxError;
/// #[derive(Default)]
/// struct WorkItem { id: Option<i64>, local_id: Option<String>, title: Option<String> }
/// # impl Identifiable for WorkItem {
/// #     fn string_id(&self) -> Option<String> { self.id.map(|id| id.to_string()) }
/// #     fn assign_string_id(&mut self, value: Option<&str>) -> Result<(), BoxError> {
/// #         self.id = match value { Some(raw) => Some(raw.parse()?), None => None };
/// #         Ok(())
/// #     }
/// #     fn local_id(&self) -> Option<&str> { self.local_id.as_deref() }
/// #     fn assign_local_id(&mut self, value: Option<&str>) {
/// #         self.local_id = value.map(str::to_owned);
/// #     }
/// # }
///
/// let definitions = ResourceDefinitionAccessor::new()
///     .on_deserialize("workItems", |item: &mut WorkItem, _request| {
///         item.title.get_or_insert_with(|| "(untitled)".to_owned());
///     });
/// ```
#[derive(Default)]
pub struct ResourceDefinitionAccessor {
    hooks: HashMap<String, DeserializeHook>,
}

impl ResourceDefinitionAccessor {
    pub fn new() -> ResourceDefinitionAccessor {
        ResourceDefinitionAccessor::default()
    }

    /// Registers the deserialize hook for one resource type.
    pub fn on_deserialize<T, F>(mut self, resource_type: &str, hook: F) -> ResourceDefinitionAccessor
    where
        T: Identifiable,
        F: Fn(&mut T, &JsonApiRequest) + Send + Sync + 'static,
    {
        self.hooks.insert(
            resource_type.to_owned(),
            Box::new(move |resource, request| {
                if let Some(typed) = resource.downcast_mut::<T>() {
                    hook(typed, request);
                }
            }),
        );
        self
    }

    pub(crate) fn notify_deserialized(
        &self,
        type_name: &str,
        resource: &mut dyn Identifiable,
        request: &JsonApiRequest,
    ) {
        if let Some(hook) = self.hooks.get(type_name) {
            hook(resource, request);
        }
    }
}

impl fmt::Debug for ResourceDefinitionAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ResourceDefinitionAccessor")
            .field("resource_types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestKind;

    #[derive(Default)]
    struct Note {
        id: Option<i64>,
        local: Option<String>,
        text: String,
    }

    impl Identifiable for Note {
        fn string_id(&self) -> Option<String> {
            self.id.map(|id| id.to_string())
        }

        fn assign_string_id(&mut self, value: Option<&str>) -> Result<(), BoxError> {
            self.id = match value {
                Some(raw) => Some(raw.parse()?),
                None => None,
            };
            Ok(())
        }

        fn local_id(&self) -> Option<&str> {
            self.local.as_deref()
        }

        fn assign_local_id(&mut self, value: Option<&str>) {
            self.local = value.map(str::to_owned);
        }
    }

    #[test]
    fn string_id_round_trip() {
        let mut note = Note::default();
        assert_eq!(note.string_id(), None);

        note.assign_string_id(Some("17")).unwrap();
        assert_eq!(note.string_id().as_deref(), Some("17"));

        note.assign_string_id(None).unwrap();
        assert_eq!(note.string_id(), None);
    }

    #[test]
    fn non_numeric_id_fails_to_parse() {
        let mut note = Note::default();
        assert!(note.assign_string_id(Some("not-a-number")).is_err());
    }

    #[test]
    fn downcasting_through_the_trait_object() {
        let mut boxed: Box<dyn Identifiable> = Box::new(Note {
            text: "hello".to_owned(),
            ..Note::default()
        });

        assert!(boxed.is::<Note>());
        assert_eq!(boxed.downcast_ref::<Note>().unwrap().text, "hello");

        boxed.downcast_mut::<Note>().unwrap().text = "changed".to_owned();
        let owned = boxed.downcast::<Note>().unwrap();
        assert_eq!(owned.text, "changed");
    }

    #[test]
    fn identity_keys_compare_by_id_then_local_id() {
        let mut first = Note::default();
        first.assign_string_id(Some("1")).unwrap();
        let mut second = Note::default();
        second.assign_string_id(Some("1")).unwrap();
        second.text = "different payload".to_owned();

        assert_eq!(IdentityKey::of(&first), IdentityKey::of(&second));

        let mut third = Note::default();
        third.assign_local_id(Some("local-1"));
        let mut fourth = Note::default();
        fourth.assign_local_id(Some("local-1"));

        assert_eq!(IdentityKey::of(&third), IdentityKey::of(&fourth));
        assert_ne!(IdentityKey::of(&first), IdentityKey::of(&third));
    }

    #[test]
    fn deserialize_hook_runs_for_matching_type_only() {
        let definitions = ResourceDefinitionAccessor::new()
            .on_deserialize("notes", |note: &mut Note, _request| {
                note.text = "hooked".to_owned();
            });

        let request = JsonApiRequest {
            kind: RequestKind::Primary,
            ..JsonApiRequest::default()
        };

        let mut note = Note::default();
        definitions.notify_deserialized("notes", &mut note, &request);
        assert_eq!(note.text, "hooked");

        let mut untouched = Note::default();
        definitions.notify_deserialized("somethingElse", &mut untouched, &request);
        assert_eq!(untouched.text, "");
    }
}
