//! JSON:API request adapter
//!
//! Server-side conversion of deserialized JSON:API request documents into
//! typed domain objects registered in a resource graph.
//!
//! Conversion validates structure, identity and field capabilities while it
//! walks the document, and stops at the first violation with a
//! [`ConversionError`] carrying a JSON pointer to the offending element.
//! Plain resource documents, relationship documents and `atomic:operations`
//! documents are all covered.
//!
//! # Example
//!
//! ```
//! use jsonapi_adapter::{
//!     AttrCapabilities, BoxError, DocumentAdapter, DocumentResult, Identifiable,
//!     JsonApiOptions, JsonApiRequest, RequestKind, ResourceDefinitionAccessor,
//!     ResourceGraphBuilder, TargetedFields, WriteOperationKind,
//! };
//!
//! #[derive(Default)]
//! struct WorkItem {
//!     id: Option<i64>,
//!     local_id: Option<String>,
//!     description: Option<String>,
//! }
//!
//! impl Identifiable for WorkItem {
//!     fn string_id(&self) -> Option<String> {
//!         self.id.map(|id| id.to_string())
//!     }
//!
//!     fn assign_string_id(&mut self, value: Option<&str>) -> Result<(), BoxError> {
//!         self.id = match value {
//!             Some(raw) => Some(raw.parse()?),
//!             None => None,
//!         };
//!         Ok(())
//!     }
//!
//!     fn local_id(&self) -> Option<&str> {
//!         self.local_id.as_deref()
//!     }
//!
//!     fn assign_local_id(&mut self, value: Option<&str>) {
//!         self.local_id = value.map(str::to_owned);
//!     }
//! }
//!
//! let graph = ResourceGraphBuilder::new()
//!     .resource::<WorkItem>("workItems", |builder| {
//!         builder.attribute(
//!             "description",
//!             AttrCapabilities::ALL,
//!             |item: &mut WorkItem, value: Option<String>| item.description = value,
//!         )
//!     })
//!     .build()?;
//!
//! let options = JsonApiOptions::default();
//! let definitions = ResourceDefinitionAccessor::new();
//! let adapter = DocumentAdapter::new(&graph, &options, &definitions);
//!
//! let document = jsonapi_adapter::load_document_str(
//!     r#"{"data": {"type": "workItems", "attributes": {"description": "install sink"}}}"#,
//! )?;
//! let mut request = JsonApiRequest {
//!     kind: RequestKind::Primary,
//!     write_operation: Some(WriteOperationKind::CreateResource),
//!     primary_resource_type: Some("workItems".to_owned()),
//!     ..JsonApiRequest::default()
//! };
//! let mut fields = TargetedFields::new();
//!
//! let result = adapter.convert(&document, &mut request, &mut fields)?;
//! let DocumentResult::Resource(resource) = result else {
//!     unreachable!();
//! };
//! let item = resource.downcast_ref::<WorkItem>().unwrap();
//! assert_eq!(item.description.as_deref(), Some("install sink"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Operation classification
//!
//! Entries of an `atomic:operations` document map onto write operations by
//! their shape:
//!
//! | `op` | `ref` | `ref.relationship` | Write operation |
//! |----------|---------|---------|--------------------------------|
//! | `add` | absent | - | create resource |
//! | `add` | present | named | add to to-many relationship |
//! | `update` | any | absent | update resource |
//! | `update` | present | named | set relationship |
//! | `remove` | present | absent | delete resource |
//! | `remove` | present | named | remove from to-many relationship |

mod adapter;
mod document;
mod error;
mod graph;
mod identity;
mod lint;
mod loader;
mod operations;
mod position;
mod relationship;
mod request;
mod resource;
mod resource_object;
mod state;

pub use adapter::{DocumentAdapter, DocumentResult};
pub use document::{
    AtomicOperationObject, AtomicReference, AttributeValue, Data, Document, FieldMap,
    OperationCode, RelationshipObject, ResourceIdentity, ResourceObject,
};
pub use error::{BoxError, ConversionError, ErrorObject, ErrorSource, GraphError, LoadError};
pub use graph::{
    AttrCapabilities, AttrDefinition, AttrKind, CompoundTypeBuilder, RelationshipCapabilities,
    RelationshipDefinition, RelationshipKind, ResourceGraph, ResourceGraphBuilder, ResourceType,
    ResourceTypeBuilder,
};
pub use lint::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    document_from_value, load_document, load_document_str, load_value, load_value_str,
};
pub use operations::classify_operation;
pub use position::PositionTracker;
pub use request::{
    JsonApiOptions, JsonApiRequest, OperationContainer, RequestKind, TargetedAttribute,
    TargetedFields, WriteOperationKind,
};
pub use resource::{Identifiable, IdentityKey, ResourceDefinitionAccessor};
