//! The document adapter: entry point for converting a deserialized request
//! body into typed resources.
//!
//! Routing fills the [`JsonApiRequest`] descriptor before conversion starts;
//! the adapter refines it and fills the [`TargetedFields`] as the body
//! converts. Operations requests hand off to the per-entry pipeline in
//! [`crate::operations`]; everything else converts against the descriptor
//! directly.

use std::fmt;

use tracing::{debug, error};

use crate::document::Document;
use crate::error::ConversionError;
use crate::graph::ResourceGraph;
use crate::identity::{
    assert_relationship_change_allowed, assert_to_many_in_add_or_remove, IdConstraint,
    IdentityRequirements,
};
use crate::operations::convert_operations_document;
use crate::relationship::{convert_relationship_data, RelationshipValue};
use crate::request::{
    JsonApiOptions, JsonApiRequest, OperationContainer, RequestKind, TargetedFields,
    WriteOperationKind,
};
use crate::resource::{Identifiable, ResourceDefinitionAccessor};
use crate::resource_object::convert_resource_data;
use crate::state::RequestAdapterState;

/// Outcome of a successful document conversion.
pub enum DocumentResult {
    /// The primary resource of a create or update request.
    Resource(Box<dyn Identifiable>),
    /// The right-hand value of a to-one relationship request.
    ToOne(Option<Box<dyn Identifiable>>),
    /// The right-hand values of a to-many relationship request.
    ToMany(Vec<Box<dyn Identifiable>>),
    /// The converted entries of an operations request, in document order.
    Operations(Vec<OperationContainer>),
}

impl fmt::Debug for DocumentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentResult::Resource(resource) => {
                f.debug_tuple("Resource").field(&resource.string_id()).finish()
            }
            DocumentResult::ToOne(resource) => f
                .debug_tuple("ToOne")
                .field(&resource.as_ref().and_then(|resource| resource.string_id()))
                .finish(),
            DocumentResult::ToMany(resources) => {
                f.debug_tuple("ToMany").field(&resources.len()).finish()
            }
            DocumentResult::Operations(containers) => {
                f.debug_tuple("Operations").field(&containers.len()).finish()
            }
        }
    }
}

/// Converts deserialized request documents against a resource graph.
///
/// The adapter borrows its collaborators, so one instance per request is
/// cheap and the graph can be shared across a whole server.
#[derive(Debug, Clone, Copy)]
pub struct DocumentAdapter<'a> {
    graph: &'a ResourceGraph,
    options: &'a JsonApiOptions,
    definitions: &'a ResourceDefinitionAccessor,
}

impl<'a> DocumentAdapter<'a> {
    pub fn new(
        graph: &'a ResourceGraph,
        options: &'a JsonApiOptions,
        definitions: &'a ResourceDefinitionAccessor,
    ) -> DocumentAdapter<'a> {
        DocumentAdapter {
            graph,
            options,
            definitions,
        }
    }

    /// Converts a document against the descriptor in `request`, recording the
    /// targeted fields along the way.
    ///
    /// For operations requests each converted entry carries its own refined
    /// descriptor and `request` is left as routing filled it. The returned
    /// error carries the pointer, title and status for the response.
    pub fn convert(
        &self,
        document: &Document,
        request: &mut JsonApiRequest,
        targeted_fields: &mut TargetedFields,
    ) -> Result<DocumentResult, ConversionError> {
        let mut state = RequestAdapterState::new(
            self.graph,
            self.options,
            self.definitions,
            request,
            targeted_fields,
        );

        if state.request().kind == RequestKind::AtomicOperations {
            let containers = convert_operations_document(document, &mut state)?;
            return Ok(DocumentResult::Operations(containers));
        }

        state.writable_fields = Some(TargetedFields::new());
        let write_operation = state.request().write_operation;
        match write_operation {
            Some(WriteOperationKind::CreateResource | WriteOperationKind::UpdateResource) => {
                self.convert_resource_document(document, &mut state)
            }
            Some(
                WriteOperationKind::SetRelationship
                | WriteOperationKind::AddToRelationship
                | WriteOperationKind::RemoveFromRelationship,
            ) => self.convert_relationship_document(document, &mut state),
            other => Err(descriptor_error(
                &state,
                format!(
                    "A request body cannot be converted for write operation '{}'.",
                    other.map_or("none", |write_operation| write_operation.as_str())
                ),
            )),
        }
    }

    fn convert_resource_document(
        &self,
        document: &Document,
        state: &mut RequestAdapterState<'_>,
    ) -> Result<DocumentResult, ConversionError> {
        let request = state.request();
        let primary_type = request.primary_resource_type.clone();
        let primary_id = request.primary_id.clone();
        let id_constraint = match request.write_operation {
            Some(WriteOperationKind::CreateResource) => (!self.options.allow_client_generated_ids)
                .then_some(IdConstraint::Forbidden),
            _ => Some(IdConstraint::Required),
        };

        let requirements = IdentityRequirements {
            resource_type: primary_type.as_deref(),
            id_constraint,
            id_value: primary_id.as_deref(),
            lid_value: None,
        };
        let (mut resource, resource_type) =
            convert_resource_data(&document.data, &requirements, state)?;
        let type_name = resource_type.public_name();

        state.flush_injectables();
        state
            .definitions
            .notify_deserialized(type_name, resource.as_mut(), state.request());

        Ok(DocumentResult::Resource(resource))
    }

    fn convert_relationship_document(
        &self,
        document: &Document,
        state: &mut RequestAdapterState<'_>,
    ) -> Result<DocumentResult, ConversionError> {
        let request = state.request();
        let Some(primary_type) = request.primary_resource_type.clone() else {
            return Err(descriptor_error(
                state,
                "The request descriptor does not name a primary resource type.".to_owned(),
            ));
        };
        let Some(relationship_name) = request.relationship.clone() else {
            return Err(descriptor_error(
                state,
                "The request descriptor does not name a relationship.".to_owned(),
            ));
        };

        let Some(resource_type) = self.graph.find_resource_type(&primary_type) else {
            return Err(descriptor_error(
                state,
                format!("Resource type '{primary_type}' is not registered."),
            ));
        };
        // An unknown relationship name is deferred: conversion yields an
        // empty set and the controller reports the unknown relationship with
        // full request context.
        let Some(relationship) = resource_type.find_relationship(&relationship_name) else {
            debug!(
                "Relationship '{}' does not exist on resource type '{}', deferring",
                relationship_name, primary_type
            );
            return Ok(DocumentResult::ToMany(Vec::new()));
        };

        assert_to_many_in_add_or_remove(relationship, state)?;
        assert_relationship_change_allowed(relationship, state)?;

        let value = convert_relationship_data(&document.data, relationship, false, state)?;
        if let Some(fields) = state.writable_fields.as_mut() {
            fields.add_relationship(relationship.public_name());
        }
        state.flush_injectables();

        Ok(match value {
            RelationshipValue::ToOne(resource) => DocumentResult::ToOne(resource),
            RelationshipValue::ToMany(resources) => DocumentResult::ToMany(resources),
        })
    }
}

/// The caller handed over a request descriptor the adapter cannot serve.
fn descriptor_error(state: &RequestAdapterState<'_>, detail: String) -> ConversionError {
    error!("Document conversion rejected: {}", detail);
    ConversionError::new(&state.position, "Internal conversion failure.", Some(detail))
        .with_status(500)
}
