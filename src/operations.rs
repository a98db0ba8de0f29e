//! Converts the `atomic:operations` array of an operations request.
//!
//! Each entry is classified from its `op` code and the shape of its `ref`,
//! then dispatched to the resource or relationship conversion path. Entries
//! convert against a fresh writable request descriptor and targeted-field
//! set, so one entry never sees another's state.

use tracing::debug;

use crate::document::{AtomicOperationObject, AtomicReference, Document, OperationCode};
use crate::error::ConversionError;
use crate::graph::{RelationshipDefinition, ResourceType};
use crate::identity::{
    assert_relationship_change_allowed, assert_to_many_in_add_or_remove, convert_identity,
    IdConstraint, IdentityRequirements,
};
use crate::relationship::convert_relationship_data;
use crate::request::{
    JsonApiRequest, OperationContainer, RequestKind, TargetedFields, WriteOperationKind,
};
use crate::resource::Identifiable;
use crate::resource_object::{convert_resource_data, store_relationship_value};
use crate::state::RequestAdapterState;

/// Converts every entry of an operations document, in document order.
pub(crate) fn convert_operations_document(
    document: &Document,
    state: &mut RequestAdapterState<'_>,
) -> Result<Vec<OperationContainer>, ConversionError> {
    let operations = document.operations.as_deref().unwrap_or_default();
    if operations.is_empty() {
        return Err(ConversionError::new(&state.position, "No operations found.", None));
    }
    if let Some(maximum) = state.options.maximum_operations_per_request {
        if operations.len() > maximum {
            return Err(ConversionError::new(
                &state.position,
                "Too many operations in request.",
                Some(format!(
                    "The number of operations in this request ({}) is higher than the maximum of {}.",
                    operations.len(),
                    maximum
                )),
            ));
        }
    }

    let _guard = state.position.push_element("atomic:operations");
    let mut containers = Vec::with_capacity(operations.len());
    for (index, operation) in operations.iter().enumerate() {
        let _guard = state.position.push_index(index);
        containers.push(convert_operation(operation, state)?);
    }
    Ok(containers)
}

/// Converts one operation entry into its container.
pub(crate) fn convert_operation(
    operation: &AtomicOperationObject,
    state: &mut RequestAdapterState<'_>,
) -> Result<OperationContainer, ConversionError> {
    assert_no_href(operation, state)?;
    let write_operation = classify_write_operation(operation, state)?;
    debug!("Classified operation {} as {}", operation.op, write_operation);

    state.writable_request = Some(JsonApiRequest {
        kind: RequestKind::AtomicOperations,
        write_operation: Some(write_operation),
        ..JsonApiRequest::default()
    });
    state.writable_fields = Some(TargetedFields::new());

    let reference = match operation.reference.as_ref() {
        Some(reference) => {
            let result = convert_reference(reference, state)?;
            if let Some(request) = state.writable_request.as_mut() {
                request.primary_resource_type = Some(result.resource_type.public_name().to_owned());
                request.primary_id = result.resource.string_id();
                if let Some(relationship) = result.relationship {
                    request.relationship = Some(relationship.public_name().to_owned());
                    request.secondary_resource_type = Some(relationship.right_type().to_owned());
                    request.is_collection = relationship.kind().is_to_many();
                }
            }
            Some(result)
        }
        None => None,
    };

    let (mut resource, resource_type) = match reference {
        Some(ReferenceResult {
            resource: mut left_resource,
            resource_type,
            relationship: Some(relationship),
        }) => {
            let value = convert_relationship_data(&operation.data, relationship, false, state)?;
            store_relationship_value(relationship, left_resource.as_mut(), value, state)?;
            if let Some(fields) = state.writable_fields.as_mut() {
                fields.add_relationship(relationship.public_name());
            }
            (left_resource, resource_type)
        }
        Some(ReferenceResult {
            resource: left_resource,
            resource_type,
            relationship: None,
        }) => {
            if write_operation == WriteOperationKind::DeleteResource {
                (left_resource, resource_type)
            } else {
                // The resource object in `data` must agree with the `ref`.
                let id = left_resource.string_id();
                let requirements = IdentityRequirements {
                    resource_type: Some(resource_type.public_name()),
                    id_constraint: Some(IdConstraint::Required),
                    id_value: id.as_deref(),
                    lid_value: left_resource.local_id(),
                };
                convert_resource_data(&operation.data, &requirements, state)?
            }
        }
        None => {
            let requirements = match write_operation {
                WriteOperationKind::CreateResource => IdentityRequirements {
                    id_constraint: (!state.options.allow_client_generated_ids)
                        .then_some(IdConstraint::Forbidden),
                    ..IdentityRequirements::default()
                },
                _ => IdentityRequirements {
                    id_constraint: Some(IdConstraint::Required),
                    ..IdentityRequirements::default()
                },
            };
            convert_resource_data(&operation.data, &requirements, state)?
        }
    };

    if let Some(request) = state.writable_request.as_mut() {
        request.primary_resource_type = Some(resource_type.public_name().to_owned());
        request.primary_id = resource.string_id();
    }
    state.flush_injectables();
    state
        .definitions
        .notify_deserialized(resource_type.public_name(), resource.as_mut(), state.request());

    Ok(OperationContainer {
        resource,
        targeted_fields: state.writable_fields.take().unwrap_or_default(),
        request: state.writable_request.take().unwrap_or_default(),
    })
}

/// Classifies an operation entry from its shape alone: the `op` code plus
/// whether a `ref` and a `ref.relationship` are present.
///
/// Returns `None` for the two shapes conversion rejects, a `remove` without
/// a `ref` and an `add` whose `ref` names no relationship.
pub fn classify_operation(operation: &AtomicOperationObject) -> Option<WriteOperationKind> {
    match (operation.op, operation.reference.as_ref()) {
        (OperationCode::Add, None) => Some(WriteOperationKind::CreateResource),
        (OperationCode::Add, Some(reference)) => reference
            .relationship
            .is_some()
            .then_some(WriteOperationKind::AddToRelationship),
        (OperationCode::Update, reference) => {
            let targets_relationship =
                reference.is_some_and(|reference| reference.relationship.is_some());
            Some(if targets_relationship {
                WriteOperationKind::SetRelationship
            } else {
                WriteOperationKind::UpdateResource
            })
        }
        (OperationCode::Remove, None) => None,
        (OperationCode::Remove, Some(reference)) => Some(if reference.relationship.is_some() {
            WriteOperationKind::RemoveFromRelationship
        } else {
            WriteOperationKind::DeleteResource
        }),
    }
}

/// Maps the `op` code and `ref` shape onto a write operation.
fn classify_write_operation(
    operation: &AtomicOperationObject,
    state: &RequestAdapterState<'_>,
) -> Result<WriteOperationKind, ConversionError> {
    match classify_operation(operation) {
        Some(write_operation) => Ok(write_operation),
        None if operation.op == OperationCode::Remove => Err(ConversionError::new(
            &state.position,
            "The 'ref' element is required.",
            None,
        )),
        None => {
            let _guard = state.position.push_element("ref");
            Err(ConversionError::new(
                &state.position,
                "The 'relationship' element is required.",
                None,
            ))
        }
    }
}

fn assert_no_href(
    operation: &AtomicOperationObject,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    if operation.href.is_some() {
        let _guard = state.position.push_element("href");
        return Err(ConversionError::new(
            &state.position,
            "Usage of the 'href' element is not supported.",
            None,
        ));
    }
    Ok(())
}

/// Resolved form of an operation's `ref`: the targeted resource and, for
/// relationship operations, the targeted relationship.
struct ReferenceResult<'a> {
    resource: Box<dyn Identifiable>,
    resource_type: &'a ResourceType,
    relationship: Option<&'a RelationshipDefinition>,
}

fn convert_reference<'a>(
    reference: &AtomicReference,
    state: &RequestAdapterState<'a>,
) -> Result<ReferenceResult<'a>, ConversionError> {
    let _guard = state.position.push_element("ref");
    let requirements = IdentityRequirements {
        id_constraint: Some(IdConstraint::Required),
        ..IdentityRequirements::default()
    };
    let (resource, resource_type) = convert_identity(&reference.identity(), &requirements, state)?;

    let relationship = match reference.relationship.as_deref() {
        Some(name) => {
            let _guard = state.position.push_element("relationship");
            let relationship = resource_type.find_relationship(name).ok_or_else(|| {
                ConversionError::new(
                    &state.position,
                    "Unknown relationship found.",
                    Some(format!(
                        "Relationship '{name}' does not exist on resource type '{}'.",
                        resource_type.public_name()
                    )),
                )
            })?;
            assert_to_many_in_add_or_remove(relationship, state)?;
            assert_relationship_change_allowed(relationship, state)?;
            Some(relationship)
        }
        None => None,
    };

    Ok(ReferenceResult {
        resource,
        resource_type,
        relationship,
    })
}
