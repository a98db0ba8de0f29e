//! Resolves a `{type, id, lid}` identity into a typed resource instance.
//!
//! Every place a resource identity appears in a request body funnels through
//! [`convert_identity`]: primary data, relationship data, identifier objects
//! and atomic references. Callers describe what the surrounding context
//! allows with [`IdentityRequirements`]; the checks here produce the errors,
//! in a fixed order, for everything the identity itself can get wrong.

use crate::document::ResourceIdentity;
use crate::error::ConversionError;
use crate::graph::{RelationshipDefinition, ResourceType};
use crate::request::{RequestKind, WriteOperationKind};
use crate::resource::Identifiable;
use crate::state::RequestAdapterState;

/// Whether the surrounding context requires or forbids the `id` element.
///
/// Absent means either is acceptable, for example a to-one relationship
/// update where the body may carry `id` or (in an operations request) `lid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdConstraint {
    Required,
    Forbidden,
}

/// What the surrounding context expects of a resource identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRequirements<'a> {
    /// Public name the resolved type must be assignable to.
    pub resource_type: Option<&'a str>,
    pub id_constraint: Option<IdConstraint>,
    /// Value `id` must carry when present, from an enclosing `ref`.
    pub id_value: Option<&'a str>,
    /// Value `lid` must carry when present, from an enclosing `ref`.
    pub lid_value: Option<&'a str>,
}

/// Converts an identity into a fresh instance of the resolved type, with
/// its ids assigned.
pub(crate) fn convert_identity<'a>(
    identity: &ResourceIdentity<'_>,
    requirements: &IdentityRequirements<'_>,
    state: &RequestAdapterState<'a>,
) -> Result<(Box<dyn Identifiable>, &'a ResourceType), ConversionError> {
    let resource_type = resolve_type(identity, requirements, state)?;
    let resource = create_resource(identity, requirements, resource_type, state)?;
    Ok((resource, resource_type))
}

fn resolve_type<'a>(
    identity: &ResourceIdentity<'_>,
    requirements: &IdentityRequirements<'_>,
    state: &RequestAdapterState<'a>,
) -> Result<&'a ResourceType, ConversionError> {
    let type_name = identity.type_name.ok_or_else(|| {
        ConversionError::new(&state.position, "The 'type' element is required.", None)
    })?;

    let _guard = state.position.push_element("type");
    let graph = state.graph;
    let resource_type = graph.find_resource_type(type_name).ok_or_else(|| {
        ConversionError::new(
            &state.position,
            "Unknown resource type found.",
            Some(format!("Resource type '{type_name}' does not exist.")),
        )
    })?;

    if matches!(
        state.request().write_operation,
        Some(WriteOperationKind::CreateResource | WriteOperationKind::UpdateResource)
    ) {
        assert_is_not_abstract(resource_type, state)?;
    }

    if let Some(expected) = requirements.resource_type {
        if !graph.is_assignable_to(type_name, expected) {
            return Err(ConversionError::new(
                &state.position,
                "Incompatible resource type found.",
                Some(format!(
                    "Type '{type_name}' is incompatible with type '{expected}'."
                )),
            )
            .with_status(409));
        }
    }

    Ok(resource_type)
}

fn create_resource(
    identity: &ResourceIdentity<'_>,
    requirements: &IdentityRequirements<'_>,
    resource_type: &ResourceType,
    state: &RequestAdapterState<'_>,
) -> Result<Box<dyn Identifiable>, ConversionError> {
    if state.request().kind != RequestKind::AtomicOperations {
        assert_has_no_lid(identity, state)?;
    }
    assert_no_id_with_lid(identity, state)?;

    match requirements.id_constraint {
        Some(IdConstraint::Required) => assert_has_id_or_lid(identity, state)?,
        Some(IdConstraint::Forbidden) => assert_has_no_id(identity, state)?,
        None => {}
    }

    assert_same_value(identity.id, requirements.id_value, "id", state)?;
    assert_same_value(identity.lid, requirements.lid_value, "lid", state)?;

    let mut resource = match resource_type.new_instance() {
        Some(resource) => resource,
        // Reachable only for write operations without the early abstract
        // check, such as deleting through an abstract endpoint.
        None => {
            let _guard = state.position.push_element("type");
            return Err(abstract_type_error(resource_type.public_name(), state));
        }
    };

    if let Some(id) = identity.id {
        if let Err(source) = resource.assign_string_id(Some(id)) {
            let _guard = state.position.push_element("id");
            return Err(ConversionError::new(
                &state.position,
                "Incompatible 'id' value found.",
                Some(format!(
                    "Failed to convert '{id}' into a resource identifier: {source}"
                )),
            )
            .with_source(source));
        }
    }
    resource.assign_local_id(identity.lid);

    Ok(resource)
}

fn assert_is_not_abstract(
    resource_type: &ResourceType,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    if resource_type.is_abstract() {
        return Err(abstract_type_error(resource_type.public_name(), state));
    }
    Ok(())
}

fn abstract_type_error(type_name: &str, state: &RequestAdapterState<'_>) -> ConversionError {
    ConversionError::new(
        &state.position,
        "Abstract resource type found.",
        Some(format!("Resource type '{type_name}' is abstract.")),
    )
}

fn assert_has_no_lid(
    identity: &ResourceIdentity<'_>,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    if identity.lid.is_some() {
        let _guard = state.position.push_element("lid");
        return Err(ConversionError::new(
            &state.position,
            "The 'lid' element is not supported at this endpoint.",
            None,
        ));
    }
    Ok(())
}

fn assert_no_id_with_lid(
    identity: &ResourceIdentity<'_>,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    if identity.id.is_some() && identity.lid.is_some() {
        return Err(ConversionError::new(
            &state.position,
            "The 'id' and 'lid' element are mutually exclusive.",
            None,
        ));
    }
    Ok(())
}

fn assert_has_id_or_lid(
    identity: &ResourceIdentity<'_>,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    if identity.id.is_none() && identity.lid.is_none() {
        let title = if state.request().kind == RequestKind::AtomicOperations {
            "The 'id' or 'lid' element is required."
        } else {
            "The 'id' element is required."
        };
        return Err(ConversionError::new(&state.position, title, None));
    }
    Ok(())
}

fn assert_has_no_id(
    identity: &ResourceIdentity<'_>,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    if identity.id.is_some() {
        let _guard = state.position.push_element("id");
        let title = if state.request().kind == RequestKind::AtomicOperations {
            "Specifying the resource ID in operations that create a resource is not allowed."
        } else {
            "Specifying the resource ID in POST requests is not allowed."
        };
        return Err(ConversionError::new(&state.position, title, None).with_status(403));
    }
    Ok(())
}

fn assert_same_value(
    actual: Option<&str>,
    expected: Option<&str>,
    element: &'static str,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    if let (Some(actual), Some(expected)) = (actual, expected) {
        if actual != expected {
            let _guard = state.position.push_element(element);
            return Err(ConversionError::new(
                &state.position,
                format!("Conflicting '{element}' values found."),
                Some(format!("Expected '{expected}' instead of '{actual}'.")),
            )
            .with_status(409));
        }
    }
    Ok(())
}

/// Fails when a membership change (add-to or remove-from) targets a to-one
/// relationship.
pub(crate) fn assert_to_many_in_add_or_remove(
    relationship: &RelationshipDefinition,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    let requires_to_many = matches!(
        state.request().write_operation,
        Some(WriteOperationKind::AddToRelationship | WriteOperationKind::RemoveFromRelationship)
    );
    if requires_to_many && !relationship.kind().is_to_many() {
        let title = if state.request().kind == RequestKind::AtomicOperations {
            "Only to-many relationships can be targeted through this operation."
        } else {
            "Only to-many relationships can be targeted through this endpoint."
        };
        return Err(ConversionError::new(
            &state.position,
            title,
            Some(format!(
                "Relationship '{}' must be a to-many relationship.",
                relationship.public_name()
            )),
        )
        .with_status(403));
    }
    Ok(())
}

/// Fails when the current write operation is blocked by the relationship's
/// capabilities.
pub(crate) fn assert_relationship_change_allowed(
    relationship: &RelationshipDefinition,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    let capabilities = relationship.capabilities();
    let blocked = match state.request().write_operation {
        Some(WriteOperationKind::AddToRelationship) if !capabilities.allow_add => {
            Some(("Relationship cannot be added to.", "added to"))
        }
        Some(WriteOperationKind::RemoveFromRelationship) if !capabilities.allow_remove => {
            Some(("Relationship cannot be removed from.", "removed from"))
        }
        Some(
            WriteOperationKind::CreateResource
            | WriteOperationKind::UpdateResource
            | WriteOperationKind::SetRelationship,
        ) if !capabilities.allow_set => Some(("Relationship cannot be assigned.", "assigned to")),
        _ => None,
    };

    if let Some((title, verb)) = blocked {
        return Err(ConversionError::new(
            &state.position,
            title,
            Some(format!(
                "The relationship '{}' on resource type '{}' cannot be {verb}.",
                relationship.public_name(),
                relationship.left_type()
            )),
        ));
    }
    Ok(())
}
