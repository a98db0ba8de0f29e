//! Converts the `data` of one relationship into resolved right-hand values.
//!
//! Relationship data reaches this module from three places: relationship
//! sections nested in a resource body, relationship endpoints, and atomic
//! operations whose `ref` names a relationship. All three share the shape
//! rules here; they differ only in whether the declared collection is kept
//! as-is (`use_element_type`) or deduplicated by resource identity.

use std::collections::HashSet;

use crate::document::{Data, ResourceObject};
use crate::error::ConversionError;
use crate::graph::{RelationshipDefinition, RelationshipKind};
use crate::identity::{convert_identity, IdConstraint, IdentityRequirements};
use crate::resource::{Identifiable, IdentityKey};
use crate::state::RequestAdapterState;

/// The converted value of one relationship.
#[derive(Debug)]
pub(crate) enum RelationshipValue {
    ToOne(Option<Box<dyn Identifiable>>),
    ToMany(Vec<Box<dyn Identifiable>>),
}

/// Converts relationship `data` against the relationship's declared
/// cardinality.
///
/// With `use_element_type` the declared collection is kept in body order,
/// duplicates included. Without it the result is an identity-deduplicated
/// set: duplicate identifiers collapse to their first occurrence.
pub(crate) fn convert_relationship_data(
    data: &Data,
    relationship: &RelationshipDefinition,
    use_element_type: bool,
    state: &RequestAdapterState<'_>,
) -> Result<RelationshipValue, ConversionError> {
    assert_has_data(data, state)?;
    let _guard = state.position.push_element("data");

    let requirements = IdentityRequirements {
        resource_type: Some(relationship.right_type()),
        id_constraint: Some(IdConstraint::Required),
        ..IdentityRequirements::default()
    };

    match relationship.kind() {
        RelationshipKind::ToOne { nullable } => {
            let object = assert_object_value(data, nullable, state)?;
            let resource = match object {
                Some(object) => Some(convert_identifier_object(object, &requirements, state)?),
                None => None,
            };
            Ok(RelationshipValue::ToOne(resource))
        }
        RelationshipKind::ToMany => {
            let objects = assert_array_value(data, state)?;
            let mut resources: Vec<Box<dyn Identifiable>> = Vec::with_capacity(objects.len());
            for (index, object) in objects.iter().enumerate() {
                let _guard = state.position.push_index(index);
                resources.push(convert_identifier_object(object, &requirements, state)?);
            }
            if !use_element_type {
                resources = dedup_by_identity(resources);
            }
            Ok(RelationshipValue::ToMany(resources))
        }
    }
}

/// Converts a resource object appearing as a relationship reference. Only
/// the identity matters; attributes and relationships on the object are
/// ignored.
pub(crate) fn convert_identifier_object(
    object: &ResourceObject,
    requirements: &IdentityRequirements<'_>,
    state: &RequestAdapterState<'_>,
) -> Result<Box<dyn Identifiable>, ConversionError> {
    let (resource, _) = convert_identity(&object.identity(), requirements, state)?;
    Ok(resource)
}

pub(crate) fn assert_has_data(
    data: &Data,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    if data.is_absent() {
        return Err(ConversionError::new(
            &state.position,
            "The 'data' element is required.",
            None,
        ));
    }
    Ok(())
}

/// Narrows `data` to a single object, or `None` when null is acceptable.
pub(crate) fn assert_object_value<'a>(
    data: &'a Data,
    allow_null: bool,
    state: &RequestAdapterState<'_>,
) -> Result<Option<&'a ResourceObject>, ConversionError> {
    let expectation = if allow_null {
        "an object or 'null'"
    } else {
        "an object"
    };
    match data {
        Data::One(object) => Ok(Some(object)),
        Data::Null if allow_null => Ok(None),
        Data::Null => Err(shape_error(expectation, "'null'", state)),
        Data::Many(_) => Err(shape_error(expectation, "an array", state)),
        Data::Absent => Err(ConversionError::new(
            &state.position,
            "The 'data' element is required.",
            None,
        )),
    }
}

/// Narrows `data` to an array of objects.
pub(crate) fn assert_array_value<'a>(
    data: &'a Data,
    state: &RequestAdapterState<'_>,
) -> Result<&'a [ResourceObject], ConversionError> {
    match data {
        Data::Many(objects) => Ok(objects),
        Data::Null => Err(shape_error("an array", "'null'", state)),
        Data::One(_) => Err(shape_error("an array", "an object", state)),
        Data::Absent => Err(ConversionError::new(
            &state.position,
            "The 'data' element is required.",
            None,
        )),
    }
}

fn shape_error(expected: &str, actual: &str, state: &RequestAdapterState<'_>) -> ConversionError {
    ConversionError::new(
        &state.position,
        format!("Expected {expected}, instead of {actual}."),
        None,
    )
}

fn dedup_by_identity(resources: Vec<Box<dyn Identifiable>>) -> Vec<Box<dyn Identifiable>> {
    let mut seen: HashSet<IdentityKey> = HashSet::with_capacity(resources.len());
    let mut unique = Vec::with_capacity(resources.len());
    for resource in resources {
        if seen.insert(IdentityKey::of(resource.as_ref())) {
            unique.push(resource);
        }
    }
    unique
}
