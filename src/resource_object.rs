//! Converts a full resource object: identity, attributes and relationships.
//!
//! Attribute handling dispatches on the registered kind. Primitives and
//! primitive collections go straight through the typed setter; compound
//! attributes instantiate the registered compound type and recurse into its
//! own attribute table, producing a nested targeted-attribute subtree so the
//! write layer can patch compound values field by field.

use std::any::Any;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::document::{
    json_shape_name, AttributeValue, Data, FieldMap, RelationshipObject, ResourceObject,
};
use crate::error::ConversionError;
use crate::graph::{
    AttrDefinition, AttrKind, AttrSetter, CompoundType, RelationshipDefinition, RelationshipSetter,
    ResourceType,
};
use crate::identity::{assert_relationship_change_allowed, convert_identity, IdentityRequirements};
use crate::relationship::{
    assert_has_data, assert_object_value, convert_relationship_data, RelationshipValue,
};
use crate::request::{TargetedAttribute, WriteOperationKind};
use crate::resource::Identifiable;
use crate::state::RequestAdapterState;

/// Converts primary `data` holding exactly one resource object.
pub(crate) fn convert_resource_data<'a>(
    data: &Data,
    requirements: &IdentityRequirements<'_>,
    state: &mut RequestAdapterState<'a>,
) -> Result<(Box<dyn Identifiable>, &'a ResourceType), ConversionError> {
    assert_has_data(data, state)?;
    let _guard = state.position.push_element("data");
    let object = assert_object_value(data, false, state)?.ok_or_else(|| {
        ConversionError::new(&state.position, "Expected an object, instead of 'null'.", None)
    })?;
    convert_resource_object(object, requirements, state)
}

/// Converts one resource object into a typed instance, recording every
/// attribute and relationship it carries as targeted.
pub(crate) fn convert_resource_object<'a>(
    resource_object: &ResourceObject,
    requirements: &IdentityRequirements<'_>,
    state: &mut RequestAdapterState<'a>,
) -> Result<(Box<dyn Identifiable>, &'a ResourceType), ConversionError> {
    let (mut resource, resource_type) =
        convert_identity(&resource_object.identity(), requirements, state)?;

    convert_attributes(&resource_object.attributes, resource.as_mut(), resource_type, state)?;
    convert_relationships(
        &resource_object.relationships,
        resource.as_mut(),
        resource_type,
        state,
    )?;

    Ok((resource, resource_type))
}

fn convert_attributes(
    attributes: &FieldMap<AttributeValue>,
    resource: &mut dyn Identifiable,
    resource_type: &ResourceType,
    state: &mut RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    let _guard = state.position.push_element("attributes");
    for (name, value) in attributes.iter() {
        convert_attribute(name, value, resource, resource_type, state)?;
    }
    Ok(())
}

fn convert_attribute(
    name: &str,
    value: &AttributeValue,
    resource: &mut dyn Identifiable,
    resource_type: &ResourceType,
    state: &mut RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    let _guard = state.position.push_element(name);
    let owner = format!("resource type '{}'", resource_type.public_name());

    let attr = match resource_type.find_attribute(name) {
        Some(attr) => attr,
        None if state.options.allow_unknown_fields_in_request_body => {
            debug!("Skipped unknown attribute '{}' on {}", name, owner);
            return Ok(());
        }
        None => {
            return Err(ConversionError::new(
                &state.position,
                "Unknown attribute found.",
                Some(format!("Attribute '{name}' does not exist on {owner}.")),
            ));
        }
    };

    let value = match value {
        AttributeValue::Json(value) => value,
        AttributeValue::Invalid { message } => {
            return Err(incompatible_attribute(name, &owner, message, state));
        }
    };

    assert_attribute_change_allowed(attr, &owner, state)?;

    let target: &mut dyn Any = resource;
    let targeted = apply_attribute(attr, &owner, value, target, state)?;
    if let Some(fields) = state.writable_fields.as_mut() {
        fields.add_attribute(targeted);
    }
    Ok(())
}

fn assert_attribute_change_allowed(
    attr: &AttrDefinition,
    owner: &str,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    let name = attr.public_name();
    let capabilities = attr.capabilities();

    if state.request().write_operation == Some(WriteOperationKind::CreateResource)
        && !capabilities.allow_create
    {
        return Err(ConversionError::new(
            &state.position,
            "Attribute value cannot be assigned when creating resource.",
            Some(format!("The attribute '{name}' on {owner} cannot be assigned to.")),
        ));
    }
    if state.request().write_operation == Some(WriteOperationKind::UpdateResource)
        && !capabilities.allow_change
    {
        return Err(ConversionError::new(
            &state.position,
            "Attribute value cannot be assigned when updating resource.",
            Some(format!("The attribute '{name}' on {owner} cannot be assigned to.")),
        ));
    }
    if attr.is_read_only() {
        return Err(ConversionError::new(
            &state.position,
            "Attribute is read-only.",
            Some(format!("Attribute '{name}' on {owner} is read-only.")),
        ));
    }
    Ok(())
}

/// Decodes and stores one attribute value, returning the targeted entry it
/// contributes. The position is already at the attribute.
fn apply_attribute(
    attr: &AttrDefinition,
    owner: &str,
    value: &Value,
    target: &mut dyn Any,
    state: &RequestAdapterState<'_>,
) -> Result<TargetedAttribute, ConversionError> {
    let name = attr.public_name();
    match attr.kind() {
        AttrKind::Primitive | AttrKind::PrimitiveCollection => {
            let set = match attr.setter() {
                Some(AttrSetter::Value(set)) => set,
                _ => return Err(accessor_out_of_sync(name, owner, state)),
            };
            set(target, value.clone()).map_err(|source| {
                incompatible_attribute(name, owner, &source.to_string(), state).with_source(source)
            })?;
            Ok(TargetedAttribute::leaf(name))
        }
        AttrKind::Compound(type_id) => {
            let set = match attr.setter() {
                Some(AttrSetter::Compound(set)) => set,
                _ => return Err(accessor_out_of_sync(name, owner, state)),
            };
            let compound = match state.graph.find_compound(type_id) {
                Some(compound) => compound,
                None => return Err(accessor_out_of_sync(name, owner, state)),
            };
            match value {
                Value::Null => {
                    set(target, None)
                        .map_err(|source| accessor_out_of_sync(name, owner, state).with_source(source))?;
                    Ok(TargetedAttribute::leaf(name))
                }
                Value::Object(map) => {
                    let (instance, children) = convert_compound_object(map, compound, state)?;
                    set(target, Some(instance))
                        .map_err(|source| accessor_out_of_sync(name, owner, state).with_source(source))?;
                    Ok(TargetedAttribute::with_children(name, children))
                }
                other => Err(incompatible_attribute(
                    name,
                    owner,
                    &format!("expected an object, found {}", json_shape_name(other)),
                    state,
                )),
            }
        }
        AttrKind::CompoundCollection(type_id) => {
            let set = match attr.setter() {
                Some(AttrSetter::CompoundCollection(set)) => set,
                _ => return Err(accessor_out_of_sync(name, owner, state)),
            };
            let compound = match state.graph.find_compound(type_id) {
                Some(compound) => compound,
                None => return Err(accessor_out_of_sync(name, owner, state)),
            };
            let items = match value {
                Value::Array(items) => items,
                other => {
                    return Err(incompatible_attribute(
                        name,
                        owner,
                        &format!("expected an array, found {}", json_shape_name(other)),
                        state,
                    ));
                }
            };

            let mut converted: Vec<Option<Box<dyn Any>>> = Vec::with_capacity(items.len());
            let mut children: Vec<TargetedAttribute> = Vec::new();
            for (index, item) in items.iter().enumerate() {
                let _guard = state.position.push_index(index);
                match item {
                    Value::Null => converted.push(None),
                    Value::Object(map) => {
                        let (instance, subtree) = convert_compound_object(map, compound, state)?;
                        for child in subtree {
                            TargetedAttribute::merge_into(&mut children, child);
                        }
                        converted.push(Some(instance));
                    }
                    other => {
                        return Err(incompatible_attribute(
                            name,
                            owner,
                            &format!(
                                "expected an object or null, found {}",
                                json_shape_name(other)
                            ),
                            state,
                        ));
                    }
                }
            }
            set(target, converted)
                .map_err(|source| accessor_out_of_sync(name, owner, state).with_source(source))?;
            Ok(TargetedAttribute::with_children(name, children))
        }
    }
}

/// Converts a nested object against a compound type's attribute table.
fn convert_compound_object(
    map: &Map<String, Value>,
    compound: &CompoundType,
    state: &RequestAdapterState<'_>,
) -> Result<(Box<dyn Any>, Vec<TargetedAttribute>), ConversionError> {
    let mut instance = compound.new_instance();
    let mut children: Vec<TargetedAttribute> = Vec::new();
    let owner = format!("type '{}'", compound.name());

    for (name, value) in map {
        let _guard = state.position.push_element(name.as_str());
        let attr = match compound.find_attribute(name) {
            Some(attr) => attr,
            None if state.options.allow_unknown_fields_in_request_body => {
                debug!("Skipped unknown attribute '{}' on {}", name, owner);
                continue;
            }
            None => {
                return Err(ConversionError::new(
                    &state.position,
                    "Unknown attribute found.",
                    Some(format!("Attribute '{name}' does not exist on {owner}.")),
                ));
            }
        };

        assert_attribute_change_allowed(attr, &owner, state)?;
        let targeted = apply_attribute(attr, &owner, value, instance.as_mut(), state)?;
        TargetedAttribute::merge_into(&mut children, targeted);
    }

    Ok((instance, children))
}

fn convert_relationships(
    relationships: &FieldMap<RelationshipObject>,
    resource: &mut dyn Identifiable,
    resource_type: &ResourceType,
    state: &mut RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    let _guard = state.position.push_element("relationships");
    for (name, relationship_object) in relationships.iter() {
        convert_relationship_entry(name, relationship_object, resource, resource_type, state)?;
    }
    Ok(())
}

fn convert_relationship_entry(
    name: &str,
    relationship_object: &RelationshipObject,
    resource: &mut dyn Identifiable,
    resource_type: &ResourceType,
    state: &mut RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    let _guard = state.position.push_element(name);

    let relationship = match resource_type.find_relationship(name) {
        Some(relationship) => relationship,
        None if state.options.allow_unknown_fields_in_request_body => {
            debug!(
                "Skipped unknown relationship '{}' on resource type '{}'",
                name,
                resource_type.public_name()
            );
            return Ok(());
        }
        None => {
            return Err(ConversionError::new(
                &state.position,
                "Unknown relationship found.",
                Some(format!(
                    "Relationship '{name}' does not exist on resource type '{}'.",
                    resource_type.public_name()
                )),
            ));
        }
    };

    assert_relationship_change_allowed(relationship, state)?;

    let value = convert_relationship_data(&relationship_object.data, relationship, true, state)?;
    store_relationship_value(relationship, resource, value, state)?;

    if let Some(fields) = state.writable_fields.as_mut() {
        fields.add_relationship(relationship.public_name());
    }
    Ok(())
}

/// Stores a converted relationship value through the registered accessor.
pub(crate) fn store_relationship_value(
    relationship: &RelationshipDefinition,
    resource: &mut dyn Identifiable,
    value: RelationshipValue,
    state: &RequestAdapterState<'_>,
) -> Result<(), ConversionError> {
    let owner = format!("resource type '{}'", relationship.left_type());
    let target: &mut dyn Any = resource;
    let result = match (relationship.setter(), value) {
        (RelationshipSetter::One(set), RelationshipValue::ToOne(value)) => set(target, value),
        (RelationshipSetter::Many(set), RelationshipValue::ToMany(values)) => set(target, values),
        // Cardinality of the converted value always matches the setter; both
        // derive from the same relationship definition.
        _ => return Err(accessor_out_of_sync(relationship.public_name(), &owner, state)),
    };

    result.map_err(|source| {
        accessor_out_of_sync(relationship.public_name(), &owner, state).with_source(source)
    })
}

fn incompatible_attribute(
    name: &str,
    owner: &str,
    reason: &str,
    state: &RequestAdapterState<'_>,
) -> ConversionError {
    ConversionError::new(
        &state.position,
        "Incompatible attribute value found.",
        Some(format!("Failed to convert attribute '{name}' on {owner}: {reason}")),
    )
}

/// Graph registration and setter kind disagree. Unreachable through
/// `ResourceGraphBuilder`, which keeps kinds and setters paired.
fn accessor_out_of_sync(
    name: &str,
    owner: &str,
    state: &RequestAdapterState<'_>,
) -> ConversionError {
    error!("Accessor for '{}' on {} is out of sync with its registration", name, owner);
    ConversionError::new(
        &state.position,
        "Internal conversion failure.",
        Some(format!("The registered accessor for '{name}' on {owner} cannot handle this value.")),
    )
    .with_status(500)
}
