//! Request-scoped value types: the request descriptor, the targeted-field
//! accumulator and the conversion options.

use std::fmt;

use crate::resource::Identifiable;

/// Endpoint category of the inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    /// Primary resource endpoint (`/workItems`, `/workItems/1`).
    #[default]
    Primary,
    /// Secondary endpoint returning related resources (`/workItems/1/assignee`).
    Secondary,
    /// Relationship endpoint (`/workItems/1/relationships/tags`).
    Relationship,
    /// The atomic-operations endpoint.
    AtomicOperations,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Primary => "primary",
            RequestKind::Secondary => "secondary",
            RequestKind::Relationship => "relationship",
            RequestKind::AtomicOperations => "atomic-operations",
        }
    }
}

/// The write a request performs, either fixed by routing or classified from
/// an operation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperationKind {
    CreateResource,
    UpdateResource,
    DeleteResource,
    SetRelationship,
    AddToRelationship,
    RemoveFromRelationship,
}

impl WriteOperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOperationKind::CreateResource => "create-resource",
            WriteOperationKind::UpdateResource => "update-resource",
            WriteOperationKind::DeleteResource => "delete-resource",
            WriteOperationKind::SetRelationship => "set-relationship",
            WriteOperationKind::AddToRelationship => "add-to-relationship",
            WriteOperationKind::RemoveFromRelationship => "remove-from-relationship",
        }
    }
}

impl fmt::Display for WriteOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes the inbound request: what routing resolved, refined while the
/// document converts. Downstream layers branch on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonApiRequest {
    pub kind: RequestKind,
    pub write_operation: Option<WriteOperationKind>,
    pub primary_resource_type: Option<String>,
    pub primary_id: Option<String>,
    pub secondary_resource_type: Option<String>,
    pub relationship: Option<String>,
    pub is_collection: bool,
}

/// One targeted attribute. Compound attributes carry the nested fields that
/// appeared under them, so the full structure is a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetedAttribute {
    pub name: String,
    pub children: Vec<TargetedAttribute>,
}

impl TargetedAttribute {
    pub fn leaf(name: impl Into<String>) -> TargetedAttribute {
        TargetedAttribute {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(
        name: impl Into<String>,
        children: Vec<TargetedAttribute>,
    ) -> TargetedAttribute {
        TargetedAttribute {
            name: name.into(),
            children,
        }
    }

    /// Merges a target into a sibling list. An existing node with the same
    /// name absorbs the incoming children recursively instead of being
    /// duplicated.
    pub fn merge_into(list: &mut Vec<TargetedAttribute>, target: TargetedAttribute) {
        match list.iter_mut().find(|existing| existing.name == target.name) {
            Some(existing) => {
                for child in target.children {
                    TargetedAttribute::merge_into(&mut existing.children, child);
                }
            }
            None => list.push(target),
        }
    }
}

/// The fields that actually appeared in the request body, used by the write
/// layer to know what to persist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetedFields {
    pub attributes: Vec<TargetedAttribute>,
    pub relationships: Vec<String>,
}

impl TargetedFields {
    pub fn new() -> TargetedFields {
        TargetedFields::default()
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
        self.relationships.clear();
    }

    pub fn add_attribute(&mut self, target: TargetedAttribute) {
        TargetedAttribute::merge_into(&mut self.attributes, target);
    }

    pub fn add_relationship(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.relationships.contains(&name) {
            self.relationships.push(name);
        }
    }
}

/// Converted form of one atomic operation entry: the affected resource, the
/// fields its body targeted, and the per-entry request descriptor.
pub struct OperationContainer {
    pub resource: Box<dyn Identifiable>,
    pub targeted_fields: TargetedFields,
    pub request: JsonApiRequest,
}

impl fmt::Debug for OperationContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContainer")
            .field("resource_id", &self.resource.string_id())
            .field("resource_local_id", &self.resource.local_id())
            .field("targeted_fields", &self.targeted_fields)
            .field("request", &self.request)
            .finish()
    }
}

/// Behavior switches for document conversion.
///
/// ```
/// use jsonapi_adapter::JsonApiOptions;
///
/// let options = JsonApiOptions::new()
///     .allow_client_generated_ids(true)
///     .maximum_operations_per_request(Some(25));
/// assert!(!options.allow_unknown_fields_in_request_body);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JsonApiOptions {
    /// Accept client-supplied `id` values when creating resources.
    pub allow_client_generated_ids: bool,
    /// Skip unknown attributes and relationships instead of rejecting them.
    pub allow_unknown_fields_in_request_body: bool,
    /// Upper bound on entries per atomic-operations request; `None` lifts
    /// the limit.
    pub maximum_operations_per_request: Option<usize>,
}

impl Default for JsonApiOptions {
    fn default() -> JsonApiOptions {
        JsonApiOptions {
            allow_client_generated_ids: false,
            allow_unknown_fields_in_request_body: false,
            maximum_operations_per_request: Some(10),
        }
    }
}

impl JsonApiOptions {
    pub fn new() -> JsonApiOptions {
        JsonApiOptions::default()
    }

    pub fn allow_client_generated_ids(mut self, allow: bool) -> JsonApiOptions {
        self.allow_client_generated_ids = allow;
        self
    }

    pub fn allow_unknown_fields(mut self, allow: bool) -> JsonApiOptions {
        self.allow_unknown_fields_in_request_body = allow;
        self
    }

    pub fn maximum_operations_per_request(mut self, maximum: Option<usize>) -> JsonApiOptions {
        self.maximum_operations_per_request = maximum;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        let options = JsonApiOptions::new();
        assert!(!options.allow_client_generated_ids);
        assert!(!options.allow_unknown_fields_in_request_body);
        assert_eq!(options.maximum_operations_per_request, Some(10));
    }

    #[test]
    fn options_builder_chains() {
        let options = JsonApiOptions::new()
            .allow_client_generated_ids(true)
            .allow_unknown_fields(true)
            .maximum_operations_per_request(None);

        assert!(options.allow_client_generated_ids);
        assert!(options.allow_unknown_fields_in_request_body);
        assert_eq!(options.maximum_operations_per_request, None);
    }

    #[test]
    fn targeted_relationships_deduplicate() {
        let mut fields = TargetedFields::new();
        fields.add_relationship("tags");
        fields.add_relationship("assignee");
        fields.add_relationship("tags");

        assert_eq!(fields.relationships, ["tags", "assignee"]);
    }

    #[test]
    fn targeted_attribute_merge_unions_children() {
        let mut fields = TargetedFields::new();
        fields.add_attribute(TargetedAttribute::with_children(
            "address",
            vec![TargetedAttribute::leaf("street")],
        ));
        fields.add_attribute(TargetedAttribute::with_children(
            "address",
            vec![
                TargetedAttribute::leaf("street"),
                TargetedAttribute::leaf("city"),
            ],
        ));
        fields.add_attribute(TargetedAttribute::leaf("title"));

        assert_eq!(fields.attributes.len(), 2);
        let address = &fields.attributes[0];
        assert_eq!(address.name, "address");
        let children: Vec<&str> = address.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(children, ["street", "city"]);
    }

    #[test]
    fn merge_recurses_into_nested_children() {
        let mut list = Vec::new();
        TargetedAttribute::merge_into(
            &mut list,
            TargetedAttribute::with_children(
                "address",
                vec![TargetedAttribute::with_children(
                    "geo",
                    vec![TargetedAttribute::leaf("lat")],
                )],
            ),
        );
        TargetedAttribute::merge_into(
            &mut list,
            TargetedAttribute::with_children(
                "address",
                vec![TargetedAttribute::with_children(
                    "geo",
                    vec![TargetedAttribute::leaf("lon")],
                )],
            ),
        );

        let geo = &list[0].children[0];
        let leaves: Vec<&str> = geo.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(leaves, ["lat", "lon"]);
    }

    #[test]
    fn clear_resets_both_sets() {
        let mut fields = TargetedFields::new();
        fields.add_attribute(TargetedAttribute::leaf("title"));
        fields.add_relationship("tags");

        fields.clear();
        assert_eq!(fields, TargetedFields::new());
    }
}
