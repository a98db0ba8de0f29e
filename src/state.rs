//! Mutable state threaded through one document conversion.

use crate::graph::ResourceGraph;
use crate::position::PositionTracker;
use crate::request::{JsonApiOptions, JsonApiRequest, RequestKind, TargetedFields};
use crate::resource::ResourceDefinitionAccessor;

/// Everything the conversion steps share: the graph and options, the
/// position tracker, and the request description being refined.
///
/// The request and targeted fields injected by the caller stay untouched
/// while conversion works on writable copies; [`flush_injectables`] publishes
/// the copies. For operations requests a backup of the injected values is
/// taken up front and restored on drop, so the caller's view of the overall
/// request survives the per-operation overwrites.
///
/// [`flush_injectables`]: RequestAdapterState::flush_injectables
pub(crate) struct RequestAdapterState<'a> {
    pub(crate) graph: &'a ResourceGraph,
    pub(crate) options: &'a JsonApiOptions,
    pub(crate) definitions: &'a ResourceDefinitionAccessor,
    pub(crate) position: PositionTracker,
    injected_request: &'a mut JsonApiRequest,
    injected_fields: &'a mut TargetedFields,
    pub(crate) writable_request: Option<JsonApiRequest>,
    pub(crate) writable_fields: Option<TargetedFields>,
    backup: Option<(JsonApiRequest, TargetedFields)>,
}

impl<'a> RequestAdapterState<'a> {
    pub(crate) fn new(
        graph: &'a ResourceGraph,
        options: &'a JsonApiOptions,
        definitions: &'a ResourceDefinitionAccessor,
        request: &'a mut JsonApiRequest,
        targeted_fields: &'a mut TargetedFields,
    ) -> RequestAdapterState<'a> {
        let backup = (request.kind == RequestKind::AtomicOperations)
            .then(|| (request.clone(), targeted_fields.clone()));

        RequestAdapterState {
            graph,
            options,
            definitions,
            position: PositionTracker::new(),
            injected_request: request,
            injected_fields: targeted_fields,
            writable_request: None,
            writable_fields: None,
            backup,
        }
    }

    /// The request being refined: the writable copy once one exists,
    /// otherwise the injected original.
    pub(crate) fn request(&self) -> &JsonApiRequest {
        self.writable_request.as_ref().unwrap_or(self.injected_request)
    }

    /// Copies the writable request and targeted fields into the injected
    /// instances, making them visible outside the adapter.
    pub(crate) fn flush_injectables(&mut self) {
        if let Some(request) = &self.writable_request {
            self.injected_request.clone_from(request);
        }
        if let Some(fields) = &self.writable_fields {
            self.injected_fields.clone_from(fields);
        }
    }
}

impl Drop for RequestAdapterState<'_> {
    fn drop(&mut self) {
        if let Some((request, fields)) = self.backup.take() {
            *self.injected_request = request;
            *self.injected_fields = fields;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceGraphBuilder;
    use crate::request::WriteOperationKind;

    fn empty_graph() -> ResourceGraph {
        ResourceGraphBuilder::new().build().unwrap()
    }

    #[test]
    fn request_falls_back_to_injected() {
        let graph = empty_graph();
        let options = JsonApiOptions::default();
        let definitions = ResourceDefinitionAccessor::new();
        let mut request = JsonApiRequest {
            kind: RequestKind::Primary,
            write_operation: Some(WriteOperationKind::CreateResource),
            ..JsonApiRequest::default()
        };
        let mut fields = TargetedFields::new();

        let mut state =
            RequestAdapterState::new(&graph, &options, &definitions, &mut request, &mut fields);
        assert_eq!(
            state.request().write_operation,
            Some(WriteOperationKind::CreateResource)
        );

        state.writable_request = Some(JsonApiRequest {
            kind: RequestKind::Primary,
            write_operation: Some(WriteOperationKind::UpdateResource),
            ..JsonApiRequest::default()
        });
        assert_eq!(
            state.request().write_operation,
            Some(WriteOperationKind::UpdateResource)
        );
    }

    #[test]
    fn flush_publishes_writable_copies() {
        let graph = empty_graph();
        let options = JsonApiOptions::default();
        let definitions = ResourceDefinitionAccessor::new();
        let mut request = JsonApiRequest::default();
        let mut fields = TargetedFields::new();

        {
            let mut state =
                RequestAdapterState::new(&graph, &options, &definitions, &mut request, &mut fields);
            state.writable_request = Some(JsonApiRequest {
                kind: RequestKind::Primary,
                primary_resource_type: Some("workItems".to_owned()),
                ..JsonApiRequest::default()
            });
            let mut targeted = TargetedFields::new();
            targeted.add_relationship("assignee");
            state.writable_fields = Some(targeted);
            state.flush_injectables();
        }

        assert_eq!(request.primary_resource_type.as_deref(), Some("workItems"));
        assert_eq!(fields.relationships, ["assignee"]);
    }

    #[test]
    fn drop_restores_backup_for_operations_requests() {
        let graph = empty_graph();
        let options = JsonApiOptions::default();
        let definitions = ResourceDefinitionAccessor::new();
        let mut request = JsonApiRequest {
            kind: RequestKind::AtomicOperations,
            ..JsonApiRequest::default()
        };
        let mut fields = TargetedFields::new();

        {
            let mut state =
                RequestAdapterState::new(&graph, &options, &definitions, &mut request, &mut fields);
            state.writable_request = Some(JsonApiRequest {
                kind: RequestKind::AtomicOperations,
                write_operation: Some(WriteOperationKind::DeleteResource),
                primary_resource_type: Some("tags".to_owned()),
                ..JsonApiRequest::default()
            });
            state.flush_injectables();
        }

        // The per-operation overwrite is rolled back once conversion ends.
        assert_eq!(request.kind, RequestKind::AtomicOperations);
        assert_eq!(request.write_operation, None);
        assert_eq!(request.primary_resource_type, None);
    }

    #[test]
    fn drop_keeps_flushed_state_for_single_requests() {
        let graph = empty_graph();
        let options = JsonApiOptions::default();
        let definitions = ResourceDefinitionAccessor::new();
        let mut request = JsonApiRequest {
            kind: RequestKind::Primary,
            ..JsonApiRequest::default()
        };
        let mut fields = TargetedFields::new();

        {
            let mut state =
                RequestAdapterState::new(&graph, &options, &definitions, &mut request, &mut fields);
            let mut targeted = TargetedFields::new();
            targeted.add_relationship("tags");
            state.writable_fields = Some(targeted);
            state.flush_injectables();
        }

        assert_eq!(fields.relationships, ["tags"]);
    }
}
