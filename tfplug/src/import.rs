//! Import by ID

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Seeds an imported state holding only the import ID at `path`
///
/// Terraform refreshes the resource right after import, so the read fills
/// in everything else from the ID.
pub fn import_state_passthrough_id(
    _ctx: &Context,
    path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::object();
    match state.set_string(&path, request.id.clone()) {
        Ok(()) => response.imported_resources.push(ImportedResource {
            type_name: request.type_name.clone(),
            state,
            private: Vec::new(),
        }),
        Err(e) => response.diagnostics.push(
            Diagnostic::error("Unable to import", format!("storing {:?}: {}", request.id, e))
                .with_attribute(path),
        ),
    }
}
