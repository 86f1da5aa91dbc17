//! Generated tfplugin6 messages and the `Provider` gRPC service
//!
//! `build.rs` compiles `proto/tfplugin6.proto` with tonic-build (server side
//! only). The file keeps upstream field numbers but carries only the RPCs this
//! framework answers; the rest reach Terraform as `Unimplemented`.
//!
//! Several generated names (`DynamicValue`, `Diagnostic`, `AttributePath`,
//! `Schema`) clash with framework types, so callers go through `proto::`.
//! Per-RPC messages live in snake_case modules such as
//! `read_resource::Request`.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_messages_follow_rpc_names() {
        let request = upgrade_resource_state::Request {
            type_name: "azurerm_example".to_string(),
            version: 0,
            raw_state: Some(RawState {
                json: br#"{"id":"x"}"#.to_vec(),
                flatmap: Default::default(),
            }),
        };
        assert_eq!(request.raw_state.unwrap().json, br#"{"id":"x"}"#.to_vec());
    }

    #[test]
    fn nesting_modes_keep_upstream_numbers() {
        assert_eq!(schema::nested_block::NestingMode::Invalid as i32, 0);
        assert_eq!(schema::nested_block::NestingMode::Single as i32, 1);
        assert_eq!(schema::nested_block::NestingMode::List as i32, 2);
        assert_eq!(schema::nested_block::NestingMode::Set as i32, 3);
    }

    #[test]
    fn severity_defaults_to_invalid() {
        assert_eq!(Diagnostic::default().severity(), diagnostic::Severity::Invalid);
    }
}
