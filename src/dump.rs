//! Diagnostic JSON dumps attached to the response.
//!
//! Dumps are plain generated files, so they land in the output directory
//! next to the real bindings. A dump that fails to render is logged and
//! dropped; diagnostics never fail the invocation.

use protobuf::plugin::code_generator_response::File;
use protobuf::plugin::CodeGeneratorRequest;
use tracing::warn;

use crate::collection::ServiceCollection;

/// Render the raw request as indented JSON, named `<prefix>request.json`.
pub fn dump_request(request: &CodeGeneratorRequest, prefix: &str) -> Option<File> {
    let json = match protobuf_json_mapping::print_to_string(request) {
        Ok(json) => json,
        Err(error) => {
            warn!(%error, "Skipping request dump");
            return None;
        }
    };
    Some(dump_file(format!("{prefix}request.json"), reindent(&json)))
}

/// Render the analyzed collection as indented JSON,
/// named `<prefix>collection.json`.
pub fn dump_collection(collection: &ServiceCollection, prefix: &str) -> Option<File> {
    match serde_json::to_string_pretty(collection) {
        Ok(json) => Some(dump_file(format!("{prefix}collection.json"), json)),
        Err(error) => {
            warn!(%error, "Skipping collection dump");
            None
        }
    }
}

fn dump_file(name: String, content: String) -> File {
    let mut file = File::new();
    file.set_name(name);
    file.set_content(content);
    file
}

/// Re-indent a compact JSON document.
/// protobuf's JSON printer has no pretty mode, so round-trip through
/// a generic value. Falls back to the compact form if that fails.
fn reindent(json: &str) -> String {
    serde_json::from_str::<serde_json::Value>(json)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| json.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use protobuf::descriptor::FileDescriptorProto;

    #[test]
    fn request_dump_is_named_from_the_prefix() {
        let request = CodeGeneratorRequest {
            file_to_generate: vec!["hello/greeter.proto".into()],
            proto_file: vec![FileDescriptorProto {
                name: Some("hello/greeter.proto".into()),
                package: Some("hello".into()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let file = dump_request(&request, "greeter_").unwrap();

        assert_eq!(file.name(), "greeter_request.json");
        assert!(file.content().contains("hello/greeter.proto"));
        // Indented, not the compact printer output.
        assert!(file.content().contains('\n'));
    }

    #[test]
    fn collection_dump_includes_the_analyzed_model() {
        let collection = ServiceCollection {
            input_file_names: "greeter_".into(),
            files: Vec::new(),
        };

        let file = dump_collection(&collection, "greeter_").unwrap();

        assert_eq!(file.name(), "greeter_collection.json");
        assert!(file.content().contains("input_file_names"));
    }

    #[test]
    fn reindent_falls_back_on_invalid_json() {
        assert_eq!(reindent("not json"), "not json");
        assert_eq!(reindent("{\"a\":1}"), "{\n  \"a\": 1\n}");
    }
}
