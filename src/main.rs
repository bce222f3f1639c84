//! `protoc` plugin generating Uplink C++ client bindings.
//!
//! `protoc` hands the plugin one serialized `CodeGeneratorRequest` on
//! stdin and expects one serialized `CodeGeneratorResponse` on stdout.
//! Generation problems travel inside the response's error field; the
//! exit status only signals that no well-formed response could be
//! produced at all.

mod collection;
mod dump;
mod generator;
mod options;
mod params;

use std::io::{stderr, stdin, stdout, Read, Write};

use anyhow::Result;
use protobuf::plugin::code_generator_response::Feature;
use protobuf::plugin::{CodeGeneratorRequest, CodeGeneratorResponse};
use protobuf::Message;
use tracing::{debug, Level};

use params::GeneratorParams;

/// Bitwise union of supported features.
/// https://github.com/protocolbuffers/protobuf/blob/v31.1/src/google/protobuf/compiler/code_generator.h#L96
const SUPPORTED_FEATURES: u64 = Feature::FEATURE_PROTO3_OPTIONAL as u64;

fn main() -> Result<()> {
    // stdout carries the response, so diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(stderr)
        .with_max_level(Level::INFO)
        .init();

    // Read and parse the entire input from stdin.
    // If an error occurs here, exit with a failure status:
    // without a decoded request there is no meaningful response to write.
    let mut buf: Vec<u8> = Vec::new();
    stdin().read_to_end(&mut buf)?;
    let request = CodeGeneratorRequest::parse_from_bytes(&buf)?;

    let response = respond(&request);

    // Write the response to stdout, exactly once.
    // A response carrying an error string still exits successfully;
    // the invoking compiler inspects the payload, not the exit status.
    write_response(&response)
}

/// Turn one request into one response.
/// Analysis failures land in the response's error field instead of
/// unwinding; on that path no generation is attempted.
fn respond(request: &CodeGeneratorRequest) -> CodeGeneratorResponse {
    let params = GeneratorParams::parse(request.parameter.as_deref());
    debug!(?params, "Parsed plugin parameters");

    let mut response = CodeGeneratorResponse::new();
    response.set_supported_features(SUPPORTED_FEATURES);

    match collection::analyze(request) {
        Ok(collection) => {
            for file in &collection.files {
                response.file.extend(generator::generate(file, &params));
            }
            if params.dump_request {
                response
                    .file
                    .extend(dump::dump_request(request, &collection.input_file_names));
            }
            if params.dump_collection {
                response
                    .file
                    .extend(dump::dump_collection(&collection, &collection.input_file_names));
            }
            debug!(files = response.file.len(), "Generation complete");
        }
        Err(error) => response.set_error(error.to_string()),
    }

    response
}

/// Serialize the response and write every byte of it to stdout.
fn write_response(response: &CodeGeneratorResponse) -> Result<()> {
    let encoded = response.write_to_bytes()?;
    let mut out = stdout();
    out.write_all(&encoded)?;
    out.flush()?;
    Ok(())
}
