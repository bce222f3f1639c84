//! Rendering analyzed service files into C++ binding headers.

use std::fmt::{Display, Formatter, Result as FmtResult};

use heck::ToUpperCamelCase;
use protobuf::plugin::code_generator_response::File;

use crate::collection::{
    Cardinality, EnumBinding, FieldBinding, FieldType, MessageBinding, OneofBinding,
    ServiceBinding, ServiceFile,
};
use crate::params::GeneratorParams;

const INDENTATION: &str = "  ";

/// Render the output files for one analyzed `.proto` file.
///
/// All validation happened during analysis; rendering cannot fail.
/// Output names derive from the proto file's stem, so two analyzed files
/// can only collide if their inputs did; collisions pass through to the
/// invoking compiler untouched.
pub fn generate(file: &ServiceFile, params: &GeneratorParams) -> Vec<File> {
    let mut files = Vec::new();
    if params.generate_service_code {
        files.push(response_file(
            format!("{}.uplink.h", file.stem),
            BindingHeader(file).to_string(),
        ));
    }
    if params.generate_json_code {
        files.push(response_file(
            format!("{}.uplink.json.h", file.stem),
            JsonHeader(file).to_string(),
        ));
    }
    files
}

fn response_file(name: String, content: String) -> File {
    let mut file = File::new();
    file.set_name(name);
    file.set_content(content);
    file
}

/// The `<stem>.uplink.h` binding header:
/// enums, then binding structs, then one client class per service.
struct BindingHeader<'a>(&'a ServiceFile);

/// The `<stem>.uplink.json.h` helper header:
/// `ToJson` / `FromJson` declarations per binding struct.
struct JsonHeader<'a>(&'a ServiceFile);

struct EnumDecl<'a>(&'a EnumBinding);

struct MessageDecl<'a>(&'a MessageBinding);

/// The case enum nested in a binding struct for one oneof.
/// Enumerator values are the members' field numbers.
struct OneofCaseEnum<'a> {
    oneof: &'a OneofBinding,
    message: &'a MessageBinding,
}

struct ServiceDecl<'a>(&'a ServiceBinding);

impl Display for BindingHeader<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let file = self.0;
        formatter.write_str("// Generated by protoc-gen-uplink. Do not edit.\n")?;
        formatter.write_str("#pragma once\n\n")?;
        formatter.write_str("#include <cstdint>\n")?;
        formatter.write_str("#include <optional>\n")?;
        formatter.write_str("#include <string>\n")?;
        formatter.write_str("#include <vector>\n\n")?;
        formatter.write_str("#include \"uplink/client.h\"\n")?;

        write!(formatter, "\nnamespace {} {{\n", file.namespace)?;
        for r#enum in &file.enums {
            write!(formatter, "\n{}", EnumDecl(r#enum))?;
        }
        for message in &file.messages {
            write!(formatter, "\n{}", MessageDecl(message))?;
        }
        for service in &file.services {
            write!(formatter, "\n{}", ServiceDecl(service))?;
        }
        write!(formatter, "\n}}  // namespace {}\n", file.namespace)
    }
}

impl Display for EnumDecl<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "enum class {} : std::int32_t {{\n", self.0.name)?;
        for value in &self.0.values {
            write!(formatter, "{}{} = {},\n", INDENTATION, value.name, value.number)?;
        }
        formatter.write_str("};\n")
    }
}

impl Display for MessageDecl<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let message = self.0;
        if message.scriptable {
            write!(formatter, "UPLINK_SCRIPT_TYPE({})\n", message.name)?;
        }
        if message.fields.is_empty() && message.oneofs.is_empty() {
            return write!(formatter, "struct {} {{}};\n", message.name);
        }

        write!(formatter, "struct {} {{\n", message.name)?;
        for oneof in &message.oneofs {
            write!(formatter, "{}", OneofCaseEnum { oneof, message })?;
        }
        if !message.oneofs.is_empty() {
            formatter.write_str("\n")?;
        }
        for field in &message.fields {
            if message.scriptable && field.scriptable {
                write!(formatter, "{}UPLINK_SCRIPT_FIELD()\n", INDENTATION)?;
            }
            write!(formatter, "{}{} {};\n", INDENTATION, cpp_type(field), field.name)?;
        }
        formatter.write_str("};\n")
    }
}

impl Display for OneofCaseEnum<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let case_name = format!("{}Case", self.oneof.name.to_upper_camel_case());
        write!(
            formatter,
            "{}// At most one of the `{}` members is set.\n",
            INDENTATION, self.oneof.name,
        )?;
        if self.message.scriptable && self.oneof.scriptable {
            write!(formatter, "{}UPLINK_SCRIPT_ENUM({})\n", INDENTATION, case_name)?;
        }
        write!(
            formatter,
            "{}enum class {} : std::int32_t {{\n",
            INDENTATION, case_name,
        )?;
        write!(formatter, "{}{}kNone = 0,\n", INDENTATION, INDENTATION)?;
        for member in &self.oneof.members {
            write!(
                formatter,
                "{}{}k{} = {},\n",
                INDENTATION,
                INDENTATION,
                member.name.to_upper_camel_case(),
                member.number,
            )?;
        }
        write!(formatter, "{}}};\n", INDENTATION)
    }
}

impl Display for ServiceDecl<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let service = self.0;
        let client = format!("{}Client", service.name.to_upper_camel_case());
        write!(formatter, "class {client} {{\n public:\n")?;
        write!(
            formatter,
            "{}explicit {client}(::uplink::Channel& channel);\n",
            INDENTATION,
        )?;
        if !service.methods.is_empty() {
            formatter.write_str("\n")?;
            for method in &service.methods {
                let name = &method.name;
                let input = &method.input_type;
                let output = &method.output_type;
                formatter.write_str(INDENTATION)?;
                match (method.client_streaming, method.server_streaming) {
                    (false, false) => {
                        write!(formatter, "::uplink::Call<{output}> {name}(const {input}& request);")?
                    }
                    (false, true) => write!(
                        formatter,
                        "::uplink::ServerStream<{output}> {name}(const {input}& request);",
                    )?,
                    (true, false) => {
                        write!(formatter, "::uplink::ClientStream<{input}, {output}> {name}();")?
                    }
                    (true, true) => {
                        write!(formatter, "::uplink::BidiStream<{input}, {output}> {name}();")?
                    }
                }
                formatter.write_str("\n")?;
            }
        }
        formatter.write_str("\n private:\n")?;
        write!(formatter, "{}::uplink::Channel& channel_;\n}};\n", INDENTATION)
    }
}

impl Display for JsonHeader<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let file = self.0;
        formatter.write_str("// Generated by protoc-gen-uplink. Do not edit.\n")?;
        formatter.write_str("#pragma once\n\n")?;
        formatter.write_str("#include <string>\n")?;
        formatter.write_str("#include <string_view>\n\n")?;
        write!(formatter, "#include \"{}.uplink.h\"\n", file.stem)?;

        write!(formatter, "\nnamespace {} {{\n", file.namespace)?;
        for message in &file.messages {
            write!(formatter, "\nstd::string ToJson(const {}& value);\n", message.name)?;
            write!(
                formatter,
                "bool FromJson(std::string_view json, {}& value);\n",
                message.name,
            )?;
        }
        write!(formatter, "\n}}  // namespace {}\n", file.namespace)
    }
}

fn cpp_type(field: &FieldBinding) -> String {
    let base = match &field.r#type {
        FieldType::Double => "double",
        FieldType::Float => "float",
        FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => "std::int32_t",
        FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => "std::int64_t",
        FieldType::Uint32 | FieldType::Fixed32 => "std::uint32_t",
        FieldType::Uint64 | FieldType::Fixed64 => "std::uint64_t",
        FieldType::Bool => "bool",
        FieldType::String => "std::string",
        FieldType::Bytes => "std::string",
        FieldType::Named(name) => name.as_str(),
    };
    match field.cardinality {
        Cardinality::Singular => base.to_string(),
        Cardinality::Optional => format!("std::optional<{base}>"),
        Cardinality::Repeated => format!("std::vector<{base}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::collection::{EnumValueBinding, MethodBinding, OneofMember};

    fn greeter_file() -> ServiceFile {
        ServiceFile {
            proto_name: "hello/greeter.proto".into(),
            stem: "hello/greeter".into(),
            package: "hello".into(),
            namespace: "hello".into(),
            services: vec![ServiceBinding {
                name: "Greeter".into(),
                methods: vec![MethodBinding {
                    name: "SayHello".into(),
                    input_type: "HelloRequest".into(),
                    output_type: "HelloReply".into(),
                    client_streaming: false,
                    server_streaming: false,
                }],
            }],
            messages: vec![
                MessageBinding {
                    name: "HelloRequest".into(),
                    scriptable: true,
                    fields: vec![FieldBinding {
                        name: "name".into(),
                        number: 1,
                        r#type: FieldType::String,
                        cardinality: Cardinality::Singular,
                        oneof: None,
                        scriptable: true,
                    }],
                    oneofs: vec![],
                },
                MessageBinding {
                    name: "HelloReply".into(),
                    scriptable: false,
                    fields: vec![FieldBinding {
                        name: "message".into(),
                        number: 1,
                        r#type: FieldType::String,
                        cardinality: Cardinality::Singular,
                        oneof: None,
                        scriptable: true,
                    }],
                    oneofs: vec![],
                },
            ],
            enums: vec![],
        }
    }

    #[test]
    fn binding_header_for_a_unary_service() {
        let header = BindingHeader(&greeter_file()).to_string();

        assert_eq!(
            header,
            r#"// Generated by protoc-gen-uplink. Do not edit.
#pragma once

#include <cstdint>
#include <optional>
#include <string>
#include <vector>

#include "uplink/client.h"

namespace hello {

UPLINK_SCRIPT_TYPE(HelloRequest)
struct HelloRequest {
  UPLINK_SCRIPT_FIELD()
  std::string name;
};

struct HelloReply {
  std::string message;
};

class GreeterClient {
 public:
  explicit GreeterClient(::uplink::Channel& channel);

  ::uplink::Call<HelloReply> SayHello(const HelloRequest& request);

 private:
  ::uplink::Channel& channel_;
};

}  // namespace hello
"#,
        );
    }

    #[test]
    fn binding_header_with_enums_oneofs_and_streaming() {
        let file = ServiceFile {
            proto_name: "hello/world/relay.proto".into(),
            stem: "hello/world/relay".into(),
            package: "hello.world".into(),
            namespace: "hello::world".into(),
            services: vec![ServiceBinding {
                name: "Relay".into(),
                methods: vec![
                    MethodBinding {
                        name: "Check".into(),
                        input_type: "Result".into(),
                        output_type: "Result".into(),
                        client_streaming: false,
                        server_streaming: false,
                    },
                    MethodBinding {
                        name: "Watch".into(),
                        input_type: "Result".into(),
                        output_type: "Result".into(),
                        client_streaming: false,
                        server_streaming: true,
                    },
                    MethodBinding {
                        name: "Upload".into(),
                        input_type: "Result".into(),
                        output_type: "Result".into(),
                        client_streaming: true,
                        server_streaming: false,
                    },
                    MethodBinding {
                        name: "Chat".into(),
                        input_type: "Result".into(),
                        output_type: "Result".into(),
                        client_streaming: true,
                        server_streaming: true,
                    },
                ],
            }],
            messages: vec![MessageBinding {
                name: "Result".into(),
                scriptable: true,
                fields: vec![
                    FieldBinding {
                        name: "ok".into(),
                        number: 1,
                        r#type: FieldType::String,
                        cardinality: Cardinality::Optional,
                        oneof: Some("outcome".into()),
                        scriptable: true,
                    },
                    FieldBinding {
                        name: "error".into(),
                        number: 2,
                        r#type: FieldType::String,
                        cardinality: Cardinality::Optional,
                        oneof: Some("outcome".into()),
                        scriptable: false,
                    },
                    FieldBinding {
                        name: "note".into(),
                        number: 3,
                        r#type: FieldType::Int32,
                        cardinality: Cardinality::Optional,
                        oneof: None,
                        scriptable: true,
                    },
                ],
                oneofs: vec![OneofBinding {
                    name: "outcome".into(),
                    scriptable: true,
                    members: vec![
                        OneofMember {
                            name: "ok".into(),
                            number: 1,
                        },
                        OneofMember {
                            name: "error".into(),
                            number: 2,
                        },
                    ],
                }],
            }],
            enums: vec![EnumBinding {
                name: "Mood".into(),
                values: vec![
                    EnumValueBinding {
                        name: "MOOD_UNSPECIFIED".into(),
                        number: 0,
                    },
                    EnumValueBinding {
                        name: "MOOD_HAPPY".into(),
                        number: 1,
                    },
                ],
            }],
        };

        assert_eq!(
            BindingHeader(&file).to_string(),
            r#"// Generated by protoc-gen-uplink. Do not edit.
#pragma once

#include <cstdint>
#include <optional>
#include <string>
#include <vector>

#include "uplink/client.h"

namespace hello::world {

enum class Mood : std::int32_t {
  MOOD_UNSPECIFIED = 0,
  MOOD_HAPPY = 1,
};

UPLINK_SCRIPT_TYPE(Result)
struct Result {
  // At most one of the `outcome` members is set.
  UPLINK_SCRIPT_ENUM(OutcomeCase)
  enum class OutcomeCase : std::int32_t {
    kNone = 0,
    kOk = 1,
    kError = 2,
  };

  UPLINK_SCRIPT_FIELD()
  std::optional<std::string> ok;
  std::optional<std::string> error;
  UPLINK_SCRIPT_FIELD()
  std::optional<std::int32_t> note;
};

class RelayClient {
 public:
  explicit RelayClient(::uplink::Channel& channel);

  ::uplink::Call<Result> Check(const Result& request);
  ::uplink::ServerStream<Result> Watch(const Result& request);
  ::uplink::ClientStream<Result, Result> Upload();
  ::uplink::BidiStream<Result, Result> Chat();

 private:
  ::uplink::Channel& channel_;
};

}  // namespace hello::world
"#,
        );
    }

    #[test]
    fn json_header_declares_helpers_per_message() {
        assert_eq!(
            JsonHeader(&greeter_file()).to_string(),
            r#"// Generated by protoc-gen-uplink. Do not edit.
#pragma once

#include <string>
#include <string_view>

#include "hello/greeter.uplink.h"

namespace hello {

std::string ToJson(const HelloRequest& value);
bool FromJson(std::string_view json, HelloRequest& value);

std::string ToJson(const HelloReply& value);
bool FromJson(std::string_view json, HelloReply& value);

}  // namespace hello
"#,
        );
    }

    #[test]
    fn flags_select_the_output_files() {
        let file = greeter_file();

        let both = generate(
            &file,
            &GeneratorParams {
                generate_json_code: true,
                ..GeneratorParams::default()
            },
        );
        let names: Vec<&str> = both.iter().map(|file| file.name()).collect();
        assert_eq!(names, ["hello/greeter.uplink.h", "hello/greeter.uplink.json.h"]);

        let neither = generate(
            &file,
            &GeneratorParams {
                generate_service_code: false,
                ..GeneratorParams::default()
            },
        );
        assert!(neither.is_empty());
    }

    #[test]
    fn scalar_types_map_to_fixed_width_cpp_types() {
        let field = |r#type, cardinality| FieldBinding {
            name: "x".into(),
            number: 1,
            r#type,
            cardinality,
            oneof: None,
            scriptable: true,
        };

        assert_eq!(cpp_type(&field(FieldType::Sfixed64, Cardinality::Singular)), "std::int64_t");
        assert_eq!(
            cpp_type(&field(FieldType::Uint32, Cardinality::Repeated)),
            "std::vector<std::uint32_t>",
        );
        assert_eq!(
            cpp_type(&field(FieldType::Named("HelloReply".into()), Cardinality::Optional)),
            "std::optional<HelloReply>",
        );
        assert_eq!(cpp_type(&field(FieldType::Bytes, Cardinality::Singular)), "std::string");
    }
}
