//! Grouping the request's file descriptors into per-file service bundles.
//!
//! Analysis resolves everything the generator needs up front: local type
//! names, field presence, and script eligibility. The generator itself is
//! a pure rendering pass over this model.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use protobuf::plugin::CodeGeneratorRequest;
use serde::Serialize;

use crate::options::{resolve_bool_option, SCRIPTABLE_FIELD_NUMBER};

#[derive(Copy, Clone)]
enum ProtoSyntax {
    Proto2,
    Proto3,
}

/// Everything analyzed out of one request, in request order.
#[derive(Debug, Default, Serialize)]
pub struct ServiceCollection {
    /// Basename stems of the files to generate, each followed by `_`.
    /// Used as the name prefix for debug dumps.
    pub input_file_names: String,

    pub files: Vec<ServiceFile>,
}

/// One analyzed `.proto` file from the request's files-to-generate list.
#[derive(Debug, Serialize)]
pub struct ServiceFile {
    /// File name as given in the request, e.g. `hello/greeter.proto`.
    pub proto_name: String,

    /// File name with the `.proto` extension removed.
    /// Generated output names derive from this.
    pub stem: String,

    /// Protobuf package.
    pub package: String,

    /// C++ namespace for the generated bindings.
    pub namespace: String,

    pub services: Vec<ServiceBinding>,
    pub messages: Vec<MessageBinding>,
    pub enums: Vec<EnumBinding>,
}

/// A service and the client surface generated for it.
#[derive(Debug, Serialize)]
pub struct ServiceBinding {
    pub name: String,
    pub methods: Vec<MethodBinding>,
}

#[derive(Debug, Serialize)]
pub struct MethodBinding {
    pub name: String,

    /// Local name of the request message type.
    pub input_type: String,

    /// Local name of the response message type.
    pub output_type: String,

    pub client_streaming: bool,
    pub server_streaming: bool,
}

/// A message and the binding struct generated for it.
/// Nested messages are flattened with `_`-joined names.
#[derive(Debug, Serialize)]
pub struct MessageBinding {
    pub name: String,

    /// Whether the binding struct is exposed to scripts.
    pub scriptable: bool,

    pub fields: Vec<FieldBinding>,
    pub oneofs: Vec<OneofBinding>,
}

#[derive(Debug, Serialize)]
pub struct FieldBinding {
    pub name: String,
    pub number: i32,
    pub r#type: FieldType,
    pub cardinality: Cardinality,

    /// Name of the owning oneof, for members of a real (non-synthesized) oneof.
    pub oneof: Option<String>,

    /// Whether the member is exposed to scripts.
    pub scriptable: bool,
}

/// Field type, reduced to what binding emission needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FieldType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    /// Message or enum, carrying the local type name.
    Named(String),
}

/// How a field is represented on the binding struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Cardinality {
    /// Implicit presence; represented directly.
    Singular,
    /// Explicit presence; represented as an optional.
    Optional,
    /// Represented as a vector.
    Repeated,
}

#[derive(Debug, Serialize)]
pub struct OneofBinding {
    pub name: String,

    /// Whether the case enum is exposed to scripts.
    pub scriptable: bool,

    pub members: Vec<OneofMember>,
}

#[derive(Debug, Serialize)]
pub struct OneofMember {
    pub name: String,

    /// Field number, which doubles as the case enum value.
    pub number: i32,
}

/// Analyze one request into per-file service bundles.
///
/// Fails with a human-readable message when the request is inconsistent
/// or contains nothing to bind a client to; the caller surfaces that
/// message through the response's error field.
pub fn analyze(request: &CodeGeneratorRequest) -> Result<ServiceCollection> {
    // Mapping from all filenames to file descriptors.
    let mut file_descriptors: HashMap<&str, &FileDescriptorProto> = HashMap::new();
    for proto_file in &request.proto_file {
        file_descriptors.insert(proto_file.name(), proto_file);
    }

    let mut collection = ServiceCollection::default();
    for file_to_generate in &request.file_to_generate {
        let descriptor = file_descriptors.get(file_to_generate.as_str()).ok_or_else(|| {
            anyhow!("Malformed request contains unknown file '{file_to_generate}'")
        })?;

        let file = analyze_file(descriptor)?;
        collection.input_file_names.push_str(base_stem(&file.stem));
        collection.input_file_names.push('_');
        collection.files.push(file);
    }

    if collection.files.iter().all(|file| file.services.is_empty()) {
        bail!("no service found in input files");
    }

    Ok(collection)
}

fn analyze_file(descriptor: &FileDescriptorProto) -> Result<ServiceFile> {
    let proto_name = descriptor
        .name
        .clone()
        .ok_or_else(|| anyhow!("Proto file lacks a name"))?;

    let syntax = match descriptor.syntax.as_deref() {
        None | Some("proto2") => ProtoSyntax::Proto2,
        Some("proto3") => ProtoSyntax::Proto3,
        Some("editions") => bail!("Editions syntax is not yet supported"),
        Some(syntax) => bail!("Unknown syntax '{syntax}' in '{proto_name}'"),
    };

    let package = descriptor
        .package
        .clone()
        .filter(|package| !package.is_empty())
        .ok_or_else(|| anyhow!("Proto file '{proto_name}' lacks a package"))?;

    let mut services = Vec::new();
    for service_descriptor in &descriptor.service {
        let service_name = service_descriptor
            .name
            .clone()
            .ok_or_else(|| anyhow!("Service in '{proto_name}' lacks a name"))?;

        let mut methods = Vec::new();
        for method_descriptor in &service_descriptor.method {
            let method_name = method_descriptor
                .name
                .clone()
                .ok_or_else(|| anyhow!("Method in '{service_name}' lacks a name"))?;
            let input_type = method_descriptor.input_type.as_deref().ok_or_else(|| {
                anyhow!("Method '{method_name}' in '{service_name}' lacks an input type")
            })?;
            let output_type = method_descriptor.output_type.as_deref().ok_or_else(|| {
                anyhow!("Method '{method_name}' in '{service_name}' lacks an output type")
            })?;

            methods.push(MethodBinding {
                name: method_name,
                input_type: local_type_name(input_type, &package),
                output_type: local_type_name(output_type, &package),
                client_streaming: method_descriptor.client_streaming(),
                server_streaming: method_descriptor.server_streaming(),
            });
        }

        services.push(ServiceBinding {
            name: service_name,
            methods,
        });
    }

    let mut messages = Vec::new();
    let mut enums = Vec::new();
    for message_descriptor in &descriptor.message_type {
        let message_name = message_descriptor
            .name
            .clone()
            .ok_or_else(|| anyhow!("Message in '{proto_name}' lacks a name"))?;
        analyze_message(
            message_name,
            message_descriptor,
            &package,
            syntax,
            &mut messages,
            &mut enums,
        )?;
    }
    for enum_descriptor in &descriptor.enum_type {
        enums.push(analyze_enum(None, enum_descriptor, &proto_name)?);
    }

    let stem = match proto_name.strip_suffix(".proto") {
        Some(stem) => stem.to_string(),
        None => proto_name.clone(),
    };
    let namespace = package.replace('.', "::");

    Ok(ServiceFile {
        proto_name,
        stem,
        package,
        namespace,
        services,
        messages,
        enums,
    })
}

/// Analyze a message and, depth-first, every type nested inside it.
/// Nested bindings land before their container so that generated C++
/// declares member types before they are used.
fn analyze_message(
    name: String,
    descriptor: &DescriptorProto,
    package: &str,
    syntax: ProtoSyntax,
    messages: &mut Vec<MessageBinding>,
    enums: &mut Vec<EnumBinding>,
) -> Result<()> {
    // Synthetic map-entry messages never get bindings of their own.
    if descriptor.options.map_entry() {
        return Ok(());
    }

    for nested_descriptor in &descriptor.nested_type {
        let nested_name = nested_descriptor
            .name
            .clone()
            .ok_or_else(|| anyhow!("Message nested in '{name}' lacks a name"))?;
        analyze_message(
            format!("{name}_{nested_name}"),
            nested_descriptor,
            package,
            syntax,
            messages,
            enums,
        )?;
    }
    for enum_descriptor in &descriptor.enum_type {
        enums.push(analyze_enum(Some(&name), enum_descriptor, &name)?);
    }

    // A oneof synthesized for a proto3 `optional` field is not a real
    // oneof; its lone member renders as a plain optional field.
    let mut real_oneof = vec![false; descriptor.oneof_decl.len()];
    for field in &descriptor.field {
        if let Some(index) = field.oneof_index {
            if !field.proto3_optional() {
                if let Some(flag) = real_oneof.get_mut(index as usize) {
                    *flag = true;
                }
            }
        }
    }

    let mut members: Vec<Vec<OneofMember>> =
        descriptor.oneof_decl.iter().map(|_| Vec::new()).collect();
    let mut fields = Vec::new();
    for field in &descriptor.field {
        fields.push(analyze_field(
            field,
            &name,
            package,
            syntax,
            &real_oneof,
            descriptor,
            &mut members,
        )?);
    }

    let mut oneofs = Vec::new();
    for (index, oneof_descriptor) in descriptor.oneof_decl.iter().enumerate() {
        if !real_oneof[index] {
            continue;
        }
        let oneof_name = oneof_descriptor
            .name
            .clone()
            .ok_or_else(|| anyhow!("Oneof in '{name}' lacks a name"))?;
        oneofs.push(OneofBinding {
            name: oneof_name,
            scriptable: resolve_bool_option(oneof_descriptor.options.as_ref(), SCRIPTABLE_FIELD_NUMBER)
                .unwrap_or(true),
            members: std::mem::take(&mut members[index]),
        });
    }

    messages.push(MessageBinding {
        name,
        scriptable: resolve_bool_option(descriptor.options.as_ref(), SCRIPTABLE_FIELD_NUMBER)
            .unwrap_or(true),
        fields,
        oneofs,
    });
    Ok(())
}

fn analyze_field(
    field: &FieldDescriptorProto,
    message_name: &str,
    package: &str,
    syntax: ProtoSyntax,
    real_oneof: &[bool],
    message: &DescriptorProto,
    members: &mut [Vec<OneofMember>],
) -> Result<FieldBinding> {
    let field_name = field
        .name
        .clone()
        .ok_or_else(|| anyhow!("Field in '{message_name}' lacks a name"))?;
    let number = field
        .number
        .ok_or_else(|| anyhow!("Field '{field_name}' in '{message_name}' lacks a number"))?;

    let proto_type = field
        .type_
        .ok_or_else(|| anyhow!("Field '{field_name}' in '{message_name}' lacks a type"))?
        .enum_value()
        .map_err(|raw| anyhow!("Field '{field_name}' in '{message_name}' has unknown type {raw}"))?;

    let r#type = match proto_type {
        Type::TYPE_DOUBLE => FieldType::Double,
        Type::TYPE_FLOAT => FieldType::Float,
        Type::TYPE_INT32 => FieldType::Int32,
        Type::TYPE_INT64 => FieldType::Int64,
        Type::TYPE_UINT32 => FieldType::Uint32,
        Type::TYPE_UINT64 => FieldType::Uint64,
        Type::TYPE_SINT32 => FieldType::Sint32,
        Type::TYPE_SINT64 => FieldType::Sint64,
        Type::TYPE_FIXED32 => FieldType::Fixed32,
        Type::TYPE_FIXED64 => FieldType::Fixed64,
        Type::TYPE_SFIXED32 => FieldType::Sfixed32,
        Type::TYPE_SFIXED64 => FieldType::Sfixed64,
        Type::TYPE_BOOL => FieldType::Bool,
        Type::TYPE_STRING => FieldType::String,
        Type::TYPE_BYTES => FieldType::Bytes,
        Type::TYPE_GROUP => {
            bail!("Field '{field_name}' in '{message_name}' is a group (which is unsupported)")
        }
        Type::TYPE_MESSAGE | Type::TYPE_ENUM => {
            let type_name = field.type_name.as_deref().ok_or_else(|| {
                anyhow!("Field '{field_name}' in '{message_name}' lacks a type name")
            })?;
            FieldType::Named(local_type_name(type_name, package))
        }
    };

    let mut oneof = None;
    if let Some(index) = field.oneof_index {
        let index: usize = index.try_into().map_err(|_| {
            anyhow!("Field '{field_name}' in '{message_name}' has an invalid one-of index")
        })?;
        if index >= message.oneof_decl.len() {
            bail!("Field '{field_name}' in '{message_name}' has an unknown one-of index");
        }
        if real_oneof[index] {
            members[index].push(OneofMember {
                name: field_name.clone(),
                number,
            });
            oneof = Some(message.oneof_decl[index].name().to_string());
        }
    }

    let label = field
        .label
        .map(|label| label.enum_value_or_default())
        .unwrap_or(Label::LABEL_OPTIONAL);
    let cardinality = match label {
        Label::LABEL_REPEATED => Cardinality::Repeated,
        Label::LABEL_REQUIRED => {
            bail!("Field '{field_name}' in '{message_name}' is required (which is unsupported)")
        }
        Label::LABEL_OPTIONAL => {
            // Messages always use explicit presence tracking,
            // as do proto2 fields, oneof members, and proto3 `optional`.
            let explicit = oneof.is_some()
                || field.proto3_optional()
                || matches!(syntax, ProtoSyntax::Proto2)
                || proto_type == Type::TYPE_MESSAGE;
            if explicit {
                Cardinality::Optional
            } else {
                Cardinality::Singular
            }
        }
    };

    Ok(FieldBinding {
        name: field_name,
        number,
        r#type,
        cardinality,
        oneof,
        scriptable: resolve_bool_option(field.options.as_ref(), SCRIPTABLE_FIELD_NUMBER)
            .unwrap_or(true),
    })
}

/// An enumeration and the scoped enum generated for it.
/// Nested enums are flattened with `_`-joined names like messages.
#[derive(Debug, Serialize)]
pub struct EnumBinding {
    pub name: String,
    pub values: Vec<EnumValueBinding>,
}

#[derive(Debug, Serialize)]
pub struct EnumValueBinding {
    pub name: String,
    pub number: i32,
}

fn analyze_enum(
    container: Option<&str>,
    descriptor: &EnumDescriptorProto,
    context: &str,
) -> Result<EnumBinding> {
    let enum_name = descriptor
        .name
        .as_deref()
        .ok_or_else(|| anyhow!("Enum in '{context}' lacks a name"))?;
    let name = match container {
        Some(container) => format!("{container}_{enum_name}"),
        None => enum_name.to_string(),
    };

    let mut values = Vec::new();
    for value in &descriptor.value {
        let value_name = value
            .name
            .clone()
            .ok_or_else(|| anyhow!("Value in enum '{name}' lacks a name"))?;
        let number = value
            .number
            .ok_or_else(|| anyhow!("Value '{value_name}' in enum '{name}' lacks a number"))?;
        values.push(EnumValueBinding {
            name: value_name,
            number,
        });
    }

    Ok(EnumBinding { name, values })
}

/// Resolve a fully-qualified `.package.Message.Nested` type reference
/// to the local `Message_Nested` binding name.
fn local_type_name(type_name: &str, package: &str) -> String {
    let absolute = type_name.strip_prefix('.').unwrap_or(type_name);
    let prefix = format!("{package}.");
    let relative = absolute.strip_prefix(&prefix).unwrap_or(absolute);
    relative.replace('.', "_")
}

/// Last path segment of a file stem.
fn base_stem(stem: &str) -> &str {
    match stem.rfind('/') {
        Some(index) => &stem[index + 1..],
        None => stem,
    }
}
