//! Reading the `scriptable` option back out of descriptor options.
//!
//! The option is a protobuf extension declared by the `.proto` authors,
//! not part of any schema this plugin compiles against. When the request
//! is decoded, the runtime files the extension under the options message's
//! unknown fields, so recovering it means scanning that store by field
//! number rather than going through a typed accessor.

use protobuf::Message;
use protobuf::UnknownValueRef;

/// Extension field number carrying the `scriptable` boolean
/// on message, field, and oneof options.
///
/// Fixed constant shared with the `.proto` authors' option declaration;
/// both sides agree on the number and nothing else.
pub const SCRIPTABLE_FIELD_NUMBER: u32 = 1000;

/// A boolean option read back from a descriptor,
/// distinguishing "never set" from an explicit `false`.
///
/// Callers that need a plain boolean must pick a default for
/// [`Absent`](Self::Absent) via [`unwrap_or`](Self::unwrap_or);
/// treating "not true" as `false` would erase the distinction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolOption {
    /// The option never appeared on the descriptor.
    Absent,

    /// The option appeared and every occurrence was zero.
    False,

    /// The option appeared and at least one occurrence was nonzero.
    True,
}

impl BoolOption {
    /// Collapse to a plain boolean,
    /// substituting `default` for [`Absent`](Self::Absent).
    pub fn unwrap_or(self, default: bool) -> bool {
        match self {
            BoolOption::Absent => default,
            BoolOption::False => false,
            BoolOption::True => true,
        }
    }
}

/// Scan the unknown-field store of any options message
/// for a boolean extension under `field_number`.
///
/// Boolean extensions are varint-encoded on the wire. Occurrences stored
/// under the same number with any other wire type are ignored; if nothing
/// varint-encoded remains, the option counts as absent rather than
/// failing the whole request over a malformed or unrelated tag.
pub fn resolve_bool_option<M: Message>(options: Option<&M>, field_number: u32) -> BoolOption {
    let Some(options) = options else {
        return BoolOption::Absent;
    };

    let mut saw_varint = false;
    let mut saw_nonzero = false;
    for (number, value) in options.special_fields().unknown_fields() {
        if number != field_number {
            continue;
        }
        if let UnknownValueRef::Varint(varint) = value {
            saw_varint = true;
            if varint != 0 {
                saw_nonzero = true;
            }
        }
    }

    match (saw_varint, saw_nonzero) {
        (false, _) => BoolOption::Absent,
        (true, true) => BoolOption::True,
        (true, false) => BoolOption::False,
    }
}
