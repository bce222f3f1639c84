//! Plugin parameter parsing.

use std::collections::HashMap;

/// Flags controlling a single plugin invocation,
/// decoded from the request's parameter string.
///
/// `protoc` forwards the options part of `--uplink_out=<options>:<dir>`
/// (or `--uplink_opt=<options>`) verbatim as one string of
/// semicolon-separated `key=value` entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorParams {
    /// Attach a JSON dump of the raw request to the response.
    pub dump_request: bool,

    /// Attach a JSON dump of the analyzed collection to the response.
    pub dump_collection: bool,

    /// Emit client service binding headers.
    pub generate_service_code: bool,

    /// Emit JSON helper headers.
    pub generate_json_code: bool,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            dump_request: false,
            dump_collection: false,
            generate_service_code: true,
            generate_json_code: false,
        }
    }
}

impl GeneratorParams {
    /// Parse the request's parameter string.
    ///
    /// Keys are case-sensitive; values match "true" / "false" in any case.
    /// Unknown keys, entries without `=`, and unparsable values keep the
    /// default, so parameter strings written for other plugin versions
    /// still work. The first occurrence of a duplicated key wins, because
    /// the invoking compiler passes user-supplied fragments through verbatim.
    pub fn parse(parameter: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(parameter) = parameter else {
            return params;
        };

        let mut entries: HashMap<&str, &str> = HashMap::new();
        for entry in parameter.split(';').filter(|entry| !entry.is_empty()) {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            entries.entry(key.trim()).or_insert(value.trim());
        }

        params.dump_request = bool_entry(&entries, "DumpRequest", params.dump_request);
        params.dump_collection = bool_entry(&entries, "DumpCollection", params.dump_collection);
        params.generate_service_code =
            bool_entry(&entries, "GenerateServiceCode", params.generate_service_code);
        params.generate_json_code =
            bool_entry(&entries, "GenerateJsonCode", params.generate_json_code);
        params
    }
}

fn bool_entry(entries: &HashMap<&str, &str>, key: &str, default: bool) -> bool {
    match entries.get(key) {
        Some(value) if value.eq_ignore_ascii_case("true") => true,
        Some(value) if value.eq_ignore_ascii_case("false") => false,
        _ => default,
    }
}
