//! Naming helpers and template filters
//!
//! The helpers derive the identifiers generated code uses for an entity.
//! The filters expose the same case conversions to templates.

use convert_case::{Case, Casing};
use minijinja::{Error, ErrorKind, Value};

/// Class name of an entity, e.g. `user_role` -> `UserRole`
pub fn class_name(entity: &str) -> String {
    entity.to_case(Case::Pascal)
}

/// Name of the generated object type, e.g. `user_role` -> `userRoleType`
pub fn type_name(entity: &str) -> String {
    format!("{} type", entity).to_case(Case::Camel)
}

/// Name of the loader function, e.g. `user_role` -> `getUserRole`
pub fn getter_name(entity: &str) -> String {
    format!("get {}", entity).to_case(Case::Camel)
}

/// Name of the connection type generated for a connection target
pub fn connection_type_name(entity: &str) -> String {
    format!("{} connection", entity).to_case(Case::Pascal)
}

/// Escape a value for use inside a single-quoted JavaScript string
pub fn escape_js(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            // line terminators in JavaScript string literals
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn as_text<'a>(filter: &str, value: &'a Value) -> Result<&'a str, Error> {
    value.as_str().ok_or_else(|| {
        Error::new(ErrorKind::InvalidOperation, format!("{filter} expects a string"))
    })
}

/// pascal_case filter
///
/// Usage in templates: {{ name | pascal_case }}
pub fn pascal_case(value: Value) -> Result<Value, Error> {
    Ok(Value::from(as_text("pascal_case", &value)?.to_case(Case::Pascal)))
}

/// camel_case filter
///
/// Usage in templates: {{ name | camel_case }}
pub fn camel_case(value: Value) -> Result<Value, Error> {
    Ok(Value::from(as_text("camel_case", &value)?.to_case(Case::Camel)))
}

/// js_string filter; `none` renders as an empty string
///
/// Usage in templates: '{{ description | js_string }}'
pub fn js_string(value: Value) -> Result<Value, Error> {
    if value.is_none() || value.is_undefined() {
        return Ok(Value::from(""));
    }
    Ok(Value::from(escape_js(as_text("js_string", &value)?)))
}
