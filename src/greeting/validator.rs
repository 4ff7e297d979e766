#![forbid(unsafe_code)]

use poem_openapi::Object;
use serde_json::Value;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Error messages are part of the external contract and must not change.
pub const MSG_NOT_OBJECT : &str = "Must be a JSON object.";
pub const MSG_REQUIRED   : &str = "Is required.";
pub const MSG_NOT_STRING : &str = "Must be a string.";
pub const MSG_TOO_SHORT  : &str = "Must be at least 1 character long.";

// The only attribute recognized in a request payload.
pub const NAME_FIELD     : &str = "name";

// ***************************************************************************
//                               Value Types
// ***************************************************************************
// ---------------------------------------------------------------------------
// NonEmptyString:
// ---------------------------------------------------------------------------
/// A string of at least one character.  The content is kept exactly as
/// received; no trimming or normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Returns None if `s` is empty.
    pub fn new(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        if s.is_empty() {None} else {Some(Self(s))}
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ValidatedRequest:
// ---------------------------------------------------------------------------
/// A request payload that passed validation.  Only `validate` creates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    name: NonEmptyString,
}

impl ValidatedRequest {
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }
}

// ***************************************************************************
//                               Error Tree
// ***************************************************************************
/// Distinguishes a payload that is not an object from an object whose
/// `name` attribute is unacceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    Shape,
    Field,
}

// ---------------------------------------------------------------------------
// FieldErrors:
// ---------------------------------------------------------------------------
#[derive(Object, Debug, Clone, PartialEq, Eq)]
pub struct FieldErrors {
    #[oai(rename = "_errors")]
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// ValidationError:
// ---------------------------------------------------------------------------
/** The error tree returned for rejected payloads.  It is also the 400
 * response body, serialized as
 *
 *   {"_errors": [...], "name": {"_errors": [...]}}
 *
 * where the `name` node is omitted when the payload was not an object.
 */
#[derive(Object, Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request validation failed: {}", join_messages(.errors, .name))]
pub struct ValidationError {
    #[oai(rename = "_errors")]
    pub errors: Vec<String>,
    #[oai(skip_serializing_if_is_none)]
    pub name: Option<FieldErrors>,
}

impl ValidationError {
    fn shape() -> Self {
        Self {errors: vec![MSG_NOT_OBJECT.to_string()], name: None}
    }

    fn field(msg: &str) -> Self {
        Self {
            errors: vec!(),
            name: Some(FieldErrors {errors: vec![msg.to_string()]}),
        }
    }

    pub fn kind(&self) -> ValidationErrorKind {
        if self.name.is_none() {ValidationErrorKind::Shape} else {ValidationErrorKind::Field}
    }

}

// All messages in the tree, root first.
fn join_messages(errors: &[String], name: &Option<FieldErrors>) -> String {
    let mut v: Vec<&str> = errors.iter().map(String::as_str).collect();
    if let Some(name) = name {
        v.extend(name.errors.iter().map(String::as_str));
    }
    v.join(" ")
}

// ***************************************************************************
//                            Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// validate:
// ---------------------------------------------------------------------------
/** Decide whether a decoded payload is a well-formed greeting request.
 *
 * Arrays, primitives and null fail the object check, which short-circuits
 * the field checks.  The name attribute is then checked in order: present,
 * string, non-empty.  At most one message is attached to the name node.
 */
pub fn validate(payload: &Value) -> Result<ValidatedRequest, ValidationError> {
    let map = match payload {
        Value::Object(m) => m,
        _ => return Err(ValidationError::shape()),
    };

    match map.get(NAME_FIELD) {
        None => Err(ValidationError::field(MSG_REQUIRED)),
        Some(Value::String(s)) => match NonEmptyString::new(s.as_str()) {
            Some(name) => Ok(ValidatedRequest {name}),
            None => Err(ValidationError::field(MSG_TOO_SHORT)),
        },
        Some(_) => Err(ValidationError::field(MSG_NOT_STRING)),
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem_openapi::types::ToJSON;
    use serde_json::json;

    fn wire(err: &ValidationError) -> String {
        serde_json::to_string(&err.to_json().unwrap()).unwrap()
    }

    fn field_errors(err: &ValidationError) -> Vec<String> {
        err.name.as_ref().map(|n| n.errors.clone()).unwrap_or_default()
    }

    #[test]
    fn non_objects_fail_shape_check() {
        for p in [json!(1), json!(2.5), json!("Miso"), json!(null), json!(true),
                  json!(false), json!([]), json!([{"name": "Miso"}])] {
            let err = validate(&p).unwrap_err();
            assert_eq!(err.errors, vec![MSG_NOT_OBJECT.to_string()], "payload: {}", p);
            assert!(err.name.is_none());
            assert_eq!(err.kind(), ValidationErrorKind::Shape);
        }
    }

    #[test]
    fn missing_name_is_required() {
        let err = validate(&json!({})).unwrap_err();
        assert!(err.errors.is_empty());
        assert_eq!(field_errors(&err), vec![MSG_REQUIRED.to_string()]);
        assert_eq!(err.kind(), ValidationErrorKind::Field);
    }

    #[test]
    fn unrelated_keys_do_not_satisfy_name() {
        let err = validate(&json!({"nmae": "Miso", "other": 1})).unwrap_err();
        assert_eq!(field_errors(&err), vec![MSG_REQUIRED.to_string()]);
    }

    #[test]
    fn non_string_name_is_rejected() {
        for v in [json!(1), json!({}), json!({"first": "Miso"}), json!(null),
                  json!([]), json!(["Miso"]), json!(true)] {
            let err = validate(&json!({"name": v.clone()})).unwrap_err();
            assert!(err.errors.is_empty());
            assert_eq!(field_errors(&err), vec![MSG_NOT_STRING.to_string()], "name: {}", v);
        }
    }

    #[test]
    fn empty_name_is_too_short() {
        let err = validate(&json!({"name": ""})).unwrap_err();
        assert_eq!(field_errors(&err), vec![MSG_TOO_SHORT.to_string()]);
    }

    #[test]
    fn valid_name_is_kept_verbatim() {
        let req = validate(&json!({"name": "Miso"})).unwrap();
        assert_eq!(req.name().as_str(), "Miso");

        // Whitespace is not trimmed.
        let req = validate(&json!({"name": "  "})).unwrap();
        assert_eq!(req.name().as_str(), "  ");

        let req = validate(&json!({"name": "Zoë 🙂", "extra": [1, 2]})).unwrap();
        assert_eq!(req.name().as_str(), "Zoë 🙂");
    }

    #[test]
    fn validation_is_deterministic() {
        for p in [json!(1), json!({}), json!({"name": 7}), json!({"name": ""}), json!({"name": "Miso"})] {
            assert_eq!(validate(&p), validate(&p));
        }
    }

    #[test]
    fn error_tree_serialization() {
        let err = validate(&json!(1)).unwrap_err();
        assert_eq!(wire(&err), r#"{"_errors":["Must be a JSON object."]}"#);

        let err = validate(&json!({})).unwrap_err();
        assert_eq!(wire(&err), r#"{"_errors":[],"name":{"_errors":["Is required."]}}"#);

        let err = validate(&json!({"name": ""})).unwrap_err();
        assert_eq!(wire(&err), r#"{"_errors":[],"name":{"_errors":["Must be at least 1 character long."]}}"#);
    }

    #[test]
    fn error_display_lists_messages() {
        let err = validate(&json!({"name": false})).unwrap_err();
        assert_eq!(err.to_string(), "request validation failed: Must be a string.");

        let err = validate(&json!(null)).unwrap_err();
        assert_eq!(err.to_string(), "request validation failed: Must be a JSON object.");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn non_empty_string_rejects_empty() {
        assert!(NonEmptyString::new("").is_none());
        assert_eq!(NonEmptyString::new("a").unwrap().to_string(), "a");
    }
}
