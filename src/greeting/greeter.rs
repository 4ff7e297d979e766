#![forbid(unsafe_code)]

use crate::greeting::validator::NonEmptyString;

// ---------------------------------------------------------------------------
// greet:
// ---------------------------------------------------------------------------
/** Build the greeting for an already validated name. */
pub fn greet(name: &NonEmptyString) -> String {
    format!("Hello {}!", name)
}
