#![forbid(unsafe_code)]

use poem::http::StatusCode;
use poem::web::Json;
use poem::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("greeter_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    #[error("Unable to read TLS material from {}: {}", .0, .1)]
    TlsMaterial(String, String),
}

// ***************************************************************************
//                            Transport Results
// ***************************************************************************
/** Body used for errors raised by the HTTP layer itself, such as unknown
 * routes or request bodies that are not valid JSON.
 */
#[derive(Serialize, Debug)]
pub struct HttpResult {
    pub result_code: String,
    pub result_msg: String,
}

impl HttpResult {
    pub fn new(result_code: String, result_msg: String) -> Self {
        Self {result_code, result_msg}
    }
}

// ---------------------------------------------------------------------------
// make_http_error:
// ---------------------------------------------------------------------------
/** Build a complete transport error response outside of any OpenAPI
 * endpoint, such as from the route-level error handlers.
 */
pub fn make_http_error(status: StatusCode, msg: &str) -> Response {
    Json(HttpResult::new(status.as_u16().to_string(), msg.to_string()))
        .with_status(status)
        .into_response()
}
