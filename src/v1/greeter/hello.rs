#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object, ApiResponse };
use serde_json::Value;
use log::info;

use crate::greeting::greeter::greet;
use crate::greeting::validator::{validate, ValidationError};
use crate::utils::greeter_utils;

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct HelloApi;

#[derive(Object, Debug)]
pub struct RespHello
{
    message: String,
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum GreeterResponse {
    #[oai(status = 200)]
    Http200(Json<RespHello>),
    // The rejected payload's error tree, serialized verbatim.
    #[oai(status = 400)]
    Http400(Json<ValidationError>),
}

fn make_http_200(resp: RespHello) -> GreeterResponse {
    GreeterResponse::Http200(Json(resp))
}
fn make_http_400(err: ValidationError) -> GreeterResponse {
    GreeterResponse::Http400(Json(err))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl HelloApi {
    /// Validate the request body and greet the name it carries.
    #[oai(path = "/hello", method = "post")]
    async fn say_hello(&self, http_req: &Request, req: Json<Value>) -> GreeterResponse {
        RespHello::process(http_req, &req)
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespHello {
    /// Create a new response.
    fn new(message: String) -> Self {
        Self {message}
    }

    /// Process the request.  Rejections are input errors, never server faults.
    fn process(http_req: &Request, req: &Value) -> GreeterResponse {
        // Conditional logging depending on log level.
        greeter_utils::debug_request(http_req, req);

        match validate(req) {
            Ok(validated) => make_http_200(Self::new(greet(validated.name()))),
            Err(e) => {
                info!("Rejected greeting request ({:?}): {}", e.kind(), e);
                make_http_400(e)
            }
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn process(body: Value) -> GreeterResponse {
        RespHello::process(&Request::default(), &body)
    }

    #[test]
    fn valid_request_is_greeted() {
        match process(json!({"name": "Miso"})) {
            GreeterResponse::Http200(Json(r)) => assert_eq!(r.message, "Hello Miso!"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn shape_error_has_no_name_node() {
        match process(json!([1, 2])) {
            GreeterResponse::Http400(Json(r)) => {
                assert_eq!(r.errors, vec!["Must be a JSON object.".to_string()]);
                assert!(r.name.is_none());
            },
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn field_error_is_nested_under_name() {
        match process(json!({"name": 42})) {
            GreeterResponse::Http400(Json(r)) => {
                assert!(r.errors.is_empty());
                assert_eq!(r.name.unwrap().errors, vec!["Must be a string.".to_string()]);
            },
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
