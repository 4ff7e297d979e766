#![forbid(unsafe_code)]

use lazy_static::lazy_static;
use log::{error, info};
use poem::error::NotFoundError;
use poem::http::StatusCode;
use poem::listener::{Listener, RustlsCertificate, RustlsConfig};
use poem::{listener::TcpListener, Endpoint, EndpointExt, Route};
use poem_openapi::error::ParseRequestPayloadError;
use poem_openapi::OpenApiService;

// Greeter Utilities
use crate::v1::greeter::hello::HelloApi;
use crate::v1::greeter::version::VersionApi;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx, GREETER_ARGS, GREETER_DIRS,
                           TLS_CERT_FILE, TLS_KEY_FILE};
use crate::utils::errors::{make_http_error, Errors};

// Modules
mod greeting;
mod utils;
mod v1;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "GreeterServer"; // for poem logging

// Transport-level error messages.
const NOT_FOUND_MSG : &str = "Not found.";
const BAD_JSON_MSG  : &str = "Request body is not valid JSON.";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We exit if we can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Greeter -------------
    // Announce ourselves.
    println!("Starting greeter_server!");

    // Only lay down the data directories if requested.
    if GREETER_ARGS.create_dirs_only {
        println!("Data directories are in place:\n{:#?}", *GREETER_DIRS);
        return Ok(());
    }

    // Initialize the server.
    greeter_init();

    // --------------- Main Loop Set Up ---------------
    let config = &RUNTIME_CTX.parms.config;
    let app = build_app(config.server_url(), &config.title);
    let addr = format!("{}{}", "0.0.0.0:", config.http_port);

    // ------------------ Main Loop -------------------
    if config.enable_tls {
        let (key, cert) = read_tls_material()?;
        poem::Server::new(
            TcpListener::bind(addr).rustls(
                RustlsConfig::new().fallback(
                    RustlsCertificate::new()
                        .key(key)
                        .cert(cert),
                ),
            ),
        )
        .name(SERVER_NAME)
        .run(app)
        .await
    } else {
        poem::Server::new(TcpListener::bind(addr))
            .name(SERVER_NAME)
            .run(app)
            .await
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// build_app:
// ---------------------------------------------------------------------------
/** Assemble the complete route tree.  The configured title names the
 * OpenAPI document.  The OpenAPI service lives under /v1,
 * the Swagger UI at the root and the generated documents at /spec and
 * /spec_yaml.  Unknown routes and undecodable JSON bodies are answered
 * with an HttpResult body.
 */
fn build_app(server_url: String, title: &str) -> impl Endpoint {
    let endpoints = (HelloApi, VersionApi);
    let api_service =
        OpenApiService::new(endpoints, title, env!("CARGO_PKG_VERSION")).server(server_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let ui = api_service.swagger_ui();

    Route::new()
        .nest("/v1", api_service)
        .nest("/", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml)
        .catch_error(|_: NotFoundError| async move {
            make_http_error(StatusCode::NOT_FOUND, NOT_FOUND_MSG)
        })
        .catch_error(|e: ParseRequestPayloadError| async move {
            info!("Undecodable request body: {}", e.reason);
            make_http_error(StatusCode::BAD_REQUEST, BAD_JSON_MSG)
        })
}

// ---------------------------------------------------------------------------
// greeter_init:
// ---------------------------------------------------------------------------
/** Initialize all subsystems other than those needed to configure the main
 * loop processor.
 */
fn greeter_init() {
    // Configure our log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();
}

// ---------------------------------------------------------------------------
// read_tls_material:
// ---------------------------------------------------------------------------
/** Read the private key and certificate from the certs data directory. */
fn read_tls_material() -> Result<(Vec<u8>, Vec<u8>), std::io::Error> {
    let key_file = RUNTIME_CTX.greeter_dirs.certs_dir.clone() + TLS_KEY_FILE;
    let cert_file = RUNTIME_CTX.greeter_dirs.certs_dir.clone() + TLS_CERT_FILE;

    let read = |path: &str| {
        std::fs::read(path).inspect_err(|e| {
            error!("{}", Errors::TlsMaterial(path.to_string(), e.to_string()));
        })
    };
    Ok((read(&key_file)?, read(&cert_file)?))
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("\n*** Running GREETER={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}.",
          option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
          env!("GIT_BRANCH"),
          env!("GIT_COMMIT_SHORT"),
          env!("GIT_DIRTY"),
          env!("SOURCE_TIMESTAMP"),
          env!("RUSTC_VERSION"));
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::build_app;
    use poem::http::StatusCode;
    use poem::test::TestClient;
    use serde_json::json;

    const TEST_URL: &str = "http://localhost:3000/v1";
    const TEST_TITLE: &str = "Greeter Server";

    fn client() -> TestClient<impl poem::Endpoint> {
        TestClient::new(build_app(TEST_URL.to_string(), TEST_TITLE))
    }

    #[tokio::test]
    async fn hello_greets_valid_name() {
        let resp = client().post("/v1/hello").body_json(&json!({"name": "Agata"})).send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"message": "Hello Agata!"})).await;
    }

    #[tokio::test]
    async fn hello_rejects_non_object() {
        let resp = client().post("/v1/hello").body_json(&json!(1)).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"_errors": ["Must be a JSON object."]})).await;
    }

    #[tokio::test]
    async fn hello_rejects_missing_name() {
        let resp = client().post("/v1/hello").body_json(&json!({})).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"_errors": [], "name": {"_errors": ["Is required."]}})).await;
    }

    #[tokio::test]
    async fn hello_rejects_empty_name() {
        let resp = client().post("/v1/hello").body_json(&json!({"name": ""})).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"_errors": [], "name": {"_errors": ["Must be at least 1 character long."]}})).await;
    }

    #[tokio::test]
    async fn hello_rejects_non_string_name() {
        let resp = client().post("/v1/hello").body_json(&json!({"name": null})).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"_errors": [], "name": {"_errors": ["Must be a string."]}})).await;
    }

    #[tokio::test]
    async fn malformed_body_is_a_transport_error() {
        let resp = client()
            .post("/v1/hello")
            .content_type("application/json")
            .body("{\"name\": ")
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        resp.assert_json(json!({"result_code": "400", "result_msg": "Request body is not valid JSON."})).await;
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let resp = client().get("/v1/goodbye").send().await;
        resp.assert_status(StatusCode::NOT_FOUND);
        resp.assert_json(json!({"result_code": "404", "result_msg": "Not found."})).await;
    }

    #[tokio::test]
    async fn version_is_reported() {
        let resp = client().get("/v1/version").send().await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        let value = json.value().object();
        value.get("result_code").assert_string("0");
        value.get("greeter_version").assert_string(env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn openapi_document_lists_hello() {
        let resp = client().get("/spec").send().await;
        resp.assert_status_is_ok();
        let text = resp.0.into_body().into_string().await.unwrap();
        assert!(text.contains("/hello"));
        assert!(text.contains("/version"));
    }

    #[tokio::test]
    async fn openapi_document_uses_configured_title() {
        let cli = TestClient::new(build_app(TEST_URL.to_string(), "Front Desk Greeter"));
        let resp = cli.get("/spec").send().await;
        resp.assert_status_is_ok();
        let text = resp.0.into_body().into_string().await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["info"]["title"], "Front Desk Greeter");
    }
}
