use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::ServerBuilder;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::organizations::list_accessible_organizations,
        routes::tasks::list_tasks,
        routes::tasks::get_task,
        routes::tasks::create_task,
        routes::tasks::update_task,
        routes::tasks::delete_task,
    ),
    components(
        schemas(
            crate::authz::Role,
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::organization::Organization,
            models::task::Task,
            models::task::TaskCreateRequest,
            models::task::TaskUpdateRequest,
            routes::health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Organizations", description = "Organization visibility"),
        (name = "Tasks", description = "Task management"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    // Point Swagger's Try-it-out at the running backend; https when the
    // server is configured for TLS.
    let tls_enabled = (std::env::var("CERT_PATH").is_ok() && std::env::var("KEY_PATH").is_ok())
        || std::env::var("USE_SELF_SIGNED_TLS").is_ok();
    let scheme = if tls_enabled { "https" } else { "http" };

    doc.servers = Some(vec![ServerBuilder::new()
        .url(format!("{scheme}://localhost:{port}"))
        .build()]);

    doc
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> axum::Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    axum::Router::new().merge(
        SwaggerUi::new("/docs")
            .url("/api-docs/openapi.json", doc)
            .config(swagger_config),
    )
}
