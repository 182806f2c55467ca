/// HTTP server factory and configuration.
/// Provides a reusable function to create and configure the HTTP server
/// for use in both the main binary and tests.

use crate::db::DbPool;
use crate::handlers::{
    accept_invitation, create_group, create_invitation, get_group, get_group_invitations,
    get_group_members, get_user_groups, get_user_invitations, health, list_groups, register_user,
    reject_invitation, remove_group_member, ws_connect, WsServer,
};
use actix_web::{middleware, web, App, HttpServer};

fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/users", web::post().to(register_user))
        .route("/users/{id}/groups", web::get().to(get_user_groups))
        .route("/users/{id}/invitations", web::get().to(get_user_invitations))
        .route("/groups", web::post().to(create_group))
        .route("/groups", web::get().to(list_groups))
        .route("/groups/{id}", web::get().to(get_group))
        .route("/groups/{id}/members", web::get().to(get_group_members))
        .route(
            "/groups/{gid}/members/{uid}",
            web::delete().to(remove_group_member),
        )
        .route(
            "/groups/{id}/invitations",
            web::post().to(create_invitation),
        )
        .route(
            "/groups/{id}/invitations",
            web::get().to(get_group_invitations),
        )
        .route(
            "/invitations/{id}/accept",
            web::put().to(accept_invitation),
        )
        .route("/invitations/{id}", web::delete().to(reject_invitation))
        // WebSocket endpoint
        .route("/ws/{token}", web::get().to(ws_connect));
}

/// Create a configured HTTP server
///
/// Takes a database pool, WebSocket server, and bind address, then returns a
/// fully configured `HttpServer` ready to be run.
pub fn create_http_server(
    pool: web::Data<DbPool>,
    ws_server: web::Data<WsServer>,
    bind_addr: &str,
) -> std::io::Result<actix_web::dev::Server> {
    let pool_clone = pool.clone();
    let ws_server_clone = ws_server.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool_clone.clone())
            .app_data(ws_server_clone.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}

/// Create a test HTTP server with an in-memory database and WebSocket server
///
/// Binds to a random available port and returns (server, bind_address).
pub fn create_test_http_server() -> std::io::Result<(actix_web::dev::Server, String)> {
    let pool = web::Data::new(crate::db::create_test_pool());
    let ws_server = web::Data::new(WsServer::new(pool.get_ref().clone()));

    // Bind to 127.0.0.1:0 to get a random available port
    let bind_addr = "127.0.0.1:0";
    let pool_clone = pool.clone();
    let ws_server_clone = ws_server.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool_clone.clone())
            .app_data(ws_server_clone.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(bind_addr)?;

    // Get the actual bind address (including the assigned port)
    let addrs = server.addrs();
    let addr_str = addrs
        .first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "No bind address found"))?
        .to_string();

    let server = server.run();

    Ok((server, addr_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    fn test_app_data() -> (web::Data<DbPool>, web::Data<WsServer>) {
        let pool = web::Data::new(crate::db::create_test_pool());
        let ws_server = web::Data::new(WsServer::new(pool.get_ref().clone()));
        (pool, ws_server)
    }

    #[tokio::test]
    async fn test_create_http_server_with_test_pool() {
        let (pool, ws_server) = test_app_data();

        let result = create_http_server(pool, ws_server, "127.0.0.1:0");
        assert!(result.is_ok(), "create_http_server should succeed");
    }

    #[tokio::test]
    async fn test_create_http_server_invalid_address() {
        let (pool, ws_server) = test_app_data();

        let result = create_http_server(pool, ws_server, "invalid_address:99999");
        assert!(result.is_err(), "create_http_server should fail with invalid address");
    }

    #[tokio::test]
    async fn test_create_test_http_server() {
        let result = create_test_http_server();
        assert!(result.is_ok(), "create_test_http_server should succeed");

        let (_server, addr) = result.unwrap();
        assert!(addr.contains("127.0.0.1:"), "Address should contain 127.0.0.1:");
        let port_part = addr.split(':').nth(1).unwrap_or("");
        assert!(!port_part.is_empty(), "Port should be assigned");
    }

    #[actix_web::test]
    async fn test_health_endpoint() {
        let (pool, ws_server) = test_app_data();

        let app = test::init_service(
            App::new()
                .app_data(pool)
                .app_data(ws_server)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();

        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_register_user_endpoint() {
        let (pool, ws_server) = test_app_data();

        let app = test::init_service(
            App::new()
                .app_data(pool)
                .app_data(ws_server)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/users")
            .set_json(serde_json::json!({
                "username": "alice"
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201); // Created
    }

    #[actix_web::test]
    async fn test_register_duplicate_username_returns_409() {
        let (pool, ws_server) = test_app_data();

        let app = test::init_service(
            App::new()
                .app_data(pool)
                .app_data(ws_server)
                .configure(configure_routes),
        )
        .await;

        let first = test::TestRequest::post()
            .uri("/users")
            .set_json(serde_json::json!({"username": "alice"}))
            .to_request();
        let resp = test::call_service(&app, first).await;
        assert_eq!(resp.status(), 201);

        let second = test::TestRequest::post()
            .uri("/users")
            .set_json(serde_json::json!({"username": "alice"}))
            .to_request();
        let resp = test::call_service(&app, second).await;
        assert_eq!(resp.status(), 409);
    }

    #[actix_web::test]
    async fn test_create_group_requires_auth() {
        let (pool, ws_server) = test_app_data();

        let app = test::init_service(
            App::new()
                .app_data(pool)
                .app_data(ws_server)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/groups")
            .set_json(serde_json::json!({"name": "study"}))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_list_groups_endpoint() {
        let (pool, ws_server) = test_app_data();

        let alice = crate::db::Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register alice");

        let app = test::init_service(
            App::new()
                .app_data(pool.clone())
                .app_data(ws_server)
                .configure(configure_routes),
        )
        .await;

        // Unauthenticated listing is refused
        let req = test::TestRequest::get().uri("/groups").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);

        let req = test::TestRequest::post()
            .uri("/groups")
            .insert_header(("Authorization", alice.token.clone()))
            .set_json(serde_json::json!({"name": "study"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);

        let req = test::TestRequest::get()
            .uri("/groups")
            .insert_header(("Authorization", alice.token.clone()))
            .to_request();
        let groups: Vec<crate::db::models::Group> =
            test::call_and_read_body_json(&app, req).await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "study");
    }

    #[actix_web::test]
    async fn test_group_invitation_flow_over_http() {
        let (pool, ws_server) = test_app_data();

        // Seed users directly against the pool so we hold their tokens
        let alice = crate::db::Database::register_user(&pool, "alice")
            .await
            .expect("Failed to register alice");
        let bob = crate::db::Database::register_user(&pool, "bob")
            .await
            .expect("Failed to register bob");

        let app = test::init_service(
            App::new()
                .app_data(pool.clone())
                .app_data(ws_server)
                .configure(configure_routes),
        )
        .await;

        // Alice creates a group
        let req = test::TestRequest::post()
            .uri("/groups")
            .insert_header(("Authorization", alice.token.clone()))
            .set_json(serde_json::json!({"name": "study"}))
            .to_request();
        let group: crate::db::models::Group = test::call_and_read_body_json(&app, req).await;

        // Alice invites Bob
        let req = test::TestRequest::post()
            .uri(&format!("/groups/{}/invitations", group.id))
            .insert_header(("Authorization", alice.token.clone()))
            .set_json(serde_json::json!({"invitee_id": bob.id}))
            .to_request();
        let invitation: crate::db::models::Membership =
            test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            invitation.status,
            crate::db::models::MembershipStatus::Pending
        );

        // Bob accepts
        let req = test::TestRequest::put()
            .uri(&format!("/invitations/{}/accept", invitation.id))
            .insert_header(("Authorization", bob.token.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        // Both appear as active members
        let req = test::TestRequest::get()
            .uri(&format!("/groups/{}/members", group.id))
            .insert_header(("Authorization", bob.token.clone()))
            .to_request();
        let members: Vec<crate::db::models::MemberResponse> =
            test::call_and_read_body_json(&app, req).await;
        assert_eq!(members.len(), 2);
    }
}
