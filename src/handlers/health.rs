// src/handlers/health.rs
// DOCUMENTATION: Health check handlers
// PURPOSE: Liveness endpoints for load balancers and clients

use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "crowd-sense",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn ping() -> impl Responder {
    log::debug!("Ping");
    HttpResponse::Ok().json(json!({ "status": "pong" }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ping", web::get().to(ping));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn test_ping_pong() {
        let app = test::init_service(App::new().configure(config)).await;
        let req = test::TestRequest::get().uri("/ping").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "status": "pong" }));
    }

    #[actix_rt::test]
    async fn test_health_reports_service() {
        let app = test::init_service(App::new().configure(config)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["service"], "crowd-sense");
    }
}
