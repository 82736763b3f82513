// src/handlers/metrics.rs
// DOCUMENTATION: Prometheus scrape endpoint
// PURPOSE: Render the installed recorder in text exposition format

use actix_web::{web, HttpResponse};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::errors::CrowdSenseError;

pub async fn render_metrics(
    handle: Option<web::Data<PrometheusHandle>>,
) -> Result<HttpResponse, CrowdSenseError> {
    let handle = handle.ok_or_else(|| {
        CrowdSenseError::ServiceUnavailable("metrics recorder not installed".to_string())
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render()))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(render_metrics));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[actix_rt::test]
    async fn test_metrics_renders_recorded_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            crate::metrics::record_job_run("weekly_refresh", true, std::time::Duration::from_secs(3));
        });

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(handle))
                .configure(config),
        )
        .await;
        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains(r#"background_job_runs_total{job_name="weekly_refresh",status="success"} 1"#));
    }

    #[actix_rt::test]
    async fn test_metrics_without_recorder_is_unavailable() {
        let app = test::init_service(App::new().configure(config)).await;
        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
