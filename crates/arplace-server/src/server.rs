//! Web server setup and routing

use anyhow::{Context, Result};
use arplace_core::AppConfig;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{debug, info};

use crate::config::{Config, TlsConfig};

/// Shared state for request handlers
pub struct ServerState {
    pub app: AppConfig,
}

/// Runtime configuration consumed by the client at startup
async fn get_config(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    debug!(models = state.app.models.len(), "Serving app config");
    Json(state.app.clone())
}

/// Build the router: config API, model files, then the web bundle as fallback
pub fn router(config: &Config) -> Router {
    let state = Arc::new(ServerState {
        app: config.app.clone(),
    });

    Router::new()
        .route("/api/config", get(get_config))
        .nest_service("/models", ServeDir::new(&config.models.path))
        .fallback_service(ServeDir::new(&config.server.root))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server (HTTP or HTTPS depending on config)
pub async fn run(config: &Config) -> Result<()> {
    let app = router(config);
    info!(
        root = %config.server.root,
        models = %config.models.path,
        "Serving arplace"
    );

    if let Some(tls) = &config.server.tls {
        run_https(app, &config.server.bind, tls).await
    } else {
        run_http(app, &config.server.bind).await
    }
}

/// Run plain HTTP server
async fn run_http(app: Router, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Run HTTPS server with TLS; devices only grant immersive sessions on secure origins
async fn run_https(app: Router, bind: &str, tls: &TlsConfig) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::path::PathBuf;

    let cert_path = PathBuf::from(&tls.cert);
    let key_path = PathBuf::from(&tls.key);

    if !cert_path.exists() {
        anyhow::bail!("TLS certificate file not found: {}", tls.cert);
    }
    if !key_path.exists() {
        anyhow::bail!("TLS key file not found: {}", tls.key);
    }

    let rustls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
        .await
        .context("Failed to load TLS certificate")?;

    let addr: std::net::SocketAddr = bind.parse().context("Invalid bind address")?;
    info!(address = %bind, protocol = "HTTPS", cert = %tls.cert, "Starting web server with TLS");

    axum_server::bind_rustls(addr, rustls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelsConfig, ServerConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_config(dir: &std::path::Path) -> Config {
        let models = dir.join("models");
        let web = dir.join("web");
        std::fs::create_dir_all(&models).unwrap();
        std::fs::create_dir_all(&web).unwrap();
        std::fs::write(models.join("house1.glb"), vec![7u8; 1024]).unwrap();
        std::fs::write(web.join("index.html"), "<html>arplace</html>").unwrap();

        Config {
            server: ServerConfig {
                root: web.to_string_lossy().into_owned(),
                ..ServerConfig::default()
            },
            models: ModelsConfig {
                path: models.to_string_lossy().into_owned(),
            },
            app: AppConfig::builtin(),
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_config_endpoint_returns_app_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let (status, body) = get(router(&config), "/api/config").await;
        assert_eq!(status, StatusCode::OK);
        let served = AppConfig::from_json(std::str::from_utf8(&body).unwrap()).unwrap();
        assert_eq!(served, config.app);
    }

    #[tokio::test]
    async fn test_serves_models_and_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let (status, body) = get(router(&config), "/models/house1.glb").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.len(), 1024);

        let (status, body) = get(router(&config), "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<html>arplace</html>");

        let (status, _) = get(router(&config), "/models/missing.glb").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_https_requires_certificate_files() {
        let tls = TlsConfig {
            cert: "/nonexistent/cert.pem".to_string(),
            key: "/nonexistent/key.pem".to_string(),
        };
        let err = run_https(Router::new(), "127.0.0.1:0", &tls).await.unwrap_err();
        assert!(err.to_string().contains("certificate file not found"));
    }
}
