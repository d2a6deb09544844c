//! Subcommand implementations.

use std::future::Future;
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;

use axum::http::Method;
use axum::{Json, Router};
use pelecard::config::PelecardConfig;
use pelecard::endpoints::{ENDPOINTS, Endpoint, endpoint_by_name};
use pelecard::events::{BillingEvent, EventDispatcher, EventListener};
use pelecard::request::Request;
use pelecard_http::PelecardClient;
use pelecard_http::webhook::{route_path, router_from_config};
use serde_json::Value;
use tower_http::{cors, trace::TraceLayer};

/// Error type of every subcommand.
pub type CommandError = Box<dyn std::error::Error + Send + Sync>;

/// Logs every received event.
#[derive(Debug, Clone, Copy)]
struct LogListener;

impl EventListener for LogListener {
    fn on_event<'a>(
        &'a self,
        event: &'a BillingEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            match event {
                BillingEvent::PaymentSucceeded { response, .. }
                | BillingEvent::PaymentFailed { response, .. } => tracing::info!(
                    event = event.name(),
                    transaction_id = response.transaction_id().as_deref().unwrap_or("-"),
                    status_code = response.error_code().as_deref().unwrap_or("-"),
                    "Webhook event"
                ),
                _ => tracing::info!(event = event.name(), "Webhook event"),
            }
        })
    }
}

/// Runs the webhook listener until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(
    config: &PelecardConfig,
    host: Option<IpAddr>,
    port: Option<u16>,
) -> Result<(), CommandError> {
    let mut app = Router::new().route("/health", axum::routing::get(health));

    if config.webhook.enabled {
        let dispatcher = EventDispatcher::new().with_listener(Arc::new(LogListener));
        app = app.merge(router_from_config(&config.webhook, dispatcher));
        tracing::info!(path = %route_path(&config.webhook.path), "Webhook route enabled");
    } else {
        tracing::warn!("Webhooks are disabled, set PELECARD_WEBHOOK_ENABLED=true to enable them");
    }

    let app = app.layer(TraceLayer::new_for_http()).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(
        host.unwrap_or(config.server.host),
        port.unwrap_or(config.server.port),
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Pelecard listener on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Pelecard listener shut down gracefully");
    Ok(())
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}

/// Calls one endpoint and prints the reply as JSON.
///
/// # Errors
///
/// Returns an error for an unknown endpoint, invalid `--data`, a client
/// failure, or a decline when `throw` is set.
pub async fn call(
    config: &PelecardConfig,
    name: &str,
    data: &str,
    throw: bool,
    out: &mut (impl Write + Send),
) -> Result<(), CommandError> {
    let endpoint = endpoint_by_name(name).ok_or_else(|| format!("unknown endpoint: {name}"))?;
    let request = parse_data(data)?;
    let client = PelecardClient::from_config(config)?;

    let mut response = client.call(endpoint, request).await?;
    if throw {
        response = response.error_for_status()?;
    }
    let body = serde_json::json!({
        "endpoint": endpoint.path,
        "http_status": response.status_code(),
        "successful": response.successful(),
        "data": response.data(),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    Ok(())
}

fn parse_data(data: &str) -> Result<Request, CommandError> {
    match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => Ok(Request::from_map(map)),
        _ => Err("--data must be a JSON object".into()),
    }
}

/// Prints every endpoint with its path and required fields.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn endpoints(out: &mut impl Write) -> io::Result<()> {
    let width = ENDPOINTS.iter().map(|e| e.name.len()).max().unwrap_or(0);
    for endpoint in ENDPOINTS {
        writeln!(out, "{}", endpoint_line(endpoint, width))?;
    }
    Ok(())
}

fn endpoint_line(endpoint: &Endpoint, width: usize) -> String {
    let required = if endpoint.required.is_empty() {
        "-".to_owned()
    } else {
        endpoint.required.join(", ")
    };
    format!("{:<width$}  {:<40}  {required}", endpoint.name, endpoint.path)
}

/// Full public URL of the webhook route.
#[must_use]
pub fn webhook_url(config: &PelecardConfig, base_url: Option<&str>) -> String {
    let base = base_url.map_or_else(
        || format!("http://{}:{}", config.server.host, config.server.port),
        |b| b.trim_end_matches('/').to_owned(),
    );
    format!("{base}{}", route_path(&config.webhook.path))
}

/// Prints the webhook URL and dashboard setup steps.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn webhook_info(
    config: &PelecardConfig,
    base_url: Option<&str>,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "Pelecard Webhook Configuration")?;
    writeln!(out)?;
    writeln!(out, "Webhook URL:")?;
    writeln!(out, "  {}", webhook_url(config, base_url))?;
    writeln!(out)?;
    writeln!(out, "Setup Instructions:")?;
    writeln!(out, "  1. Log in to your Pelecard dashboard")?;
    writeln!(out, "  2. Navigate to Settings > Webhooks")?;
    writeln!(out, "  3. Add the webhook URL above")?;
    writeln!(out, "  4. Select the events you want to receive")?;
    writeln!(out, "  5. Save the configuration")?;

    if !config.webhook.enabled {
        writeln!(out)?;
        writeln!(out, "Warning: webhooks are currently disabled.")?;
        writeln!(out, "  Set PELECARD_WEBHOOK_ENABLED=true to enable webhooks")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_url() {
        let config = PelecardConfig::default();
        assert_eq!(
            webhook_url(&config, Some("https://shop.example/")),
            "https://shop.example/pelecard/webhook"
        );
        assert_eq!(
            webhook_url(&config, None),
            "http://0.0.0.0:8080/pelecard/webhook"
        );
    }

    #[test]
    fn test_webhook_info_warns_when_disabled() {
        let mut config = PelecardConfig::default();
        let mut out = Vec::new();
        webhook_info(&config, None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Webhook URL:"));
        assert!(!text.contains("disabled"));

        config.webhook.enabled = false;
        let mut out = Vec::new();
        webhook_info(&config, None, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("disabled"));
    }

    #[test]
    fn test_endpoints_lists_all() {
        let mut out = Vec::new();
        endpoints(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), ENDPOINTS.len());
        assert!(text.contains("DebitRegularType"));
        assert!(text.contains("pelecard_transaction_id, amount"));
    }

    #[test]
    fn test_parse_data() {
        let request = parse_data(r#"{"amount": 100, "currency": "ILS"}"#).unwrap();
        assert_eq!(request.get("amount"), Some(&serde_json::json!(100)));
        assert!(parse_data("[]").is_err());
        assert!(parse_data("nope").is_err());
    }

    #[tokio::test]
    async fn test_call_rejects_unknown_endpoint() {
        let config = PelecardConfig::default();
        let mut out = Vec::new();
        let err = call(&config, "no_such_thing", "{}", false, &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown endpoint: no_such_thing");
    }

    #[tokio::test]
    async fn test_call_requires_credentials() {
        let config = PelecardConfig::default();
        let mut out = Vec::new();
        let err = call(&config, "get_sapak_number", "{}", false, &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("credentials"));
        assert!(out.is_empty());
    }
}
