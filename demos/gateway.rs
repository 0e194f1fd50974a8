use std::sync::Arc;

use compute_kit::{
    broker_client::RemoteBrokerClient, client::ComputeClient, config::ComputeConfig, gateway,
    inference::InferenceClient,
};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ComputeConfig::from_env().expect("Invalid gateway configuration");
    tracing::info!("Using broker at {}", config.broker_url);

    let broker = RemoteBrokerClient::from_url(config.broker_url.clone());
    let inference = InferenceClient::with_timeout(config.inference_timeout)
        .expect("Failed to build inference client");
    let client = ComputeClient::new(Arc::new(broker), inference);

    let app = gateway::router(client, config.default_fallback_fee)
        .layer(TraceLayer::new_for_http());

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], config.listen_port).into();
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server running at http://{}", addr);
    axum::serve(listener, app).await.expect("Server failed");
}
