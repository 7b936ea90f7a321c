use reqwest_middleware::ClientWithMiddleware;
use reqwest_tracing::TracingMiddleware;

/// HTTP client with request tracing. Credentials are passed per-request by
/// the caller (the vendor API authenticates via query parameters).
pub fn new_tracing_client() -> anyhow::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    Ok(reqwest_middleware::ClientBuilder::new(client)
        .with(TracingMiddleware::default())
        .build())
}
