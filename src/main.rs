//! gozero binary: bootstrap the scale-to-zero reverse proxy.

use gozero::config::env;
use gozero::lifecycle::signals;
use gozero::observability::{logging, metrics};
use gozero::{HttpReverseProxy, ProxyOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    // The environment is read exactly once, here.
    let options = ProxyOptions::default()
        .with_listen_port(env::get_env_or_default_u16("GOZERO_LISTEN_PORT", 8443))
        .with_buffer_size(env::get_env_or_default_usize("GOZERO_BUFFER_SIZE", 1000))
        .with_dev_mode(env::get_env_or_default_bool("IS_DEV", false));

    tracing::info!(
        listen_port = options.listen_port,
        buffer_size = options.buffer_size,
        dev_mode = options.dev_mode,
        "Configuration loaded"
    );

    let metrics_address = env::get_env_or_default_string("GOZERO_METRICS_ADDRESS", "");
    if !metrics_address.is_empty() {
        match metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(metrics_address = %metrics_address, "Failed to parse metrics address")
            }
        }
    }

    let proxy = HttpReverseProxy::new(options)?;
    let mut requests = proxy.requests().ok_or("routing-event stream already taken")?;
    proxy.start().await?;

    // The external scale controller's seat: drain routing events. Until
    // one is wired up, log them.
    let consumer = tokio::spawn(async move {
        while let Some(event) = requests.recv().await {
            tracing::info!(host = %event.host, path = %event.path, "Routing event");
        }
        tracing::info!("Routing event stream closed");
    });

    signals::shutdown_signal().await;

    proxy.shutdown().await?;
    consumer.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
