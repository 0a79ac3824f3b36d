use clap::Parser;
use streamd::Config;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(version)]
struct Args {
    /// Set config file path
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    streamd::metrics_register();
    let args = Args::parse();
    let cfg = Config::parse(args.config);
    utils::set_log(format!("streamd={},sqlx=warn", cfg.log.level));
    warn!("set log level : {}", cfg.log.level);
    debug!("config : {:?}", cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.http.listen)
        .await
        .unwrap();
    info!("Server listening on {}", listener.local_addr().unwrap());

    streamd::serve(cfg, listener, shutdown_signal()).await;
    info!("Server shutdown");
}

async fn shutdown_signal() {
    let signal = signal::wait_for_stop_signal().await;
    debug!("Received signal: {}", signal);
}
