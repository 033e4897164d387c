use std::sync::Arc;

use pathguard::config::{Config, LogFormat, LoggingConfig};
use pathguard::fs::{FileAccess, ReactiveFs};
use pathguard::http::response::{ResponseDescriptor, StatusCode};
use pathguard::server;
use pathguard::www::{ApiRequest, RouteTable, WwwServer};
use tracing_subscriber::EnvFilter;

fn init_logging(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match cfg.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn routes(fs: &ReactiveFs, root: std::path::PathBuf) -> RouteTable {
    let fs = fs.clone();

    RouteTable::new()
        .route("/api/files", move |_req: ApiRequest| {
            let listing = fs.list_directory(root.clone());
            async move {
                let names = listing.await?;
                Ok::<_, anyhow::Error>(ResponseDescriptor::json(StatusCode::Ok, &names)?)
            }
        })
        .route("/api/echo", |req: ApiRequest| async move {
            Ok::<_, anyhow::Error>(ResponseDescriptor::json(StatusCode::Ok, &req.body)?)
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    init_logging(&cfg.logging);

    let fs = ReactiveFs::new(FileAccess::new(cfg.lock_manager()));
    let mut builder = WwwServer::builder(fs.clone())
        .root(cfg.www.root.clone())
        .index(cfg.www.index.clone())
        .routes(routes(&fs, cfg.www.root.clone()));
    for (key, value) in &cfg.www.headers {
        builder = builder.default_header(key, value);
    }
    let server = Arc::new(builder.build());

    tracing::info!(root = %cfg.www.root.display(), routes = server.routes().len(), "www server ready");

    tokio::select! {
        res = server::listener::run(&cfg.server.listen_addr, server) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
