use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::http::connection::Connection;
use crate::www::WwwServer;

pub async fn run(listen_addr: &str, server: Arc<WwwServer>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!("Listening on {}", listen_addr);

    serve(listener, server).await
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, server: Arc<WwwServer>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        tracing::debug!("Accepted connection from {}", peer);

        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, server);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
