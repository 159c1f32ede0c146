use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{info, warn};

use crate::{
    broadcaster::Broadcaster, message::notice, registry::ClientRegistry, rooms::RoomTable,
    session,
};

/// Knobs for one chat instance.
#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    /// Refuse a connection whose id is already online instead of replacing the
    /// earlier registration.
    pub reject_duplicate_ids: bool,
}

impl ChatConfig {
    /// Fresh registry and room table wired together for one chat instance.
    pub fn build_hub(&self) -> Broadcaster {
        let registry = if self.reject_duplicate_ids {
            ClientRegistry::rejecting_duplicates()
        } else {
            ClientRegistry::new()
        };
        Broadcaster::new(Arc::new(registry), Arc::new(RoomTable::new()))
    }
}

pub struct Server {
    listener: TcpListener,
    hub: Broadcaster,
}

impl Server {
    pub fn with_config(listener: TcpListener, config: &ChatConfig) -> Self {
        Self {
            listener,
            hub: config.build_hub(),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server { listener, hub } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    handle_shutdown(&hub).await;
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &hub);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

async fn handle_shutdown(hub: &Broadcaster) {
    info!("server shutting down");
    hub.to_all(notice::SHUTTING_DOWN).await;
}

fn handle_accept_result(result: std::io::Result<(TcpStream, SocketAddr)>, hub: &Broadcaster) {
    match result {
        Ok((stream, peer)) => spawn_session(stream, peer, hub),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_session(stream: TcpStream, peer: SocketAddr, hub: &Broadcaster) {
    let hub = hub.clone();
    tokio::spawn(async move {
        info!(peer = %peer, "new connection");
        let (reader, writer) = stream.into_split();
        if let Err(err) = session::serve(BufReader::new(reader), writer, hub).await {
            warn!(peer = %peer, error = ?err, "client connection closed with error");
        }
    });
}
