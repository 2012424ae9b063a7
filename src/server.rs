//! TCP accept loop and replica bootstrap.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::connection::handle_client_connection;
use crate::engine::Engine;
use crate::replica_link::run_replica_link;
use crate::replication::Role;

pub struct Server {
    engine: Arc<Engine>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Server {
            engine: Arc::new(Engine::new(config)),
        }
    }

    /// Binds the listening socket and serves clients until the process
    /// stops. A replica additionally keeps a background task connected to
    /// its master.
    pub async fn run(self) -> anyhow::Result<()> {
        if let Role::Replica {
            master_host,
            master_port,
        } = self.engine.replication.role.clone()
        {
            let engine = Arc::clone(&self.engine);

            tokio::spawn(async move {
                if let Err(link_error) =
                    run_replica_link(engine, &master_host, master_port).await
                {
                    error!(error = %link_error, "replication link failed");
                }
            });
        }

        let propagation_engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            propagation_engine.replication.run_propagation().await;
        });

        let port = self.engine.config.port;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;

        info!(port, role = self.engine.replication.role.name(), "listening");

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .context("failed to accept connection")?;
            let engine = Arc::clone(&self.engine);

            tokio::spawn(async move {
                handle_client_connection(stream, engine).await;
            });
        }
    }
}
