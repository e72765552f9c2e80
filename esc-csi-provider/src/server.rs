use crate::{
    config::ProviderConfig,
    helper::{esc_client::EscClient, k8s_driver::KubeSecretStore},
    logic::{credentials::CredentialResolver, mount::MountHandler},
    router::{
        grpc::CsiProviderService,
        health::{self, Readiness},
    },
};
use anyhow::{Context, Result};
use esc_csi_domain::MountConfigOptions;
use std::{io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, UnixListener},
    signal::unix::{signal, SignalKind},
    sync::watch,
};
use tokio_stream::wrappers::UnixListenerStream;
use tracing::{error, info};

pub struct Server {
    config: ProviderConfig,
    handler: Arc<MountHandler>,
    readiness: Arc<Readiness>,
}

impl Server {
    pub async fn init(config: ProviderConfig) -> Result<Self> {
        let secrets = KubeSecretStore::new().await?;
        let environments = EscClient::new(
            &config.user_agent,
            config.http_client_timeout_secs.map(Duration::from_secs),
        )?;

        let handler = MountHandler::new(
            CredentialResolver::new(Arc::new(secrets)),
            Arc::new(environments),
            MountConfigOptions::new(&config.esc_api_url),
        );

        Ok(Self::new(config, handler))
    }

    pub fn new(config: ProviderConfig, handler: MountHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            readiness: Arc::new(Readiness::default()),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let listener = bind(&self.config.endpoint)?;
        let health_listener = TcpListener::bind(self.config.health_address)
            .await
            .with_context(|| format!("Could not bind {}", self.config.health_address))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        let provider = tonic::transport::Server::builder()
            .add_service(CsiProviderService::new(self.handler.clone()).into_server())
            .serve_with_incoming_shutdown(
                UnixListenerStream::new(listener),
                stopped(shutdown_rx.clone()),
            );

        let health = axum::serve(
            health_listener,
            health::get_router(self.readiness.clone()).into_make_service(),
        )
        .with_graceful_shutdown(stopped(shutdown_rx));

        info!("Provider listening on {}", self.config.endpoint);
        info!("Health server listening on {}", self.config.health_address);
        self.readiness.set_ready(true);

        let served = tokio::try_join!(
            async { provider.await.context("Provider server error") },
            async { health.await.context("Health server error") },
        );

        self.readiness.set_ready(false);
        remove_socket(&self.config.endpoint);
        served?;

        info!("Provider stopped");
        Ok(())
    }
}

fn bind(endpoint: &str) -> Result<UnixListener> {
    if let Some(name) = endpoint.strip_prefix('@') {
        return bind_abstract(name);
    }

    match std::fs::remove_file(endpoint) {
        Ok(()) => info!("Removed stale socket {endpoint}"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Could not remove {endpoint}")),
    }

    if let Some(parent) = Path::new(endpoint).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }

    UnixListener::bind(endpoint).with_context(|| format!("Could not bind {endpoint}"))
}

#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> Result<UnixListener> {
    use std::os::linux::net::SocketAddrExt;

    let address = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())
        .with_context(|| format!("Invalid abstract socket name @{name}"))?;
    let listener = std::os::unix::net::UnixListener::bind_addr(&address)
        .with_context(|| format!("Could not bind @{name}"))?;
    listener.set_nonblocking(true)?;

    Ok(UnixListener::from_std(listener)?)
}

#[cfg(not(target_os = "linux"))]
fn bind_abstract(name: &str) -> Result<UnixListener> {
    anyhow::bail!("Abstract socket @{name} is only supported on linux")
}

fn remove_socket(endpoint: &str) {
    if endpoint.starts_with('@') {
        return;
    }
    if let Err(e) = std::fs::remove_file(endpoint) {
        if e.kind() != ErrorKind::NotFound {
            error!("Could not remove socket {endpoint}: {e}");
        }
    }
}

async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Could not listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
