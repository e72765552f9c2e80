use envconfig::Envconfig;
use std::{
    fmt::{Display, Formatter, Result},
    net::SocketAddr,
};

#[derive(Envconfig, Clone, Debug)]
pub struct ProviderConfig {
    #[envconfig(from = "WORKER_THREADS")]
    pub worker_threads: Option<usize>,
    /// Unix socket the driver connects to. A leading `@` names an abstract socket.
    #[envconfig(from = "PROVIDER_ENDPOINT", default = "/tmp/pulumi.sock")]
    pub endpoint: String,
    #[envconfig(from = "ESC_API_URL", default = "https://api.pulumi.com/api/esc")]
    pub esc_api_url: String,
    #[envconfig(from = "HEALTH_SERVER_ADDRESS", default = "0.0.0.0:8080")]
    pub health_address: SocketAddr,
    #[envconfig(from = "HTTP_CLIENT_TIMEOUT_SECS")]
    pub http_client_timeout_secs: Option<u64>,
    #[envconfig(
        from = "USER_AGENT",
        default = "secrets-store-csi-driver-provider-pulumi-esc"
    )]
    pub user_agent: String,
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Display for ProviderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "WORKER_THREADS: {:?}", self.worker_threads)?;
        writeln!(f, "PROVIDER_ENDPOINT: {}", self.endpoint)?;
        writeln!(f, "ESC_API_URL: {}", self.esc_api_url)?;
        writeln!(f, "HEALTH_SERVER_ADDRESS: {}", self.health_address)?;
        writeln!(
            f,
            "HTTP_CLIENT_TIMEOUT_SECS: {:?}",
            self.http_client_timeout_secs
        )?;
        writeln!(f, "USER_AGENT: {}", self.user_agent)?;
        writeln!(f, "LOG_LEVEL: {}", self.log_level)
    }
}
