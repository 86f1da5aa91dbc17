//! Plugin process entry point
//!
//! Terraform launches the plugin, reads the go-plugin handshake line from
//! stdout and then talks gRPC over TLS. Logs therefore go to stderr, which
//! Terraform captures into its own log.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::proto::provider_server::ProviderServer;
use crate::provider::Provider;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tonic::transport::{Identity, Server, ServerTlsConfig};

pub const CERT_PATH_ENV: &str = "TF_PLUGIN_CERT_PATH";
pub const KEY_PATH_ENV: &str = "TF_PLUGIN_KEY_PATH";

const CERT_FILE: &str = "localhost.pem";
const KEY_FILE: &str = "localhost-key.pem";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// TF_LOG_PROVIDER wins over TF_LOG; unset or unrecognised means Info
    pub fn from_env() -> Self {
        ["TF_LOG_PROVIDER", "TF_LOG"]
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .and_then(|v| Self::parse(&v))
            .unwrap_or(LogLevel::Info)
    }

    /// Accepts Terraform's level names; `json` is Terraform's trace-in-JSON mode
    pub fn parse(value: &str) -> Option<Self> {
        let level = match value.trim().to_ascii_lowercase().as_str() {
            "trace" | "json" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => return None,
        };
        Some(level)
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Applies to both directions; schemas and large states exceed tonic's 4 MiB default
    pub max_message_size: usize,
    pub log_level: LogLevel,
    /// Grace period between StopProvider and closing the listener
    pub shutdown_timeout: Duration,
    /// Let Terraform accept provider-normalised values after apply
    pub legacy_type_system: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let certs = Path::new("certs");
        Self {
            cert_path: certs.join(CERT_FILE),
            key_path: certs.join(KEY_FILE),
            max_message_size: 256 << 20,
            log_level: LogLevel::Info,
            shutdown_timeout: Duration::from_secs(1),
            legacy_type_system: false,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by TF_PLUGIN_CERT_PATH, TF_PLUGIN_KEY_PATH and the TF_LOG variables
    pub fn from_env() -> Self {
        let mut config = Self {
            log_level: LogLevel::from_env(),
            ..Self::default()
        };
        if let Some(path) = std::env::var_os(CERT_PATH_ENV) {
            config.cert_path = PathBuf::from(path);
        }
        if let Some(path) = std::env::var_os(KEY_PATH_ENV) {
            config.key_path = PathBuf::from(path);
        }
        config
    }

    /// Looks for the certificate pair in `dir` unless the environment names them
    pub fn with_cert_dir(mut self, dir: &Path) -> Self {
        if std::env::var_os(CERT_PATH_ENV).is_none() {
            self.cert_path = dir.join(CERT_FILE);
        }
        if std::env::var_os(KEY_PATH_ENV).is_none() {
            self.key_path = dir.join(KEY_FILE);
        }
        self
    }

    pub fn with_legacy_type_system(mut self, enabled: bool) -> Self {
        self.legacy_type_system = enabled;
        self
    }
}

/// Installs the stderr subscriber; a second call is a no-op
pub fn init_logging(level: LogLevel) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::from(level))
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

async fn load_identity(config: &ServerConfig) -> Result<Identity> {
    let read = |path: PathBuf, what: &'static str| async move {
        tokio::fs::read(&path)
            .await
            .map_err(|e| TfplugError::Tls(format!("reading {} {}: {}", what, path.display(), e)))
    };
    let cert = read(config.cert_path.clone(), "certificate").await?;
    let key = read(config.key_path.clone(), "key").await?;
    Ok(Identity::from_pem(cert, key))
}

/// Serves `provider` until Terraform sends StopProvider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    init_logging(config.log_level);

    // Err only means another crypto provider is already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let identity = load_identity(&config).await?;
    let type_name = provider.type_name().to_string();
    let grpc_server =
        GrpcProviderServer::new(provider).with_legacy_type_system(config.legacy_type_system);
    let stop = grpc_server.context();
    let service = ProviderServer::new(grpc_server)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tracing::info!("Serving {} provider on {}", type_name, addr);
    println!("1|6|tcp|{}|grpc", addr);

    let grace = config.shutdown_timeout;
    Server::builder()
        .tls_config(ServerTlsConfig::new().identity(identity))?
        .add_service(service)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                stop.cancelled().await;
                tracing::info!("StopProvider received, shutting down");
                tokio::time::sleep(grace).await;
            },
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [CERT_PATH_ENV, KEY_PATH_ENV, "TF_LOG_PROVIDER", "TF_LOG"] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn log_level_parses_terraform_values() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("json"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
    }

    #[test]
    #[serial]
    fn provider_log_level_wins() {
        clear_env();
        std::env::set_var("TF_LOG", "error");
        std::env::set_var("TF_LOG_PROVIDER", "debug");
        assert_eq!(LogLevel::from_env(), LogLevel::Debug);

        std::env::remove_var("TF_LOG_PROVIDER");
        assert_eq!(LogLevel::from_env(), LogLevel::Error);
        clear_env();
    }

    #[test]
    #[serial]
    fn environment_overrides_cert_dir() {
        clear_env();
        std::env::set_var(CERT_PATH_ENV, "/tmp/cert.pem");

        let config = ServerConfig::from_env().with_cert_dir(Path::new("/opt/plugins/certs"));
        assert_eq!(config.cert_path, PathBuf::from("/tmp/cert.pem"));
        assert_eq!(
            config.key_path,
            PathBuf::from("/opt/plugins/certs/localhost-key.pem")
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn defaults_without_environment() {
        clear_env();

        let config = ServerConfig::from_env();
        assert_eq!(config.cert_path, PathBuf::from("certs/localhost.pem"));
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.max_message_size, 256 * 1024 * 1024);
        assert!(!config.legacy_type_system);
    }

    #[tokio::test]
    async fn missing_certificate_is_a_tls_error() {
        let config = ServerConfig {
            cert_path: PathBuf::from("/nonexistent/localhost.pem"),
            ..ServerConfig::default()
        };
        let err = load_identity(&config).await.unwrap_err();
        assert!(matches!(err, TfplugError::Tls(_)));
        assert!(err.to_string().contains("/nonexistent/localhost.pem"));
    }
}
