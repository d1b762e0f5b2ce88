//! Command line and environment configuration.
//!
//! Every setting has a flag and an environment variable; nothing is read
//! from the environment outside of [`Cli::parse`].

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::{Args, Parser, Subcommand, ValueEnum};
use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::notary::{RegistryTemplate, RetryPolicy};
use crate::pipeline::PipelineOptions;
use crate::primitives::decode_fixed_hex;

pub const DEFAULT_REGISTRY_URL: &str =
    "https://web-production-05160.up.railway.app/VigenciaCedula/consulta";
pub const DEFAULT_CLIENT_IP: &str = "143.137.96.53";
pub const DEFAULT_LOG_FILTER: &str = "proofheir=info,tower_http=debug";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_NOTARY_PORT: u16 = 7047;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("NOTARY_URL is set but NOTARY_PUBLIC_KEY is missing")]
    MissingNotaryKey,

    #[error("NOTARY_URL and NOTARY_SIGNING_KEY are mutually exclusive")]
    ConflictingNotary,

    #[error("{name} is not a valid key: {reason}")]
    InvalidKey { name: &'static str, reason: String },

    #[error("CIVIL_REGISTRY_URL: {0}")]
    InvalidRegistry(String),

    #[error("ALLOWED_ORIGIN is not a valid header value: {0}")]
    InvalidOrigin(String),

    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("BIND_ADDRESS is neither host:port nor an IP address: {0}")]
    InvalidBindAddress(String),
}

#[derive(Debug, Parser)]
#[command(name = "proofheir")]
#[command(version)]
#[command(about = "Notarized civil-registry facts proven in zero knowledge for inheritance claims")]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "text", help = "Log output format")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the prover HTTP service.
    Serve(ServiceConfig),

    /// Run a standalone notary for registry exchanges.
    Notary(NotaryConfig),

    /// Run the circuit setup and write both key files.
    Setup {
        #[arg(long, env = "PROVING_KEY_PATH", default_value = "keys/claim.pk")]
        proving_key: PathBuf,

        #[arg(long, env = "VERIFYING_KEY_PATH", default_value = "keys/claim.vk")]
        verifying_key: PathBuf,
    },

    /// Print the identity commitment to register on chain.
    Commit {
        /// Document number, 1 to 15 digits.
        nuip: String,

        /// 32-byte hex salt. A random one is drawn when omitted.
        #[arg(long)]
        salt: Option<String>,
    },

    /// Verify a `{ proof, publicInputs }` JSON file.
    Verify {
        proof: PathBuf,

        /// Verifying key file. The deterministic setup key is used when omitted.
        #[arg(long, env = "VERIFYING_KEY_PATH")]
        verifying_key: Option<PathBuf>,
    },
}

/// Settings for `proofheir serve`.
#[derive(Debug, Clone, Args)]
pub struct ServiceConfig {
    /// `host:port`, or a bare IP that listens on `PORT`.
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:3001")]
    pub bind_address: String,

    /// Overrides the port in `BIND_ADDRESS`.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Browser origin allowed by CORS.
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = "http://localhost:3000")]
    pub allowed_origin: String,

    #[arg(long, env = "CIVIL_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    pub registry_url: String,

    /// Client address sent in the registry lookup body.
    #[arg(long, env = "REGISTRY_CLIENT_IP", default_value = DEFAULT_CLIENT_IP)]
    pub registry_client_ip: String,

    /// Remote notary base URL. Without it the service notarizes in process.
    #[arg(long, env = "NOTARY_URL")]
    pub notary_url: Option<String>,

    /// Hex Ed25519 public key of the remote notary.
    #[arg(long, env = "NOTARY_PUBLIC_KEY")]
    pub notary_public_key: Option<String>,

    /// Hex Ed25519 seed for the in-process notary. Ephemeral when omitted.
    #[arg(long, env = "NOTARY_SIGNING_KEY", hide_env_values = true)]
    pub notary_signing_key: Option<String>,

    /// Ceremony proving key. The deterministic setup runs when omitted.
    #[arg(long, env = "PROVING_KEY_PATH")]
    pub proving_key_path: Option<PathBuf>,

    #[arg(long, env = "VERIFYING_KEY_PATH")]
    pub verifying_key_path: Option<PathBuf>,

    #[arg(long, env = "REGISTRY_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "REGISTRY_EXCHANGE_TIMEOUT_SECS", default_value_t = 10)]
    pub exchange_timeout_secs: u64,

    /// Deadline across all notarization attempts.
    #[arg(long, env = "NOTARIZE_TIMEOUT_SECS", default_value_t = 30)]
    pub notarize_timeout_secs: u64,

    #[arg(long, env = "PROVING_TIMEOUT_SECS", default_value_t = 60)]
    pub proving_timeout_secs: u64,

    #[arg(long, env = "NOTARY_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    #[arg(long, env = "NOTARY_RETRY_BACKOFF_MS", default_value_t = 250)]
    pub retry_backoff_ms: u64,

    /// Concurrent proofs.
    #[arg(long, env = "PROVER_WORKERS", default_value_t = 2)]
    pub prover_workers: usize,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.notary_url, &self.notary_public_key, &self.notary_signing_key) {
            (Some(_), None, _) => return Err(ConfigError::MissingNotaryKey),
            (Some(_), _, Some(_)) => return Err(ConfigError::ConflictingNotary),
            _ => {}
        }
        self.notary_public_key()?;
        self.notary_signing_key()?;
        self.registry_template()?;
        self.allowed_origin()?;
        self.bind_addr()?;

        if self.prover_workers == 0 {
            return Err(ConfigError::Zero("PROVER_WORKERS"));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Zero("NOTARY_RETRY_ATTEMPTS"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve_bind_addr(&self.bind_address, self.port, DEFAULT_PORT)
    }

    pub fn allowed_origin(&self) -> Result<HeaderValue, ConfigError> {
        HeaderValue::from_str(&self.allowed_origin).map_err(|e| ConfigError::InvalidOrigin(e.to_string()))
    }

    pub fn registry_template(&self) -> Result<RegistryTemplate, ConfigError> {
        RegistryTemplate::new(self.registry_url.clone(), self.registry_client_ip.clone())
            .map_err(|e| ConfigError::InvalidRegistry(e.to_string()))
    }

    pub fn notary_public_key(&self) -> Result<Option<VerifyingKey>, ConfigError> {
        self.notary_public_key
            .as_deref()
            .map(|hex| parse_verifying_key("NOTARY_PUBLIC_KEY", hex))
            .transpose()
    }

    pub fn notary_signing_key(&self) -> Result<Option<SigningKey>, ConfigError> {
        self.notary_signing_key
            .as_deref()
            .map(|hex| parse_signing_key("NOTARY_SIGNING_KEY", hex))
            .transpose()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            deadline: Duration::from_secs(self.notarize_timeout_secs),
            ..RetryPolicy::default()
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            retry: self.retry_policy(),
            proving_timeout: Duration::from_secs(self.proving_timeout_secs),
            prover_workers: self.prover_workers,
        }
    }
}

/// Settings for `proofheir notary`.
#[derive(Debug, Clone, Args)]
pub struct NotaryConfig {
    /// `host:port`, or a bare IP that listens on `NOTARY_PORT`.
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:7047")]
    pub bind_address: String,

    /// Overrides the port in `BIND_ADDRESS`.
    #[arg(long, env = "NOTARY_PORT")]
    pub port: Option<u16>,

    /// Hex Ed25519 seed. Ephemeral when omitted.
    #[arg(long, env = "NOTARY_SIGNING_KEY", hide_env_values = true)]
    pub signing_key: Option<String>,

    /// Registry hosts this notary will contact. Any host when empty.
    #[arg(long = "allowed-host", env = "NOTARY_ALLOWED_HOSTS", value_delimiter = ',')]
    pub allowed_hosts: Vec<String>,

    #[arg(long, env = "REGISTRY_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "REGISTRY_EXCHANGE_TIMEOUT_SECS", default_value_t = 10)]
    pub exchange_timeout_secs: u64,
}

impl NotaryConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve_bind_addr(&self.bind_address, self.port, DEFAULT_NOTARY_PORT)
    }

    pub fn signing_key(&self) -> Result<Option<SigningKey>, ConfigError> {
        self.signing_key
            .as_deref()
            .map(|hex| parse_signing_key("NOTARY_SIGNING_KEY", hex))
            .transpose()
    }
}

/// A full `host:port` keeps its port unless `port` is set. A bare IP
/// listens on `port` or `default_port`.
fn resolve_bind_addr(address: &str, port: Option<u16>, default_port: u16) -> Result<SocketAddr, ConfigError> {
    if let Ok(mut addr) = address.parse::<SocketAddr>() {
        if let Some(port) = port {
            addr.set_port(port);
        }
        return Ok(addr);
    }
    let ip = address
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidBindAddress(address.to_string()))?;
    Ok(SocketAddr::new(ip, port.unwrap_or(default_port)))
}

pub fn parse_signing_key(name: &'static str, hex: &str) -> Result<SigningKey, ConfigError> {
    let seed = decode_fixed_hex::<32>(hex).map_err(|e| ConfigError::InvalidKey {
        name,
        reason: e.to_string(),
    })?;
    Ok(SigningKey::from_bytes(&seed))
}

pub fn parse_verifying_key(name: &'static str, hex: &str) -> Result<VerifyingKey, ConfigError> {
    let bytes = decode_fixed_hex::<32>(hex).map_err(|e| ConfigError::InvalidKey {
        name,
        reason: e.to_string(),
    })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| ConfigError::InvalidKey {
        name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn serve(args: &[&str]) -> ServiceConfig {
        let mut argv = vec!["proofheir", "serve"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Serve(config) => config,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = serve(&[]);
        assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:3001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.pipeline_options().proving_timeout, Duration::from_secs(60));
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_notary_needs_public_key() {
        let config = serve(&["--notary-url", "http://notary:7047"]);
        assert!(matches!(config.validate(), Err(ConfigError::MissingNotaryKey)));

        let key = hex::encode(SigningKey::generate(&mut OsRng).verifying_key().to_bytes());
        let config = serve(&["--notary-url", "http://notary:7047", "--notary-public-key", &key]);
        assert!(config.validate().is_ok());
        assert!(config.notary_public_key().unwrap().is_some());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            serve(&["--notary-signing-key", "0x1234"]).validate(),
            Err(ConfigError::InvalidKey { name: "NOTARY_SIGNING_KEY", .. })
        ));
        assert!(matches!(
            serve(&["--registry-url", "http://registry.test/consulta"]).validate(),
            Err(ConfigError::InvalidRegistry(_))
        ));
        assert!(matches!(
            serve(&["--prover-workers", "0"]).validate(),
            Err(ConfigError::Zero("PROVER_WORKERS"))
        ));
    }

    #[test]
    fn test_bind_address_forms() {
        let addr = |args: &[&str]| serve(args).bind_addr().unwrap().to_string();

        assert_eq!(addr(&["--bind-address", "127.0.0.1:8080"]), "127.0.0.1:8080");
        assert_eq!(addr(&["--bind-address", "127.0.0.1:8080", "--port", "9090"]), "127.0.0.1:9090");
        assert_eq!(addr(&["--bind-address", "127.0.0.1"]), "127.0.0.1:3001");
        assert_eq!(addr(&["--bind-address", "::1", "--port", "4000"]), "[::1]:4000");
        assert_eq!(addr(&["--port", "4000"]), "0.0.0.0:4000");

        assert!(matches!(
            serve(&["--bind-address", "localhost:3001"]).validate(),
            Err(ConfigError::InvalidBindAddress(_))
        ));
    }

    #[test]
    fn test_notary_bind_address_default() {
        let cli = Cli::try_parse_from(["proofheir", "notary"]).unwrap();
        match cli.command {
            Command::Notary(config) => assert_eq!(config.bind_addr().unwrap().port(), DEFAULT_NOTARY_PORT),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_signing_key_round_trip() {
        let key = SigningKey::generate(&mut OsRng);
        let parsed = parse_signing_key("k", &format!("0x{}", hex::encode(key.to_bytes()))).unwrap();
        assert_eq!(parsed.verifying_key(), key.verifying_key());
    }

    #[test]
    fn test_notary_allowed_hosts() {
        let cli = Cli::try_parse_from(["proofheir", "notary", "--allowed-host", "a.test,b.test"]).unwrap();
        match cli.command {
            Command::Notary(config) => assert_eq!(config.allowed_hosts, ["a.test", "b.test"]),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
