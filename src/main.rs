//! `proofheir` binary: prover service, notary role and key tooling.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing_subscriber::EnvFilter;

use proofheir::api::{self, AppState, NotaryState};
use proofheir::chain::ChainProof;
use proofheir::commitment::{commit, Salt, SALT_LEN};
use proofheir::config::{Cli, Command, LogFormat, NotaryConfig, ServiceConfig, DEFAULT_LOG_FILTER};
use proofheir::notary::{
    HttpsTransport, LocalNotary, Notary, RegistryTransport, RemoteNotary, TranscriptNotary,
};
use proofheir::primitives::to_prefixed_hex;
use proofheir::prover::{save_verifying_key, ClaimProver};
use proofheir::{ClaimPipeline, ClaimVerifier};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve(config) => serve(config).await,
        Command::Notary(config) => notary(config).await,
        Command::Setup {
            proving_key,
            verifying_key,
        } => setup(&proving_key, &verifying_key),
        Command::Commit { nuip, salt } => print_commitment(&nuip, salt.as_deref()),
        Command::Verify {
            proof,
            verifying_key,
        } => verify(&proof, verifying_key.as_deref()),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn serve(config: ServiceConfig) -> Result<()> {
    config.validate()?;
    let template = config.registry_template()?;
    let transport: Arc<dyn RegistryTransport> =
        Arc::new(HttpsTransport::new(config.connect_timeout(), config.exchange_timeout())?);

    let (notary, notary_key) = build_notary(&config, transport.clone())?;

    let key_config = config.clone();
    let (prover, verifier) = tokio::task::spawn_blocking(move || load_keys(&key_config))
        .await
        .context("key loading task failed")??;

    let pipeline = ClaimPipeline::new(
        notary,
        notary_key,
        template.clone(),
        Arc::new(prover),
        Arc::new(verifier),
        config.pipeline_options(),
    );
    let registry_url = template.url().to_string();
    let state = AppState::new(Arc::new(pipeline), transport, template);
    let app = api::app(state).layer(api::cors(config.allowed_origin()?));

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, registry = %registry_url, "ProofHeir prover listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(api::shutdown_signal())
        .await?;
    Ok(())
}

fn build_notary(
    config: &ServiceConfig,
    transport: Arc<dyn RegistryTransport>,
) -> Result<(Arc<dyn TranscriptNotary>, VerifyingKey)> {
    if let (Some(url), Some(key)) = (&config.notary_url, config.notary_public_key()?) {
        tracing::info!(%url, "using remote notary");
        let remote = RemoteNotary::new(url, Duration::from_secs(config.notarize_timeout_secs))?;
        return Ok((Arc::new(remote), key));
    }

    let signing_key = config.notary_signing_key()?.unwrap_or_else(|| {
        tracing::warn!("NOTARY_SIGNING_KEY not set, notarizing with an ephemeral key");
        SigningKey::generate(&mut OsRng)
    });
    let (_, host) = config.registry_template()?.request_for(0).target()?;
    let local = Notary::new(signing_key, transport).with_allowed_hosts(vec![host]);
    let key = local.verifying_key();
    Ok((Arc::new(LocalNotary::new(Arc::new(local))), key))
}

fn load_keys(config: &ServiceConfig) -> Result<(ClaimProver, ClaimVerifier)> {
    let Some(pk_path) = &config.proving_key_path else {
        tracing::warn!("PROVING_KEY_PATH not set, running the deterministic setup");
        let (prover, vk) = ClaimProver::setup()?;
        return Ok((prover, ClaimVerifier::new(vk)?));
    };

    let prover = ClaimProver::load_proving_key(pk_path)
        .with_context(|| format!("loading proving key {}", pk_path.display()))?;
    let verifier = match &config.verifying_key_path {
        Some(vk_path) => ClaimVerifier::load(vk_path)
            .with_context(|| format!("loading verifying key {}", vk_path.display()))?,
        None => ClaimVerifier::new(prover.verifying_key().clone())?,
    };
    if verifier.verifying_key() != prover.verifying_key() {
        bail!("verifying key does not belong to the proving key");
    }
    tracing::info!(path = %pk_path.display(), "proving key loaded");
    Ok((prover, verifier))
}

async fn notary(config: NotaryConfig) -> Result<()> {
    let signing_key = config.signing_key()?.unwrap_or_else(|| {
        tracing::warn!("NOTARY_SIGNING_KEY not set, using an ephemeral key");
        SigningKey::generate(&mut OsRng)
    });
    let transport = HttpsTransport::new(
        Duration::from_secs(config.connect_timeout_secs),
        Duration::from_secs(config.exchange_timeout_secs),
    )?;
    let notary = Notary::new(signing_key, Arc::new(transport)).with_allowed_hosts(config.allowed_hosts.clone());
    tracing::info!(
        public_key = %hex::encode(notary.verifying_key().to_bytes()),
        allowed_hosts = ?config.allowed_hosts,
        "notary key"
    );

    let app = api::notary_app(NotaryState {
        notary: Arc::new(notary),
    });
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, "notary listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(api::shutdown_signal())
        .await?;
    Ok(())
}

fn setup(proving_key: &Path, verifying_key: &Path) -> Result<()> {
    for path in [proving_key, verifying_key] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    tracing::info!("running circuit setup");
    let (prover, vk) = ClaimProver::setup()?;
    prover.save_proving_key(proving_key)?;
    save_verifying_key(&vk, verifying_key)?;

    println!("proving key:   {}", proving_key.display());
    println!("verifying key: {}", verifying_key.display());
    Ok(())
}

fn print_commitment(nuip: &str, salt: Option<&str>) -> Result<()> {
    let salt = match salt {
        Some(hex) => Salt::parse(hex)?,
        None => {
            let mut bytes = [0u8; SALT_LEN];
            OsRng.fill_bytes(&mut bytes);
            Salt::from_bytes(bytes)
        }
    };
    let commitment = commit(nuip, &salt)?;

    // The heir needs the salt to claim later.
    println!("salt:       {}", to_prefixed_hex(salt.as_bytes()));
    println!("commitment: {}", commitment.to_hex());
    Ok(())
}

fn verify(proof_path: &Path, verifying_key: Option<&Path>) -> Result<()> {
    let raw = std::fs::read_to_string(proof_path)
        .with_context(|| format!("reading {}", proof_path.display()))?;
    let chain: ChainProof = serde_json::from_str(&raw).context("proof file is not { proof, publicInputs }")?;

    let verifier = match verifying_key {
        Some(path) => ClaimVerifier::load(path)?,
        None => ClaimVerifier::new(ClaimProver::setup()?.1)?,
    };
    let report = verifier.verify_with_report(&chain)?;
    let inputs = &report.public_inputs;

    println!("layout version:    {}", report.layout_version);
    println!("recipient:         {}", inputs.recipient);
    println!("server hash:       {}", to_prefixed_hex(&inputs.server_hash));
    println!("id commitment:     {}", inputs.id_commitment.to_hex());
    println!("status commitment: {}", to_prefixed_hex(&inputs.status_commitment));

    if !report.is_valid {
        bail!("proof does not verify");
    }
    println!("proof verifies");
    Ok(())
}
