// # zonesyncctl - DNS Record Reconciliation CLI
//
// Thin integration layer over zonesync-core. All reconciliation logic
// (validation, retries, state resolution) lives in the core library; this
// binary only reads configuration, wires up the components, and maps
// outcomes to exit codes.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Provider
// - `ZONESYNC_GODADDY_API_KEY`: GoDaddy API key
// - `ZONESYNC_GODADDY_API_SECRET`: GoDaddy API secret
// - `ZONESYNC_DOMAIN`: zone (domain) whose records are managed
//
// ### State Store
// - `ZONESYNC_STATE_PATH`: path to the local state file (omit for an
//   in-memory store, which only makes sense for dry runs)
//
// ### Engine
// - `ZONESYNC_MAX_RETRIES`: retry attempts on retryable provider failures
// - `ZONESYNC_RETRY_BASE_MS`: base backoff delay in milliseconds
//
// ### Logging
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Commands
//
// ```bash
// zonesyncctl create <name> <TYPE> <data> <ttl> [priority]
// zonesyncctl update <name> <TYPE> [--data V] [--ttl N] [--priority N]
// zonesyncctl delete <name> <TYPE>
// zonesyncctl reconcile <name> <TYPE>
// ```
//
// ## Exit codes
//
// - 0: operation succeeded
// - 1: configuration or usage error
// - 2: mutation rejected (validation failure or provider refusal)
// - 3: record left or found in conflicted state

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use zonesync_core::{
    DnsRecord, EngineConfig, FileRecordStore, MemoryRecordStore, Outcome, ProposedFields,
    RecordKey, RecordStore, RecordType, ReconciliationEngine,
};
use zonesync_provider_godaddy::GoDaddyClient;

/// Exit codes for the different termination scenarios
#[derive(Debug, Clone, Copy)]
enum CtlExitCode {
    /// Operation succeeded
    Success = 0,
    /// Configuration or usage error
    ConfigError = 1,
    /// Mutation rejected by validation or by the provider
    Rejected = 2,
    /// Record left (or found) in conflicted state
    Conflicted = 3,
}

impl From<CtlExitCode> for ExitCode {
    fn from(code: CtlExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    api_key: String,
    api_secret: String,
    domain: String,
    state_path: Option<String>,
    max_retries: Option<usize>,
    retry_base_ms: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: env::var("ZONESYNC_GODADDY_API_KEY").map_err(|_| {
                anyhow::anyhow!(
                    "ZONESYNC_GODADDY_API_KEY is required. \
                    Set it via: export ZONESYNC_GODADDY_API_KEY=your_key"
                )
            })?,
            api_secret: env::var("ZONESYNC_GODADDY_API_SECRET").map_err(|_| {
                anyhow::anyhow!(
                    "ZONESYNC_GODADDY_API_SECRET is required. \
                    Set it via: export ZONESYNC_GODADDY_API_SECRET=your_secret"
                )
            })?,
            domain: env::var("ZONESYNC_DOMAIN").map_err(|_| {
                anyhow::anyhow!(
                    "ZONESYNC_DOMAIN is required. \
                    Set it via: export ZONESYNC_DOMAIN=example.com"
                )
            })?,
            state_path: env::var("ZONESYNC_STATE_PATH").ok(),
            max_retries: env::var("ZONESYNC_MAX_RETRIES")
                .ok()
                .map(|s| s.parse())
                .transpose()
                .map_err(|e| anyhow::anyhow!("ZONESYNC_MAX_RETRIES must be a number: {e}"))?,
            retry_base_ms: env::var("ZONESYNC_RETRY_BASE_MS")
                .ok()
                .map(|s| s.parse())
                .transpose()
                .map_err(|e| anyhow::anyhow!("ZONESYNC_RETRY_BASE_MS must be a number: {e}"))?,
            log_level: env::var("ZONESYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            anyhow::bail!("ZONESYNC_GODADDY_API_KEY and ZONESYNC_GODADDY_API_SECRET cannot be empty");
        }

        // Check for obvious placeholder credentials (common mistake)
        let key_lower = self.api_key.to_lowercase();
        if key_lower.contains("your_key")
            || key_lower.contains("replace_me")
            || key_lower.contains("example")
        {
            anyhow::bail!(
                "ZONESYNC_GODADDY_API_KEY appears to be a placeholder. \
                Use an actual API key from your GoDaddy developer account."
            );
        }

        self.validate_domain_name(&self.domain)?;

        if let Some(ref path) = self.state_path {
            if path.is_empty() {
                anyhow::bail!("ZONESYNC_STATE_PATH cannot be empty when set");
            }
        }

        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            anyhow::bail!("ZONESYNC_MAX_RETRIES must be at most 10. Got: {max_retries}");
        }

        if let Some(base) = self.retry_base_ms
            && !(1..=60_000).contains(&base)
        {
            anyhow::bail!(
                "ZONESYNC_RETRY_BASE_MS must be between 1 and 60000 milliseconds. Got: {base}"
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Validate that the zone is a plausible domain name (RFC 1035 labels)
    fn validate_domain_name(&self, domain: &str) -> Result<()> {
        if domain.is_empty() {
            anyhow::bail!("ZONESYNC_DOMAIN cannot be empty");
        }

        if domain.len() > 253 {
            anyhow::bail!(
                "ZONESYNC_DOMAIN too long: {} chars (max 253)",
                domain.len()
            );
        }

        for label in domain.split('.') {
            if label.is_empty() {
                anyhow::bail!("ZONESYNC_DOMAIN has an empty label: '{domain}'");
            }

            if label.len() > 63 {
                anyhow::bail!("ZONESYNC_DOMAIN label too long (max 63): '{label}'");
            }

            if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
                anyhow::bail!(
                    "ZONESYNC_DOMAIN label contains invalid characters: '{label}'. \
                    Valid: alphanumeric and hyphen only."
                );
            }

            if label.starts_with('-') || label.ends_with('-') {
                anyhow::bail!("ZONESYNC_DOMAIN label cannot start or end with hyphen: '{label}'");
            }
        }

        Ok(())
    }

    fn engine_config(&self) -> EngineConfig {
        let mut policy = EngineConfig::default();
        if let Some(max_retries) = self.max_retries {
            policy.max_retries = max_retries;
        }
        if let Some(base) = self.retry_base_ms {
            policy.retry_base_ms = base;
        }
        policy
    }
}

/// Parsed command line
enum Command {
    Create(DnsRecord),
    Update(RecordKey, ProposedFields),
    Delete(RecordKey),
    Reconcile(RecordKey),
}

const USAGE: &str = "usage:
  zonesyncctl create <name> <TYPE> <data> <ttl> [priority]
  zonesyncctl update <name> <TYPE> [--data V] [--ttl N] [--priority N]
  zonesyncctl delete <name> <TYPE>
  zonesyncctl reconcile <name> <TYPE>";

impl Command {
    /// Parse the command line, excluding the program name
    fn parse(args: &[String]) -> Result<Self> {
        let (cmd, rest) = args
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("missing command\n{USAGE}"))?;

        match cmd.as_str() {
            "create" => {
                if rest.len() < 4 || rest.len() > 5 {
                    anyhow::bail!("create takes 4 or 5 arguments\n{USAGE}");
                }
                let kind: RecordType = rest[1].parse().map_err(|e| anyhow::anyhow!("{e}"))?;
                let ttl: u32 = rest[3]
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid ttl '{}': {e}", rest[3]))?;
                let priority = rest
                    .get(4)
                    .map(|p| {
                        p.parse::<u16>()
                            .map_err(|e| anyhow::anyhow!("invalid priority '{p}': {e}"))
                    })
                    .transpose()?;
                Ok(Command::Create(DnsRecord {
                    name: rest[0].clone(),
                    kind,
                    data: rest[2].clone(),
                    ttl,
                    priority,
                }))
            }
            "update" => {
                if rest.len() < 2 {
                    anyhow::bail!("update requires <name> <TYPE>\n{USAGE}");
                }
                let key = Self::parse_key(&rest[0], &rest[1])?;
                let fields = Self::parse_fields(&rest[2..])?;
                if fields.data.is_none() && fields.ttl.is_none() && fields.priority.is_none() {
                    anyhow::bail!("update requires at least one of --data, --ttl, --priority");
                }
                Ok(Command::Update(key, fields))
            }
            "delete" => {
                if rest.len() != 2 {
                    anyhow::bail!("delete requires <name> <TYPE>\n{USAGE}");
                }
                Ok(Command::Delete(Self::parse_key(&rest[0], &rest[1])?))
            }
            "reconcile" => {
                if rest.len() != 2 {
                    anyhow::bail!("reconcile requires <name> <TYPE>\n{USAGE}");
                }
                Ok(Command::Reconcile(Self::parse_key(&rest[0], &rest[1])?))
            }
            other => anyhow::bail!("unknown command '{other}'\n{USAGE}"),
        }
    }

    fn parse_key(name: &str, kind: &str) -> Result<RecordKey> {
        let kind: RecordType = kind.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(RecordKey::new(name, kind))
    }

    /// Parse `--data V --ttl N --priority N` flag pairs
    fn parse_fields(args: &[String]) -> Result<ProposedFields> {
        let mut fields = ProposedFields::default();
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let value = iter
                .next()
                .ok_or_else(|| anyhow::anyhow!("flag {flag} requires a value"))?;
            match flag.as_str() {
                "--data" => fields.data = Some(value.clone()),
                "--ttl" => {
                    fields.ttl = Some(
                        value
                            .parse()
                            .map_err(|e| anyhow::anyhow!("invalid ttl '{value}': {e}"))?,
                    );
                }
                "--priority" => {
                    fields.priority = Some(
                        value
                            .parse()
                            .map_err(|e| anyhow::anyhow!("invalid priority '{value}': {e}"))?,
                    );
                }
                other => anyhow::bail!("unknown flag '{other}'\n{USAGE}"),
            }
        }
        Ok(fields)
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("{e}");
            return CtlExitCode::ConfigError.into();
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return CtlExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {e}");
        return CtlExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
        return CtlExitCode::ConfigError.into();
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            return CtlExitCode::ConfigError.into();
        }
    };

    rt.block_on(async {
        match run(config, command).await {
            Ok(code) => code,
            Err(e) => {
                error!("Operation failed: {e}");
                CtlExitCode::ConfigError
            }
        }
    })
    .into()
}

/// Wire up the components and run the requested command
async fn run(config: Config, command: Command) -> Result<CtlExitCode> {
    let provider = Arc::new(GoDaddyClient::new(
        config.api_key.clone(),
        config.api_secret.clone(),
        config.domain.clone(),
    )?);

    let store: Arc<dyn RecordStore> = match config.state_path {
        Some(ref path) => {
            info!(path, "using file record store");
            Arc::new(FileRecordStore::new(path).await?)
        }
        None => {
            info!("no ZONESYNC_STATE_PATH set, using in-memory record store");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let (engine, mut events) =
        ReconciliationEngine::new(provider, store.clone(), config.engine_config())?;

    // Surface engine events as log lines for the operator
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(?event, "engine event");
        }
    });

    let code = match command {
        Command::Create(record) => outcome_code(engine.create(record).await?),
        Command::Update(key, fields) => outcome_code(engine.update(&key, fields).await?),
        Command::Delete(key) => outcome_code(engine.delete(&key).await?),
        Command::Reconcile(key) => outcome_code(engine.reconcile(&key).await?),
    };

    store.flush().await?;
    drop(engine);
    let _ = event_task.await;

    Ok(code)
}

/// Map an engine outcome to an exit code, reporting the reason on stderr
fn outcome_code(outcome: Outcome) -> CtlExitCode {
    match outcome {
        Outcome::Success => CtlExitCode::Success,
        Outcome::ValidationFailed(e) => {
            eprintln!("Validation failed: {e}");
            CtlExitCode::Rejected
        }
        Outcome::ProviderRejected(e) => {
            eprintln!("Provider rejected the mutation: {e}");
            CtlExitCode::Rejected
        }
        Outcome::Conflicted => {
            eprintln!(
                "Record is in conflicted state; run `zonesyncctl reconcile` to resolve it \
                against the provider"
            );
            CtlExitCode::Conflicted
        }
    }
}
