//! Service configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use faucet_core::{
    ClaimPolicy, FaucetError, ReferralBonus, Result, RewardRange, Task, DEFAULT_AD_MULTIPLIER,
    DEFAULT_COOLDOWN_SECONDS, DEFAULT_REFERRAL_PERCENT, DEFAULT_REWARD_MAX, DEFAULT_REWARD_MIN,
};
use faucet_store::{RetryPolicy, SheetLayout};

/// Request timeout used when `REQUEST_TIMEOUT_SECONDS` is unset.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Most remote storage calls one request makes: the referee and referrer
/// lookups (by ID, then by code) plus the row lookup and write of a commit.
pub const STORAGE_CALLS_PER_REQUEST: u32 = 5;

/// Which ledger backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    /// Process-local, lost on restart.
    Memory,
    /// Embedded `RocksDB` under `data_dir`.
    RocksDb,
    /// A Google spreadsheet.
    Sheets,
}

impl FromStr for LedgerKind {
    type Err = FaucetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::RocksDb),
            "sheets" | "google-sheets" => Ok(Self::Sheets),
            other => Err(FaucetError::Configuration(format!(
                "unknown LEDGER_BACKEND '{other}' (expected memory, rocksdb or sheets)"
            ))),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Ledger backend (default: memory).
    pub ledger: LedgerKind,

    /// Path to `RocksDB` data directory (default: "/data/faucet").
    pub data_dir: String,

    /// Spreadsheet ID for the Sheets backend.
    pub google_sheet_id: Option<String>,

    /// Service account key for the Sheets backend: a file path or the JSON
    /// itself.
    pub google_creds: Option<String>,

    /// Sheets API base URL.
    pub sheets_api_url: String,

    /// Column layout of the spreadsheet.
    pub sheet_layout: SheetLayout,

    /// Per-call timeout for remote storage, in seconds.
    pub storage_timeout_seconds: u64,

    /// Attempts per remote storage call.
    pub storage_max_attempts: u32,

    /// Task catalog for the local backends.
    pub tasks: Vec<Task>,

    /// Faucet economics.
    pub policy: ClaimPolicy,

    /// Telegram bot token, used to verify WebApp init data.
    pub telegram_bot_token: Option<String>,

    /// Require valid init data on mutating endpoints.
    pub require_init_data: bool,

    /// Oldest accepted init data, in seconds (0 disables the check).
    pub init_data_max_age_seconds: u64,

    /// Directory holding the WebApp's `index.html` and static assets.
    pub static_dir: Option<PathBuf>,
}

/// Google secrets file structure.
#[derive(Debug, Deserialize)]
struct GoogleSecrets {
    sheet_id: Option<String>,
    credentials_file: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    ///
    /// # Errors
    ///
    /// Returns `FaucetError::Configuration` for values that are present but
    /// unusable (unparseable numbers, unknown backend or layout names, an
    /// invalid reward range, an unreadable tasks file or a request timeout
    /// shorter than the storage retry budget).
    pub fn from_env() -> Result<Self> {
        let (google_sheet_id, google_creds) = load_google_secrets();

        let sheet_layout = match env_opt("SHEET_LAYOUT") {
            Some(name) => SheetLayout::from_name(&name).ok_or_else(|| {
                FaucetError::Configuration(format!(
                    "unknown SHEET_LAYOUT '{name}' (expected canonical or legacy)"
                ))
            })?,
            None => SheetLayout::canonical(),
        };

        let tasks = match env_opt("TASKS_FILE") {
            Some(path) => load_tasks_file(&path)?,
            None => default_tasks(),
        };

        let explicit_timeout: Option<u64> = env_opt("REQUEST_TIMEOUT_SECONDS")
            .map(|raw| parse_value("REQUEST_TIMEOUT_SECONDS", &raw))
            .transpose()?;

        let mut config = Self {
            listen_addr: env_opt("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            cors_origins: env_opt("CORS_ORIGINS")
                .unwrap_or_else(|| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", 1024 * 1024)?, // 1MB
            request_timeout_seconds: explicit_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            ledger: env_opt("LEDGER_BACKEND")
                .map_or(Ok(LedgerKind::Memory), |s| s.parse())?,
            data_dir: env_opt("DATA_DIR").unwrap_or_else(|| "/data/faucet".into()),
            google_sheet_id,
            google_creds,
            sheets_api_url: env_opt("SHEETS_API_URL")
                .unwrap_or_else(|| faucet_store::sheets::DEFAULT_API_URL.into()),
            sheet_layout,
            storage_timeout_seconds: env_parse("STORAGE_TIMEOUT_SECONDS", 10)?,
            storage_max_attempts: env_parse("STORAGE_MAX_ATTEMPTS", 3)?,
            tasks,
            policy: policy_from_env()?,
            telegram_bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
            require_init_data: env_parse("REQUIRE_INIT_DATA", false)?,
            init_data_max_age_seconds: env_parse("INIT_DATA_MAX_AGE_SECONDS", 86_400)?,
            static_dir: env_opt("STATIC_DIR").map(PathBuf::from),
        };

        if explicit_timeout.is_none() {
            config.request_timeout_seconds = config
                .request_timeout_seconds
                .max(config.min_request_timeout_seconds());
        }

        config.validate()?;
        Ok(config)
    }

    /// Check settings that depend on each other.
    ///
    /// # Errors
    ///
    /// Returns `FaucetError::Configuration` for an invalid claim policy, a
    /// zero request timeout, or a request timeout that would cut off a
    /// remote ledger write while it is still retrying.
    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;

        if self.request_timeout_seconds == 0 {
            return Err(FaucetError::Configuration(
                "REQUEST_TIMEOUT_SECONDS must be positive".into(),
            ));
        }

        let minimum = self.min_request_timeout_seconds();
        if self.request_timeout_seconds < minimum {
            return Err(FaucetError::Configuration(format!(
                "REQUEST_TIMEOUT_SECONDS={} is shorter than the storage retry budget of \
                 {minimum}s ({STORAGE_CALLS_PER_REQUEST} calls of up to {}s each); raise it \
                 or lower STORAGE_TIMEOUT_SECONDS / STORAGE_MAX_ATTEMPTS",
                self.request_timeout_seconds,
                self.storage_call_budget().as_secs_f64(),
            )));
        }
        Ok(())
    }

    /// Retry policy for remote ledger calls.
    #[must_use]
    pub fn storage_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.storage_max_attempts,
            ..RetryPolicy::default()
        }
    }

    /// Longest one remote ledger call can take, retries included.
    #[must_use]
    pub fn storage_call_budget(&self) -> Duration {
        self.storage_retry_policy()
            .worst_case(Duration::from_secs(self.storage_timeout_seconds))
    }

    /// Shortest request timeout that lets every storage call of a request
    /// run out its retries. Zero for the local backends.
    #[must_use]
    pub fn min_request_timeout_seconds(&self) -> u64 {
        match self.ledger {
            LedgerKind::Memory | LedgerKind::RocksDb => 0,
            LedgerKind::Sheets => {
                let budget = self.storage_call_budget() * STORAGE_CALLS_PER_REQUEST;
                budget.as_secs() + u64::from(budget.subsec_nanos() > 0)
            }
        }
    }

    /// Maximum age of accepted init data.
    #[must_use]
    pub fn init_data_max_age(&self) -> Option<Duration> {
        (self.init_data_max_age_seconds > 0)
            .then(|| Duration::from_secs(self.init_data_max_age_seconds))
    }

    /// Whether mutating endpoints must carry verified init data.
    #[must_use]
    pub fn enforces_init_data(&self) -> bool {
        self.require_init_data && self.telegram_bot_token.is_some()
    }
}

fn policy_from_env() -> Result<ClaimPolicy> {
    let reward_range = RewardRange::new(
        env_parse("CLAIM_REWARD_MIN", DEFAULT_REWARD_MIN)?,
        env_parse("CLAIM_REWARD_MAX", DEFAULT_REWARD_MAX)?,
    )?;

    // A flat bonus, when set, replaces the percentage.
    let referral_bonus = match env_opt("REFERRAL_BONUS_FLAT") {
        Some(raw) => ReferralBonus::Flat(parse_value("REFERRAL_BONUS_FLAT", &raw)?),
        None => ReferralBonus::Percent(env_parse(
            "REFERRAL_BONUS_PERCENT",
            DEFAULT_REFERRAL_PERCENT,
        )?),
    };

    Ok(ClaimPolicy {
        reward_range,
        cooldown: Duration::from_secs(env_parse(
            "CLAIM_COOLDOWN_SECONDS",
            DEFAULT_COOLDOWN_SECONDS,
        )?),
        referral_bonus,
        signup_bonus: env_parse("SIGNUP_BONUS", 0)?,
        ad_multiplier: env_parse("AD_MULTIPLIER", DEFAULT_AD_MULTIPLIER)?,
    })
}

/// A non-blank environment variable.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T> {
    env_opt(name).map_or(Ok(default), |raw| parse_value(name, &raw))
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| FaucetError::Configuration(format!("invalid value for {name}: '{raw}'")))
}

/// Load Google settings from the secrets file or environment.
fn load_google_secrets() -> (Option<String>, Option<String>) {
    // Try multiple paths for the secrets file
    let secret_paths = [".secrets/google.json", "../.secrets/google.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<GoogleSecrets>(path) {
            tracing::info!(path = %path, "Loaded Google secrets from file");
            return (
                secrets.sheet_id.or_else(|| env_opt("GOOGLE_SHEET_ID")),
                secrets.credentials_file.or_else(|| env_opt("GOOGLE_CREDS")),
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Google secrets file not found, using environment variables");
    (env_opt("GOOGLE_SHEET_ID"), env_opt("GOOGLE_CREDS"))
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> std::io::Result<T> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Read a JSON task catalog: `[{"name", "description", "reward"}]`.
///
/// # Errors
///
/// Returns `FaucetError::Configuration` if the file cannot be read or parsed,
/// or a reward is negative.
pub fn load_tasks_file(path: &str) -> Result<Vec<Task>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| FaucetError::Configuration(format!("cannot read TASKS_FILE {path}: {e}")))?;
    let tasks: Vec<Task> = serde_json::from_str(&contents)
        .map_err(|e| FaucetError::Configuration(format!("invalid TASKS_FILE {path}: {e}")))?;
    if let Some(task) = tasks.iter().find(|t| t.reward < 0) {
        return Err(FaucetError::Configuration(format!(
            "task '{}' has a negative reward",
            task.name
        )));
    }
    Ok(tasks)
}

/// The built-in task catalog.
#[must_use]
pub fn default_tasks() -> Vec<Task> {
    vec![
        Task::new("join_channel", "Join our Telegram channel", 50),
        Task::new("invite_friend", "Invite a friend to the faucet", 100),
        Task::new("follow_twitter", "Follow us on Twitter", 30),
    ]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            ledger: LedgerKind::Memory,
            data_dir: "/data/faucet".into(),
            google_sheet_id: None,
            google_creds: None,
            sheets_api_url: faucet_store::sheets::DEFAULT_API_URL.into(),
            sheet_layout: SheetLayout::canonical(),
            storage_timeout_seconds: 10,
            storage_max_attempts: 3,
            tasks: default_tasks(),
            policy: ClaimPolicy::default(),
            telegram_bot_token: None,
            require_init_data: false,
            init_data_max_age_seconds: 86_400,
            static_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn ledger_kind_names() {
        assert_eq!("memory".parse::<LedgerKind>().unwrap(), LedgerKind::Memory);
        assert_eq!("RocksDB".parse::<LedgerKind>().unwrap(), LedgerKind::RocksDb);
        assert_eq!("sheets".parse::<LedgerKind>().unwrap(), LedgerKind::Sheets);
        assert!("postgres".parse::<LedgerKind>().is_err());
    }

    #[test]
    fn parse_value_reports_variable() {
        let err = parse_value::<u64>("CLAIM_COOLDOWN_SECONDS", "soon").unwrap_err();
        assert!(err.to_string().contains("CLAIM_COOLDOWN_SECONDS"));
    }

    #[test]
    fn init_data_enforcement_needs_a_token() {
        let mut config = ServiceConfig {
            require_init_data: true,
            ..ServiceConfig::default()
        };
        assert!(!config.enforces_init_data());
        config.telegram_bot_token = Some("123:abc".into());
        assert!(config.enforces_init_data());
    }

    #[test]
    fn max_age_zero_disables_check() {
        let config = ServiceConfig {
            init_data_max_age_seconds: 0,
            ..ServiceConfig::default()
        };
        assert_eq!(config.init_data_max_age(), None);
        assert_eq!(
            ServiceConfig::default().init_data_max_age(),
            Some(Duration::from_secs(86_400))
        );
    }

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert_eq!(config.min_request_timeout_seconds(), 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let config = ServiceConfig {
            request_timeout_seconds: 0,
            ..ServiceConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FaucetError::Configuration(_))
        ));
    }

    #[test]
    fn sheets_timeout_must_cover_storage_retries() {
        let mut config = ServiceConfig {
            ledger: LedgerKind::Sheets,
            ..ServiceConfig::default()
        };
        // 5 calls x (3 x 10s + 0.5s + 1s)
        assert_eq!(config.storage_call_budget(), Duration::from_millis(31_500));
        assert_eq!(config.min_request_timeout_seconds(), 158);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, FaucetError::Configuration(_)));
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECONDS=30"));

        config.request_timeout_seconds = config.min_request_timeout_seconds();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn faster_storage_lowers_the_minimum() {
        let config = ServiceConfig {
            ledger: LedgerKind::Sheets,
            storage_timeout_seconds: 2,
            storage_max_attempts: 2,
            ..ServiceConfig::default()
        };
        // 5 calls x (2 x 2s + 0.5s)
        assert_eq!(config.min_request_timeout_seconds(), 23);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tasks_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"join","description":"Join","reward":5}},{{"name":"quiz","reward":7}}]"#
        )
        .unwrap();

        let tasks = load_tasks_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].description, "");
    }

    #[test]
    fn negative_task_reward_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name":"bad","reward":-1}}]"#).unwrap();
        assert!(load_tasks_file(file.path().to_str().unwrap()).is_err());
    }
}
