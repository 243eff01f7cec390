use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use medicare_adherence::{AdherenceConfig, DEFAULT_STREAK_CAP, OutOfWindowPolicy, StreakBoundary};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub public_url: String,
    pub jwt_secret: String,
    pub adherence: AdherenceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = get("MEDICARE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MEDICARE_JWT_SECRET is unset or still a placeholder");
        }

        let host = get("MEDICARE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("MEDICARE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("MEDICARE_PORT must be a port number")?;
        let db_path = get("MEDICARE_DB_PATH").unwrap_or_else(|| "medicare.db".into()).into();
        let storage_dir = get("MEDICARE_STORAGE_DIR")
            .unwrap_or_else(|| "./photo-storage".into())
            .into();
        let public_url = get("MEDICARE_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let out_of_window = if flag(&get, "MEDICARE_COUNT_OUT_OF_WINDOW")? {
            OutOfWindowPolicy::Count
        } else {
            OutOfWindowPolicy::Ignore
        };
        let streak_boundary = if flag(&get, "MEDICARE_STREAK_ACROSS_MONTHS")? {
            StreakBoundary::Unbounded
        } else {
            StreakBoundary::CalendarMonth
        };
        let streak_cap = match get("MEDICARE_STREAK_CAP") {
            Some(v) => match v.trim().parse::<u32>() {
                Ok(0) | Err(_) => bail!("MEDICARE_STREAK_CAP must be a positive integer, got '{}'", v),
                Ok(cap) => cap,
            },
            None => DEFAULT_STREAK_CAP,
        };

        Ok(Self {
            host,
            port,
            db_path,
            storage_dir,
            public_url,
            jwt_secret,
            adherence: AdherenceConfig {
                out_of_window,
                streak_boundary,
                streak_cap,
            },
        })
    }
}

fn flag<F>(get: &F, key: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => bail!("{} must be true or false, got '{}'", key, other),
    }
}
