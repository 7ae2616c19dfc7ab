use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_source::{is_plain_identifier, SqlDialect};
use crate::metrics::{default_recipes, MetricRecipe};
use crate::shell::Destination;
use crate::statement_guard::PlaygroundPolicy;

pub const DEFAULT_BROWSE_ROW_CAP: usize = 50;
pub const DEFAULT_PASSWORD_ENV: &str = "PANTRY_DB_PASSWORD";
const DEFAULT_SERVER_PORT: u16 = 3306;

const FOOD_TABLES: [&str; 4] = ["CLAIMS", "FOOD_LISTING", "PROVIDER", "RECEIVER"];
const FOOD_VIEWS: [&str; 5] = [
    "Available_Food",
    "Food_Claims",
    "Food_Movement",
    "Food_With_Provider",
    "NonExpired_Food_With_Provider",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordSource {
    #[default]
    EnvVar,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthMode {
    /// Operating-system identity, no password.
    #[default]
    Integrated,
    Password {
        user: String,
        #[serde(default)]
        password_source: PasswordSource,
        #[serde(default = "default_password_env")]
        password_env: String,
        #[serde(default)]
        keyring_service: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionTarget {
    NamedInstance {
        server: String,
        #[serde(default = "default_server_port")]
        port: u16,
        database: String,
        #[serde(default)]
        auth: AuthMode,
    },
    ConnectionString {
        url: String,
    },
    EmbeddedFile {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub name: String,
    pub target: ConnectionTarget,
}

impl ConnectionConfig {
    #[must_use]
    pub fn dialect(&self) -> SqlDialect {
        match self.target {
            ConnectionTarget::EmbeddedFile { .. } => SqlDialect::Sqlite,
            ConnectionTarget::NamedInstance { .. } | ConnectionTarget::ConnectionString { .. } => {
                SqlDialect::MySql
            }
        }
    }

    /// Human-readable target without credentials.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.target {
            ConnectionTarget::NamedInstance {
                server, database, ..
            } => format!("{server}/{database}"),
            ConnectionTarget::ConnectionString { url } => redact_url(url),
            ConnectionTarget::EmbeddedFile { path } => path.display().to_string(),
        }
    }
}

fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://{host}"),
        None => url.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InsightQuery {
    pub title: String,
    /// `{today}` is replaced with the dialect's current-date expression.
    pub sql: String,
}

impl InsightQuery {
    #[must_use]
    pub fn new(title: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sql: sql.into(),
        }
    }

    #[must_use]
    pub fn render_sql(&self, dialect: SqlDialect) -> String {
        self.sql.replace("{today}", dialect.current_date_expr())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardConfig {
    #[serde(default = "default_title")]
    pub title: String,
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub views: Vec<String>,
    #[serde(default = "default_pages")]
    pub pages: Vec<Destination>,
    #[serde(default)]
    pub playground: PlaygroundPolicy,
    #[serde(default = "default_recipes")]
    pub metrics: Vec<MetricRecipe>,
    #[serde(default = "default_insights")]
    pub insights: Vec<InsightQuery>,
    #[serde(default)]
    pub overview_view: Option<String>,
    #[serde(default = "default_filter_columns")]
    pub filter_columns: Vec<String>,
    #[serde(default = "default_browse_row_cap")]
    pub browse_row_cap: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read dashboard config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dashboard config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid dashboard config: {0}")]
    Invalid(String),
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
}

/// The three deployment shapes the dashboard ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    #[default]
    NamedInstance,
    ConnectionString,
    EmbeddedFile,
}

impl Preset {
    pub const ALL: [Self; 3] = [
        Self::NamedInstance,
        Self::ConnectionString,
        Self::EmbeddedFile,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NamedInstance => "named_instance",
            Self::ConnectionString => "connection_string",
            Self::EmbeddedFile => "embedded_file",
        }
    }

    #[must_use]
    pub fn config(self) -> DashboardConfig {
        match self {
            Self::NamedInstance => DashboardConfig {
                title: default_title(),
                connection: ConnectionConfig {
                    name: "food-wastage-instance".to_string(),
                    target: ConnectionTarget::NamedInstance {
                        server: "localhost".to_string(),
                        port: DEFAULT_SERVER_PORT,
                        database: "FoodWastageDB".to_string(),
                        auth: AuthMode::Integrated,
                    },
                },
                tables: owned(&FOOD_TABLES),
                views: owned(&FOOD_VIEWS),
                pages: default_pages(),
                playground: PlaygroundPolicy::Unrestricted,
                metrics: default_recipes(),
                insights: default_insights(),
                overview_view: None,
                filter_columns: default_filter_columns(),
                browse_row_cap: DEFAULT_BROWSE_ROW_CAP,
            },
            Self::ConnectionString => DashboardConfig {
                title: default_title(),
                connection: ConnectionConfig {
                    name: "food-wastage-server".to_string(),
                    target: ConnectionTarget::ConnectionString {
                        url: "mysql://pantry@127.0.0.1:3306/FoodWastageDB".to_string(),
                    },
                },
                tables: Vec::new(),
                views: owned(&FOOD_VIEWS),
                pages: vec![
                    Destination::ExploreViews,
                    Destination::SqlPlayground,
                    Destination::Overview,
                ],
                playground: PlaygroundPolicy::Unrestricted,
                metrics: default_recipes(),
                insights: Vec::new(),
                overview_view: Some("Food_Claims".to_string()),
                filter_columns: default_filter_columns(),
                browse_row_cap: DEFAULT_BROWSE_ROW_CAP,
            },
            Self::EmbeddedFile => DashboardConfig {
                title: default_title(),
                connection: ConnectionConfig {
                    name: "food-wastage-file".to_string(),
                    target: ConnectionTarget::EmbeddedFile {
                        path: PathBuf::from("food_wastage.db"),
                    },
                },
                tables: owned(&FOOD_TABLES),
                views: owned(&FOOD_VIEWS),
                pages: vec![
                    Destination::ExploreTables,
                    Destination::ExploreViews,
                    Destination::SqlPlayground,
                    Destination::Insights,
                    Destination::Overview,
                ],
                playground: PlaygroundPolicy::ReadOnly,
                metrics: default_recipes(),
                insights: default_insights(),
                overview_view: Some("Food_Claims".to_string()),
                filter_columns: default_filter_columns(),
                browse_row_cap: DEFAULT_BROWSE_ROW_CAP,
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name() == raw.trim())
            .ok_or_else(|| ConfigError::UnknownPreset(raw.to_string()))
    }
}

impl DashboardConfig {
    pub fn load_default(fallback: Preset) -> Result<Self, ConfigError> {
        let path = default_config_path()?;
        Self::load_from_path(path, fallback)
    }

    /// Missing or blank files yield the fallback preset.
    pub fn load_from_path(path: impl Into<PathBuf>, fallback: Preset) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            return Ok(fallback.config());
        }

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(fallback.config());
        }

        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.tables.iter().chain(&self.views) {
            if !is_plain_identifier(name) {
                return Err(ConfigError::Invalid(format!(
                    "allow-listed name `{name}` is not a plain identifier"
                )));
            }
        }

        if self.pages.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one page must be configured".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for page in &self.pages {
            if !seen.insert(*page) {
                return Err(ConfigError::Invalid(format!(
                    "page `{}` is listed more than once",
                    page.label()
                )));
            }
        }

        if self.browse_row_cap == 0 {
            return Err(ConfigError::Invalid(
                "browse_row_cap must be greater than 0".to_string(),
            ));
        }

        if self.pages.contains(&Destination::Overview) {
            let Some(view) = &self.overview_view else {
                return Err(ConfigError::Invalid(
                    "the overview page requires `overview_view`".to_string(),
                ));
            };
            if !self.views.contains(view) {
                return Err(ConfigError::Invalid(format!(
                    "overview view `{view}` is not in the views allow-list"
                )));
            }
        }

        Ok(())
    }

    /// Points the configured target at another file, URL, or database name.
    pub fn override_location(&mut self, location: &str) {
        match &mut self.connection.target {
            ConnectionTarget::NamedInstance { database, .. } => *database = location.to_string(),
            ConnectionTarget::ConnectionString { url } => *url = location.to_string(),
            ConnectionTarget::EmbeddedFile { path } => *path = PathBuf::from(location),
        }
    }
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = if let Some(custom) = env::var_os("PANTRY_CONFIG_DIR") {
        PathBuf::from(custom)
    } else if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(ConfigError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(ConfigError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join("pantry"))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join("dashboard.toml"))
}

#[must_use]
pub fn log_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

fn default_title() -> String {
    "Food Waste Management".to_string()
}

fn default_password_env() -> String {
    DEFAULT_PASSWORD_ENV.to_string()
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_pages() -> Vec<Destination> {
    vec![
        Destination::ExploreTables,
        Destination::ExploreViews,
        Destination::SqlPlayground,
        Destination::Insights,
    ]
}

fn default_filter_columns() -> Vec<String> {
    owned(&["Location", "Provider_City", "City"])
}

fn default_browse_row_cap() -> usize {
    DEFAULT_BROWSE_ROW_CAP
}

fn default_insights() -> Vec<InsightQuery> {
    vec![
        InsightQuery::new(
            "Top Food Providers",
            "SELECT P.Name, COUNT(F.Food_ID) AS Total_Foods \
             FROM PROVIDER P \
             JOIN FOOD_LISTING F ON P.Provider_ID = F.Provider_ID \
             GROUP BY P.Name \
             ORDER BY Total_Foods DESC",
        ),
        InsightQuery::new(
            "Highest Demand Locations",
            "SELECT R.City, COUNT(C.Claim_ID) AS Total_Claims \
             FROM RECEIVER R \
             JOIN CLAIMS C ON R.Receiver_ID = C.Receiver_ID \
             GROUP BY R.City \
             ORDER BY Total_Claims DESC",
        ),
        InsightQuery::new(
            "Food Wastage Trends (Expired Items)",
            "SELECT Food_Type, COUNT(*) AS Expired_Count \
             FROM FOOD_LISTING \
             WHERE Expiry_Date < {today} \
             GROUP BY Food_Type \
             ORDER BY Expired_Count DESC",
        ),
    ]
}
