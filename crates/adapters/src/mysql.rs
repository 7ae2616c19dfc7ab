use async_trait::async_trait;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, Opts, OptsBuilder, Row, Value};
use pantry_core::config::{AuthMode, ConnectionConfig, ConnectionTarget, PasswordSource};
use pantry_core::connection_manager::{BackendError, ConnectionBackend};
use pantry_core::query_runner::{QueryBackend, QueryBackendError};
use pantry_core::tabular::{CellValue, TabularResult};

/// Server targets: named instances and connection strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlBackend;

#[async_trait]
impl ConnectionBackend for MysqlBackend {
    type Connection = Conn;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, BackendError> {
        Conn::new(opts_from_config(config)?)
            .await
            .map_err(to_connection_error)
    }

    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError> {
        connection.ping().await.map_err(to_connection_error)
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError> {
        connection.disconnect().await.map_err(to_connection_error)
    }
}

#[async_trait]
impl QueryBackend for MysqlBackend {
    async fn run_query(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
    ) -> Result<TabularResult, QueryBackendError> {
        let result = connection.query_iter(sql).await.map_err(to_query_error)?;
        let columns = result.columns_ref().to_vec();
        let rows: Vec<Row> = result.collect_and_drop().await.map_err(to_query_error)?;

        let names = columns
            .iter()
            .map(|column| column.name_str().into_owned())
            .collect::<Vec<_>>();
        let cells = rows
            .into_iter()
            .map(|row| row_to_cells(row, &columns))
            .collect::<Vec<_>>();

        TabularResult::new(names, cells).map_err(|error| QueryBackendError::new(error.to_string()))
    }
}

pub(crate) fn opts_from_config(config: &ConnectionConfig) -> Result<Opts, BackendError> {
    match &config.target {
        ConnectionTarget::NamedInstance {
            server,
            port,
            database,
            auth,
        } => {
            let (user, password) = credentials(auth);
            let builder = OptsBuilder::default()
                .ip_or_hostname(server.clone())
                .tcp_port(*port)
                .db_name(Some(database.clone()))
                .user(user)
                .pass(password);
            Ok(builder.into())
        }
        ConnectionTarget::ConnectionString { url } => {
            Opts::from_url(url).map_err(|error| BackendError::new(error.to_string()))
        }
        ConnectionTarget::EmbeddedFile { path } => Err(BackendError::new(format!(
            "{} is an embedded database file, not a server",
            path.display()
        ))),
    }
}

fn credentials(auth: &AuthMode) -> (Option<String>, Option<String>) {
    match auth {
        AuthMode::Integrated => (os_user(), None),
        AuthMode::Password {
            user,
            password_source,
            password_env,
            keyring_service,
        } => {
            let password =
                resolve_password(user, *password_source, password_env, keyring_service.as_deref());
            (Some(user.clone()), password)
        }
    }
}

/// Integrated auth logs in as the operating-system account.
fn os_user() -> Option<String> {
    ["USER", "USERNAME"]
        .into_iter()
        .find_map(|key| std::env::var(key).ok().filter(|user| !user.is_empty()))
}

fn resolve_password(
    user: &str,
    source: PasswordSource,
    env_key: &str,
    keyring_service: Option<&str>,
) -> Option<String> {
    let env_password = std::env::var(env_key).ok().filter(|pw| !pw.is_empty());

    match source {
        PasswordSource::EnvVar => env_password,
        // The keyring is only read; an env password is never written back.
        PasswordSource::Keyring => load_keyring_password(user, keyring_service).or(env_password),
    }
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn load_keyring_password(user: &str, service: Option<&str>) -> Option<String> {
    let entry = keyring_entry(user, service)?;
    entry.get_password().ok().filter(|pw| !pw.is_empty())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn load_keyring_password(_user: &str, _service: Option<&str>) -> Option<String> {
    None
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn keyring_entry(user: &str, service: Option<&str>) -> Option<keyring::Entry> {
    let service = service
        .map(str::trim)
        .filter(|service| !service.is_empty())
        .unwrap_or("pantry");
    keyring::Entry::new(service, user).ok()
}

fn row_to_cells(row: Row, columns: &[Column]) -> Vec<CellValue> {
    row.unwrap()
        .into_iter()
        .zip(columns)
        .map(|(value, column)| mysql_value_to_cell(value, column.column_type()))
        .collect()
}

/// The text protocol delivers most values as bytes; the column type decides
/// how they are read back.
fn mysql_value_to_cell(value: Value, column_type: ColumnType) -> CellValue {
    match value {
        Value::NULL => CellValue::Null,
        Value::Int(value) => CellValue::Integer(value),
        Value::UInt(value) => {
            i64::try_from(value).map_or_else(|_| CellValue::Text(value.to_string()), CellValue::Integer)
        }
        Value::Float(value) => CellValue::Real(f64::from(value)),
        Value::Double(value) => CellValue::Real(value),
        Value::Bytes(bytes) => bytes_to_cell(String::from_utf8_lossy(&bytes).into_owned(), column_type),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            if (hour, minute, second, micros) == (0, 0, 0, 0) {
                CellValue::Date(format!("{year:04}-{month:02}-{day:02}"))
            } else {
                CellValue::Date(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                ))
            }
        }
        Value::Time(is_negative, days, hours, minutes, seconds, _micros) => {
            let sign = if is_negative { "-" } else { "" };
            let hours = days * 24 + u32::from(hours);
            CellValue::Text(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"))
        }
    }
}

fn bytes_to_cell(text: String, column_type: ColumnType) -> CellValue {
    match column_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => text
            .parse::<i64>()
            .map_or_else(|_| CellValue::Text(text), CellValue::Integer),
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => text
            .parse::<f64>()
            .map_or_else(|_| CellValue::Text(text), CellValue::Real),
        ColumnType::MYSQL_TYPE_DATE
        | ColumnType::MYSQL_TYPE_NEWDATE
        | ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_DATETIME2
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIMESTAMP2 => CellValue::Date(text),
        // Decimals stay textual so the displayed value keeps its scale.
        _ => CellValue::Text(text),
    }
}

fn to_connection_error(error: mysql_async::Error) -> BackendError {
    BackendError::new(error.to_string())
}

fn to_query_error(error: mysql_async::Error) -> QueryBackendError {
    QueryBackendError::new(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use mysql_async::consts::ColumnType;
    use mysql_async::Value;
    use pantry_core::config::{
        AuthMode, ConnectionConfig, ConnectionTarget, PasswordSource, Preset,
    };
    use pantry_core::tabular::CellValue;

    use super::{
        credentials, load_keyring_password, mysql_value_to_cell, opts_from_config, resolve_password,
    };

    #[test]
    fn text_protocol_bytes_follow_column_type() {
        assert_eq!(
            mysql_value_to_cell(Value::Bytes(b"42".to_vec()), ColumnType::MYSQL_TYPE_LONG),
            CellValue::Integer(42)
        );
        assert_eq!(
            mysql_value_to_cell(Value::Bytes(b"2.5".to_vec()), ColumnType::MYSQL_TYPE_DOUBLE),
            CellValue::Real(2.5)
        );
        assert_eq!(
            mysql_value_to_cell(
                Value::Bytes(b"2024-03-01".to_vec()),
                ColumnType::MYSQL_TYPE_DATE
            ),
            CellValue::Date("2024-03-01".to_string())
        );
        assert_eq!(
            mysql_value_to_cell(
                Value::Bytes(b"10.50".to_vec()),
                ColumnType::MYSQL_TYPE_NEWDECIMAL
            ),
            CellValue::Text("10.50".to_string())
        );
        assert_eq!(
            mysql_value_to_cell(Value::NULL, ColumnType::MYSQL_TYPE_LONG),
            CellValue::Null
        );
    }

    #[test]
    fn binary_values_convert_directly() {
        assert_eq!(
            mysql_value_to_cell(Value::UInt(u64::MAX), ColumnType::MYSQL_TYPE_LONGLONG),
            CellValue::Text(u64::MAX.to_string())
        );
        assert_eq!(
            mysql_value_to_cell(
                Value::Date(2024, 3, 1, 0, 0, 0, 0),
                ColumnType::MYSQL_TYPE_DATE
            ),
            CellValue::Date("2024-03-01".to_string())
        );
        assert_eq!(
            mysql_value_to_cell(
                Value::Time(false, 1, 2, 3, 4, 0),
                ColumnType::MYSQL_TYPE_TIME
            ),
            CellValue::Text("26:03:04".to_string())
        );
    }

    #[test]
    fn connection_string_target_parses_url() {
        let config = Preset::ConnectionString.config().connection;
        let opts = opts_from_config(&config).expect("preset url should parse");
        assert_eq!(opts.ip_or_hostname(), "127.0.0.1");
        assert_eq!(opts.db_name(), Some("FoodWastageDB"));
        assert_eq!(opts.user(), Some("pantry"));
    }

    #[test]
    fn malformed_url_is_a_connection_error() {
        let config = ConnectionConfig {
            name: "broken".to_string(),
            target: ConnectionTarget::ConnectionString {
                url: "not a url".to_string(),
            },
        };
        assert!(opts_from_config(&config).is_err());
    }

    #[test]
    fn embedded_file_is_not_a_server_target() {
        let config = ConnectionConfig {
            name: "file".to_string(),
            target: ConnectionTarget::EmbeddedFile {
                path: PathBuf::from("food_wastage.db"),
            },
        };
        let err = opts_from_config(&config).expect_err("file targets need sqlite");
        assert!(err.to_string().contains("food_wastage.db"));
    }

    #[test]
    fn named_instance_uses_server_port_and_database() {
        let config = ConnectionConfig {
            name: "instance".to_string(),
            target: ConnectionTarget::NamedInstance {
                server: "db.internal".to_string(),
                port: 3307,
                database: "FoodWastageDB".to_string(),
                auth: AuthMode::Integrated,
            },
        };
        let opts = opts_from_config(&config).expect("named instance opts");
        assert_eq!(opts.ip_or_hostname(), "db.internal");
        assert_eq!(opts.tcp_port(), 3307);
        assert_eq!(opts.db_name(), Some("FoodWastageDB"));
    }

    #[test]
    fn password_auth_reads_configured_env_var() {
        std::env::set_var("PANTRY_TEST_MYSQL_PASSWORD", "s3cret");
        let auth = AuthMode::Password {
            user: "reporter".to_string(),
            password_source: PasswordSource::EnvVar,
            password_env: "PANTRY_TEST_MYSQL_PASSWORD".to_string(),
            keyring_service: None,
        };

        let (user, password) = credentials(&auth);
        assert_eq!(user.as_deref(), Some("reporter"));
        assert_eq!(password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn keyring_source_falls_back_to_env_without_storing_it() {
        std::env::set_var("PANTRY_TEST_KEYRING_FALLBACK", "from-env");
        let service = Some("pantry-test-keyring-fallback");

        let password = resolve_password(
            "reporter",
            PasswordSource::Keyring,
            "PANTRY_TEST_KEYRING_FALLBACK",
            service,
        );

        assert_eq!(password.as_deref(), Some("from-env"));
        assert_eq!(load_keyring_password("reporter", service), None);
    }
}
