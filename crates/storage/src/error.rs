use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("message id '{id}' is already stored with different content"))]
    IdReused { stage: &'static str, id: String },
    #[snafu(display("message '{id}' disappeared between insert and lookup"))]
    MessageVanished { stage: &'static str, id: String },
    #[snafu(display("'{raw}' is not a valid message id"))]
    InvalidId {
        stage: &'static str,
        raw: String,
        source: uuid::Error,
    },
    #[snafu(display("stored timestamp {value} is negative"))]
    NegativeTimestamp { stage: &'static str, value: i64 },
    #[snafu(display("cannot create database directory {path}: {source}"))]
    CreateDatabaseDirectory {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("bad database location '{database_url}': {source}"))]
    DatabaseUrl {
        stage: &'static str,
        database_url: String,
        source: sqlx::Error,
    },
    #[snafu(display("cannot open message database '{database_url}': {source}"))]
    Connect {
        stage: &'static str,
        database_url: String,
        source: sqlx::Error,
    },
    #[snafu(display("cannot set pragma '{pragma}': {source}"))]
    Pragma {
        stage: &'static str,
        pragma: &'static str,
        source: sqlx::Error,
    },
    #[snafu(display("message schema migration failed: {source}"))]
    Migrate {
        stage: &'static str,
        source: sqlx::migrate::MigrateError,
    },
    #[snafu(display("message query failed on `{stage}`: {source}"))]
    Query {
        stage: &'static str,
        source: sqlx::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
