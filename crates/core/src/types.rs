/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque identifier of an authenticated user, as carried in the JWT `sub`
/// claim. Never interpreted, only compared.
pub type UserId = String;
