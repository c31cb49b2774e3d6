// Table names are validated as plain identifiers when the config loads, so
// they can be interpolated here.
//
// `meta` is JSON rather than JSONB: JSONB rejects `\u0000` escapes and
// reorders keys, JSON keeps the document text as sent.

pub const SQL_PING: &str = "SELECT 1";

pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
_id UUID PRIMARY KEY, \
installation_id TEXT NOT NULL, \
event_type TEXT NOT NULL, \
meta JSON, \
created_at BIGINT, \
stored_at BIGINT NOT NULL)",
        table
    )
}

pub fn insert_event_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (_id, installation_id, event_type, meta, created_at, stored_at) \
VALUES ($1, $2, $3, $4, $5, $6)",
        table
    )
}

pub fn select_event_sql(table: &str) -> String {
    format!(
        "SELECT _id, installation_id, event_type, meta, created_at, stored_at FROM {} WHERE _id = $1",
        table
    )
}
