//! SQLite schema definition.

/// Storage key for the bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Storage key for the JSON-encoded user record.
pub const AUTH_USER_KEY: &str = "auth_user";

/// Complete database schema for the client.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Session State
-- ============================================================================

-- Key/value pairs written only by the session store
CREATE TABLE IF NOT EXISTS session_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
