//! Session state database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

impl Database {
    /// Get a session value.
    pub fn get_session_value(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM session_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Set a session value, replacing any previous one.
    pub fn set_session_value(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO session_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove session values. Returns the number of rows deleted.
    pub fn delete_session_values(&self, keys: &[&str]) -> DbResult<usize> {
        let mut removed = 0;
        for key in keys {
            removed += self
                .conn
                .execute("DELETE FROM session_state WHERE key = ?", [key])?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AUTH_TOKEN_KEY, AUTH_USER_KEY};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_missing_value() {
        let db = setup_db();
        assert_eq!(db.get_session_value(AUTH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_set_and_replace() {
        let db = setup_db();

        db.set_session_value(AUTH_TOKEN_KEY, "first").unwrap();
        db.set_session_value(AUTH_TOKEN_KEY, "second").unwrap();

        assert_eq!(
            db.get_session_value(AUTH_TOKEN_KEY).unwrap(),
            Some("second".to_string())
        );
    }

    #[test]
    fn test_delete_values() {
        let db = setup_db();

        db.set_session_value(AUTH_TOKEN_KEY, "token").unwrap();
        db.set_session_value(AUTH_USER_KEY, "{}").unwrap();

        let removed = db
            .delete_session_values(&[AUTH_TOKEN_KEY, AUTH_USER_KEY])
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(db.get_session_value(AUTH_USER_KEY).unwrap(), None);

        // Deleting again is a no-op
        let removed = db.delete_session_values(&[AUTH_TOKEN_KEY]).unwrap();
        assert_eq!(removed, 0);
    }
}
