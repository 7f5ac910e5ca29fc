//! Resolved connection parameters.
//!
//! Deliberately thin: parsing a `postgres://` URL or a `.pgpass` file is the
//! out-of-scope job of a caller-supplied resolver (spec §1). This type only
//! knows how to render itself as the `key=value` startup string, mirroring
//! the teacher's `postgres/options/` rendering but trimmed to the fields the
//! core actually needs.

use std::fmt::Write as _;

/// Either a structured tuple of fields, or an opaque pre-formatted string
/// that is passed through unchanged (spec §3, §6).
#[derive(Debug, Clone)]
pub enum Settings {
    Fields(ConnectionFields),
    Raw(String),
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionFields {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Settings {
    /// Render as space-separated `key=value` pairs. Port `0` and empty
    /// strings are omitted; remaining fields are joined in declaration
    /// order: host, port, user, password, dbname.
    pub fn render(&self) -> String {
        match self {
            Settings::Raw(s) => s.clone(),
            Settings::Fields(fields) => {
                let mut parts = Vec::with_capacity(5);

                if !fields.host.is_empty() {
                    parts.push(format!("host={}", fields.host));
                }
                if fields.port != 0 {
                    parts.push(format!("port={}", fields.port));
                }
                if !fields.user.is_empty() {
                    parts.push(format!("user={}", fields.user));
                }
                if !fields.password.is_empty() {
                    parts.push(format!("password={}", fields.password));
                }
                if !fields.database.is_empty() {
                    parts.push(format!("dbname={}", fields.database));
                }

                let mut out = String::new();
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(out, " ");
                    }
                    let _ = write!(out, "{part}");
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_empty_and_zero_port() {
        let s = Settings::Fields(ConnectionFields {
            host: "localhost".into(),
            port: 0,
            user: "postgres".into(),
            password: String::new(),
            database: "app".into(),
        });

        assert_eq!(s.render(), "host=localhost user=postgres dbname=app");
    }

    #[test]
    fn full_fields_joined_in_order() {
        let s = Settings::Fields(ConnectionFields {
            host: "db.internal".into(),
            port: 5432,
            user: "app".into(),
            password: "hunter2".into(),
            database: "app".into(),
        });

        assert_eq!(
            s.render(),
            "host=db.internal port=5432 user=app password=hunter2 dbname=app"
        );
    }

    #[test]
    fn raw_passthrough() {
        let s = Settings::Raw("postgres://u:p@h/db".into());
        assert_eq!(s.render(), "postgres://u:p@h/db");
    }
}
