//! Shareable connection credential.
//!
//! Peers exchange a single textual credential out of band:
//!
//! `<rendezvous-address>:<connection-token>`
//!
//! The rendezvous address is an opaque string supplied by the external
//! anonymizing-transport layer and is never interpreted here. The token is
//! produced by the `veil-crypto` token codec. Exactly two colon-delimited
//! fields are accepted; anything else is rejected so a mangled paste fails
//! loudly instead of connecting to the wrong place.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Errors parsing the outer credential structure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// The credential did not have exactly two colon-delimited fields.
    #[error("invalid connection string: expected 2 colon-delimited fields, found {found}")]
    FieldCount {
        /// Fields actually present.
        found: usize,
    },

    /// One of the two fields was empty.
    #[error("invalid connection string: empty {field}")]
    EmptyField {
        /// Which field was empty.
        field: &'static str,
    },
}

/// A parsed `<rendezvous-address>:<token>` credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Opaque rendezvous address (e.g. an onion hostname with port mapping
    /// handled by the transport layer).
    pub rendezvous: String,
    /// Connection token carrying key material, opaque at this layer.
    pub token: String,
}

impl ConnectionString {
    /// Assemble a credential from its two fields.
    pub fn new(rendezvous: impl Into<String>, token: impl Into<String>) -> Self {
        Self { rendezvous: rendezvous.into(), token: token.into() }
    }
}

impl FromStr for ConnectionString {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 2 {
            return Err(ConnectError::FieldCount { found: fields.len() });
        }

        let rendezvous = fields[0].trim();
        let token = fields[1].trim();

        if rendezvous.is_empty() {
            return Err(ConnectError::EmptyField { field: "rendezvous address" });
        }
        if token.is_empty() {
            return Err(ConnectError::EmptyField { field: "token" });
        }

        Ok(Self { rendezvous: rendezvous.to_string(), token: token.to_string() })
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rendezvous, self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_fields() {
        let parsed: ConnectionString = "abcdef.onion:sometoken".parse().unwrap();
        assert_eq!(parsed.rendezvous, "abcdef.onion");
        assert_eq!(parsed.token, "sometoken");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let parsed: ConnectionString = "  host.onion:tok  \n".parse().unwrap();
        assert_eq!(parsed.rendezvous, "host.onion");
        assert_eq!(parsed.token, "tok");
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert_eq!(
            "justonefield".parse::<ConnectionString>(),
            Err(ConnectError::FieldCount { found: 1 })
        );
        assert_eq!(
            "a:b:c".parse::<ConnectionString>(),
            Err(ConnectError::FieldCount { found: 3 })
        );
    }

    #[test]
    fn rejects_empty_fields() {
        assert_eq!(
            ":token".parse::<ConnectionString>(),
            Err(ConnectError::EmptyField { field: "rendezvous address" })
        );
        assert_eq!(
            "host:".parse::<ConnectionString>(),
            Err(ConnectError::EmptyField { field: "token" })
        );
    }

    #[test]
    fn display_round_trips() {
        let original = ConnectionString::new("host.onion", "token123");
        let parsed: ConnectionString = original.to_string().parse().unwrap();
        assert_eq!(parsed, original);
    }
}
