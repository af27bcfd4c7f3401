use std::collections::HashMap;

use crate::services::token_auth::options::Fallback;

pub const DEFAULT_IDENTIFIER: &str = "email";

/// Per-entity header name overrides (keyed by the entity's underscored name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderNames {
    pub token: Option<String>,
    pub identifier: Option<String>,
}

/// Process-wide token authentication defaults.
///
/// Built once at bootstrap (see `Config::from_env`) and shared by every
/// handler. `fallback` is read on each registration that does not pick one.
#[derive(Debug, Clone)]
pub struct Settings {
    pub fallback: Fallback,
    /// Persist a session when a record signs in from a token.
    pub sign_in_token: bool,
    /// Skip trackable updates (last sign-in timestamps) for token sign-ins.
    pub skip_trackable: bool,
    /// Identifier field per entity type name, e.g. `SuperAdmin => username`.
    pub identifiers: HashMap<String, String>,
    pub header_names: HashMap<String, HeaderNames>,
    /// Identifier fields that are looked up lower-cased.
    pub case_insensitive_keys: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fallback: Fallback::Devise,
            sign_in_token: false,
            skip_trackable: true,
            identifiers: HashMap::new(),
            header_names: HashMap::new(),
            case_insensitive_keys: vec![DEFAULT_IDENTIFIER.to_string()],
        }
    }
}

impl Settings {
    pub fn identifier_for(&self, type_name: &str) -> &str {
        self.identifiers
            .get(type_name)
            .map(String::as_str)
            .unwrap_or(DEFAULT_IDENTIFIER)
    }

    pub fn header_names_for(&self, name_underscore: &str) -> Option<&HeaderNames> {
        self.header_names.get(name_underscore)
    }

    pub fn is_case_insensitive(&self, field: &str) -> bool {
        self.case_insensitive_keys.iter().any(|k| k == field)
    }
}
