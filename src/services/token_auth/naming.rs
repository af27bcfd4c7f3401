//! Name derivation for entity types and their guard methods.
//!
//! Every guard is addressed by a `GuardName` derived from the entity's
//! underscored name, e.g. `SuperAdmin` -> `authenticate_super_admin_from_token!`.

use std::fmt;

use crate::services::token_auth::error::ConfigurationError;

const GUARD_PREFIX: &str = "authenticate_";
const GUARD_SUFFIX: &str = "_from_token";

/// Converts a CamelCase type name into snake_case.
///
/// - `SuperAdmin` -> `super_admin`
/// - `HTTPClient` -> `http_client`
/// - `Admin::User` -> `admin_user`
pub fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);

    for (i, segment) in name.split("::").enumerate() {
        if i > 0 {
            out.push('_');
        }

        let chars: Vec<char> = segment.chars().collect();
        for (j, &c) in chars.iter().enumerate() {
            if c.is_ascii_uppercase() && j > 0 {
                let prev = chars[j - 1];
                let next_is_lower = chars.get(j + 1).is_some_and(|n| n.is_ascii_lowercase());
                if prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next_is_lower)
                {
                    out.push('_');
                }
            }
            out.push(c.to_ascii_lowercase());
        }
    }

    out
}

/// Inverse of `underscore` for a single segment: `super_admin` -> `SuperAdmin`.
pub fn camelize(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Type names are CamelCase segments joined by `::`.
pub fn validate_type_name(name: &str) -> Result<(), ConfigurationError> {
    let valid = !name.is_empty()
        && name.split("::").all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
                && chars.all(|c| c.is_ascii_alphanumeric())
        });

    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidEntityType {
            name: name.to_string(),
        })
    }
}

/// Aliases replace the underscored name verbatim, so they must already be snake_case.
pub fn validate_alias(alias: &str) -> Result<(), ConfigurationError> {
    let mut chars = alias.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidAlias {
            alias: alias.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardKind {
    /// Token check only; never denies the request.
    Soft,
    /// Token check followed by the fallback strategy.
    Strict,
}

/// `authenticate_<entity>_from_token` / `authenticate_<entity>_from_token!`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuardName {
    entity: String,
    kind: GuardKind,
}

impl GuardName {
    pub fn new(entity: impl Into<String>, kind: GuardKind) -> Self {
        Self {
            entity: entity.into(),
            kind,
        }
    }

    pub fn soft(entity: impl Into<String>) -> Self {
        Self::new(entity, GuardKind::Soft)
    }

    pub fn strict(entity: impl Into<String>) -> Self {
        Self::new(entity, GuardKind::Strict)
    }

    /// Parses a method name such as `authenticate_user_from_token!`.
    pub fn parse(method: &str) -> Option<Self> {
        let rest = method.strip_prefix(GUARD_PREFIX)?;
        let (rest, kind) = match rest.strip_suffix('!') {
            Some(rest) => (rest, GuardKind::Strict),
            None => (rest, GuardKind::Soft),
        };
        let entity = rest.strip_suffix(GUARD_SUFFIX)?;

        if entity.is_empty() {
            return None;
        }
        Some(Self::new(entity, kind))
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn kind(&self) -> GuardKind {
        self.kind
    }
}

impl fmt::Display for GuardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bang = match self.kind {
            GuardKind::Soft => "",
            GuardKind::Strict => "!",
        };
        write!(f, "{GUARD_PREFIX}{}{GUARD_SUFFIX}{bang}", self.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscore_splits_words_and_acronyms() {
        assert_eq!(underscore("User"), "user");
        assert_eq!(underscore("SuperAdmin"), "super_admin");
        assert_eq!(underscore("HTTPClient"), "http_client");
        assert_eq!(underscore("Admin::User"), "admin_user");
        assert_eq!(underscore("Member2Fa"), "member2_fa");
    }

    #[test]
    fn camelize_joins_words() {
        assert_eq!(camelize("super_admin"), "SuperAdmin");
        assert_eq!(camelize("email"), "Email");
        assert_eq!(camelize("user"), "User");
    }

    #[test]
    fn type_names_must_be_camel_case() {
        assert!(validate_type_name("User").is_ok());
        assert!(validate_type_name("Admin::SuperAdmin").is_ok());
        assert!(validate_type_name("").is_err());
        assert!(validate_type_name("user").is_err());
        assert!(validate_type_name("Super Admin").is_err());
        assert!(validate_type_name("Admin::").is_err());
    }

    #[test]
    fn aliases_must_be_snake_case() {
        assert!(validate_alias("admin").is_ok());
        assert!(validate_alias("api_client2").is_ok());
        assert!(validate_alias("Admin").is_err());
        assert!(validate_alias("").is_err());
        assert!(validate_alias("2fa").is_err());
    }

    #[test]
    fn guard_names_render_like_methods() {
        assert_eq!(
            GuardName::soft("user").to_string(),
            "authenticate_user_from_token"
        );
        assert_eq!(
            GuardName::strict("super_admin").to_string(),
            "authenticate_super_admin_from_token!"
        );
    }

    #[test]
    fn guard_names_parse_back() {
        let strict = GuardName::parse("authenticate_super_admin_from_token!").unwrap();
        assert_eq!(strict.entity(), "super_admin");
        assert_eq!(strict.kind(), GuardKind::Strict);

        let soft = GuardName::parse("authenticate_user_from_token").unwrap();
        assert_eq!(soft, GuardName::soft("user"));

        assert!(GuardName::parse("authenticate_from_token").is_none());
        assert!(GuardName::parse("current_user").is_none());
    }
}
