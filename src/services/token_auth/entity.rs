//! Authenticatable entity types and their resolved request bindings.

use std::fmt;

use axum::http::request::Parts;

use crate::services::token_auth::error::ConfigurationError;
use crate::services::token_auth::naming::{self, camelize, underscore};
use crate::services::token_auth::settings::Settings;

/// An authenticatable kind, identified by its CamelCase name (`User`, `SuperAdmin`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityType {
    name: String,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        naming::validate_type_name(&self.name)
    }

    /// Backing table: `User` -> `users`, `SuperAdmin` -> `super_admins`.
    pub fn table_name(&self) -> String {
        format!("{}s", underscore(&self.name))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An entity type as registered on a handler: naming, identifier field, and
/// where its credentials are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    entity_type: EntityType,
    name_underscore: String,
    identifier: String,
    token_header_name: String,
    identifier_header_name: String,
    case_insensitive_identifier: bool,
}

impl Entity {
    pub fn new(entity_type: EntityType, alias: Option<&str>, settings: &Settings) -> Self {
        let name_underscore = alias
            .map(str::to_string)
            .unwrap_or_else(|| underscore(entity_type.name()));
        let identifier = settings.identifier_for(entity_type.name()).to_string();
        let overrides = settings.header_names_for(&name_underscore);

        let token_header_name = overrides
            .and_then(|h| h.token.clone())
            .unwrap_or_else(|| format!("X-{}-Token", camelize(&name_underscore)));
        let identifier_header_name = overrides
            .and_then(|h| h.identifier.clone())
            .unwrap_or_else(|| {
                format!("X-{}-{}", camelize(&name_underscore), camelize(&identifier))
            });
        let case_insensitive_identifier = settings.is_case_insensitive(&identifier);

        Self {
            entity_type,
            name_underscore,
            identifier,
            token_header_name,
            identifier_header_name,
            case_insensitive_identifier,
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Scope name used for guard names and sessions.
    pub fn name_underscore(&self) -> &str {
        &self.name_underscore
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn token_header_name(&self) -> &str {
        &self.token_header_name
    }

    pub fn identifier_header_name(&self) -> &str {
        &self.identifier_header_name
    }

    pub fn token_param_name(&self) -> String {
        format!("{}_token", self.name_underscore)
    }

    pub fn identifier_param_name(&self) -> String {
        format!("{}_{}", self.name_underscore, self.identifier)
    }

    /// Query param first, then header.
    pub fn token_from_request(&self, parts: &Parts) -> Option<String> {
        param_or_header(parts, &self.token_param_name(), &self.token_header_name)
    }

    pub fn identifier_from_request(&self, parts: &Parts) -> Option<String> {
        let identifier = param_or_header(
            parts,
            &self.identifier_param_name(),
            &self.identifier_header_name,
        )?;

        if self.case_insensitive_identifier {
            Some(identifier.to_lowercase())
        } else {
            Some(identifier)
        }
    }
}

fn param_or_header(parts: &Parts, param: &str, header: &str) -> Option<String> {
    let from_query = parts.uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == param)
            .map(|(_, value)| value.trim().to_string())
    });

    from_query.filter(|v| !v.is_empty()).or_else(|| {
        parts
            .headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}
