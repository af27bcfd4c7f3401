//! Per-registration options and their resolution against process-wide defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::services::token_auth::error::ConfigurationError;
use crate::services::token_auth::naming;

/// What a strict guard does after token authentication did not sign anyone in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Defer to the session authenticator (verify the session or force re-authentication).
    #[default]
    Devise,
    /// Deny with 401 unless a record is already signed in.
    Exception,
    /// Do nothing; the action decides.
    None,
}

impl Fallback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fallback::Devise => "devise",
            Fallback::Exception => "exception",
            Fallback::None => "none",
        }
    }
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFallback(pub String);

impl fmt::Display for UnknownFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown fallback: {:?}", self.0)
    }
}

impl std::error::Error for UnknownFallback {}

impl FromStr for Fallback {
    type Err = UnknownFallback;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "devise" => Ok(Fallback::Devise),
            "exception" => Ok(Fallback::Exception),
            "none" => Ok(Fallback::None),
            other => Err(UnknownFallback(other.to_string())),
        }
    }
}

/// `only` / `except` action lists forwarded to the before-action hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookScope {
    pub only: Vec<String>,
    pub except: Vec<String>,
}

impl HookScope {
    pub fn is_empty(&self) -> bool {
        self.only.is_empty() && self.except.is_empty()
    }

    pub fn applies_to(&self, action: &str) -> bool {
        (self.only.is_empty() || self.only.iter().any(|a| a == action))
            && !self.except.iter().any(|a| a == action)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self
            .only
            .iter()
            .chain(self.except.iter())
            .any(|a| a.trim().is_empty())
        {
            return Err(ConfigurationError::MalformedOptions(
                "empty action name in only/except".to_string(),
            ));
        }

        if let Some(action) = self.only.iter().find(|a| self.except.contains(*a)) {
            return Err(ConfigurationError::MalformedOptions(format!(
                "action `{action}` is listed in both only and except"
            )));
        }

        Ok(())
    }
}

/// Options passed to `handle_token_authentication_for`.
///
/// `fallback` and the legacy `fallback_to_devise` flag describe the same
/// setting; see `resolve`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationOptions {
    fallback: Option<Fallback>,
    fallback_to_devise: Option<bool>,
    alias: Option<String>,
    scope: HookScope,
    extra: BTreeMap<String, String>,
}

impl RegistrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn fallback_to_devise(mut self, enabled: bool) -> Self {
        self.fallback_to_devise = Some(enabled);
        self
    }

    /// Registers the entity under another name (`as:`), e.g. `admin` for `SuperAdmin`.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn only<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope.only.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn except<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope.except.extend(actions.into_iter().map(Into::into));
        self
    }

    /// Any other key; carried through opaquely.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Folds `fallback_to_devise` into `fallback` and fills the process-wide default.
    ///
    /// Precedence: explicit `fallback`, then `fallback_to_devise`
    /// (`true` -> devise, `false` -> none), then `default`.
    pub fn resolve(&self, default: Fallback) -> Result<ResolvedOptions, ConfigurationError> {
        self.scope.validate()?;
        if let Some(alias) = &self.alias {
            naming::validate_alias(alias)?;
        }

        let fallback = self
            .fallback
            .or(self.fallback_to_devise.map(|enabled| {
                if enabled {
                    Fallback::Devise
                } else {
                    Fallback::None
                }
            }))
            .unwrap_or(default);

        Ok(ResolvedOptions {
            fallback,
            alias: self.alias.clone(),
            scope: self.scope.clone(),
            extra: self.extra.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub fallback: Fallback,
    pub alias: Option<String>,
    pub scope: HookScope,
    pub extra: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fallback_fills_in_without_overriding_caller_keys() {
        let resolved = RegistrationOptions::new()
            .option("option", "value")
            .resolve(Fallback::Exception)
            .unwrap();

        assert_eq!(resolved.fallback, Fallback::Exception);
        assert_eq!(resolved.extra.get("option").map(String::as_str), Some("value"));
        assert!(resolved.scope.is_empty());
    }

    #[test]
    fn fallback_to_devise_maps_onto_fallback() {
        let disabled = RegistrationOptions::new()
            .fallback_to_devise(false)
            .resolve(Fallback::Devise)
            .unwrap();
        assert_eq!(disabled.fallback, Fallback::None);

        let enabled = RegistrationOptions::new()
            .fallback_to_devise(true)
            .resolve(Fallback::None)
            .unwrap();
        assert_eq!(enabled.fallback, Fallback::Devise);
    }

    #[test]
    fn explicit_fallback_wins_over_legacy_flag() {
        let resolved = RegistrationOptions::new()
            .fallback(Fallback::Exception)
            .fallback_to_devise(false)
            .resolve(Fallback::Devise)
            .unwrap();
        assert_eq!(resolved.fallback, Fallback::Exception);
    }

    #[test]
    fn action_in_only_and_except_is_rejected() {
        let err = RegistrationOptions::new()
            .only(["index", "show"])
            .except(["show"])
            .resolve(Fallback::Devise)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MalformedOptions(_)));
    }

    #[test]
    fn blank_action_and_bad_alias_are_rejected() {
        assert!(
            RegistrationOptions::new()
                .only([" "])
                .resolve(Fallback::Devise)
                .is_err()
        );
        assert!(matches!(
            RegistrationOptions::new()
                .alias("Admin")
                .resolve(Fallback::Devise),
            Err(ConfigurationError::InvalidAlias { .. })
        ));
    }

    #[test]
    fn hook_scope_filters_actions() {
        let only = HookScope {
            only: vec!["index".into()],
            except: vec![],
        };
        assert!(only.applies_to("index"));
        assert!(!only.applies_to("show"));

        let except = HookScope {
            only: vec![],
            except: vec!["public".into()],
        };
        assert!(except.applies_to("index"));
        assert!(!except.applies_to("public"));
    }

    #[test]
    fn fallback_parses_case_insensitively() {
        assert_eq!("Devise".parse::<Fallback>(), Ok(Fallback::Devise));
        assert_eq!(" none ".parse::<Fallback>(), Ok(Fallback::None));
        assert!("session".parse::<Fallback>().is_err());
    }
}
