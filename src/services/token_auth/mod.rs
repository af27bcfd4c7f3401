/*!
 * Token authentication
 *
 * Responsibility:
 * - Register token authentication for entity types on an owning handler
 * - Define the soft/strict guard pair per entity and install the before-action hook
 * - Resolve the fallback strategy applied when no token signs anyone in
 *
 * Public API:
 * - TokenAuthenticationHandler::handle_token_authentication_for
 * - EntitiesManager / FallbackManager (lazily created per handler)
 * - EntityStore (persistence seam), Settings (process-wide defaults)
 */

pub mod comparator;
pub mod entities;
pub mod entity;
pub mod error;
pub mod fallback;
pub mod generator;
pub mod guard;
pub mod handler;
pub mod hooks;
pub mod naming;
pub mod options;
pub mod settings;
pub mod store;

pub use entities::{EntitiesManager, TokenProvisioner};
pub use entity::{Entity, EntityType};
pub use error::{AuthenticationFailure, ConfigurationError, Denial};
pub use fallback::{FallbackAuthenticationHandler, FallbackManager};
pub use generator::{TokenError, ensure_authentication_token, friendly_token};
pub use guard::{GuardPair, TokenAuthenticator};
pub use handler::{AuthContext, TokenAuthenticationHandler};
pub use hooks::{BeforeAction, FilterChain};
pub use naming::{GuardKind, GuardName};
pub use options::{Fallback, HookScope, RegistrationOptions, ResolvedOptions};
pub use settings::{HeaderNames, Settings};
pub use store::{EntityRecord, EntityStore, MemoryEntityStore};
