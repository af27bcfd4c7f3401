/*!
 * Request extractors
 *
 * Public API:
 * - Current: everyone signed in on the request (set by the token auth middleware)
 */

mod current;

pub use current::Current;
