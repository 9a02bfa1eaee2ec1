//! Reelwatch-Common: Shared identity types, scopes, and errors.
//!
//! This crate provides the vocabulary shared by every part of reelwatch:
//!
//! - **External keys**: Catalog identifiers (TMDB, TVDB, IMDb) tagged by scheme,
//!   and the priority-ordered [`ExternalKeySet`] built from them
//! - **Scopes**: Whether a pending change covers a whole item or part of a season
//! - **Core Types**: Item kinds reported by the library and tracker kinds
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use reelwatch_common::{EntryScope, ExternalKey, ExternalKeySet, KeyScheme};
//!
//! let keys = ExternalKeySet::from_keys([
//!     ExternalKey::new(KeyScheme::Alternate, "tt1375666"),
//!     ExternalKey::new(KeyScheme::Primary, "27205"),
//! ]);
//!
//! // Primary catalog ids always win.
//! assert_eq!(keys.preferred().map(|k| k.value.as_str()), Some("27205"));
//! assert_eq!(keys.composite_key(&EntryScope::WholeItem), "tmdb:27205");
//! ```

pub mod error;
pub mod keys;
pub mod types;

pub use error::{Error, Result};
pub use keys::*;
pub use types::*;
