//! Finding the rows of a bulletin that denote a requested food item.
//!
//! Two strategies share the same candidate rows:
//!
//! - [`find_matches`]: substring search over the name column with a small
//!   synonym table. Pure and always available.
//! - [`AssistedMatcher`]: hands the candidates to a completion service for
//!   semantic matching. Its errors are meant to be recovered by falling back
//!   to [`find_matches`].

pub mod assisted;
pub mod columns;
pub mod deterministic;

pub use assisted::{AssistedMatcher, candidate_rows, parse_matches};
pub use columns::{NAME_KEYWORDS, resolve_name_column};
pub use deterministic::{find_matches, search_terms};
