//! Searching.
//!
//! - [`encode_search_param`] and [`SearchValue`]: the Query Parameter
//!   Encoder turning `field__modifier` filters into wire parameters
//! - [`Include`]: `_include` / `_revinclude` directives
//! - [`SearchSet`]: the lazy, chainable search builder
//! - [`Pages`]: page-by-page retrieval of a search

mod include;
mod params;
mod searchset;

pub use include::Include;
pub use params::{encode_search_param, EncodingError, SearchValue, MODIFIERS, PREFIXES};
pub use searchset::{Pages, SearchSet};
