//! Value types shared by the broker, the resolver and the settlement workflow.

mod amount;
mod headers;
mod provider;

pub use amount::*;
pub use headers::*;
pub use provider::*;

/// A string-keyed map, as used for header sets on the broker wire.
pub type Record<V> = std::collections::HashMap<String, V>;
