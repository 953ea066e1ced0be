pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod mutation;
pub mod error;

pub use types::*;
pub use error::FilterError;
pub use filter::{clamp_limit, clamp_offset, parse_int, Filter};
pub use mutation::Mutation;
