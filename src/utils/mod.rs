pub mod dirty_keys;
pub mod glob;

pub use dirty_keys::DirtyKeySet;
pub use glob::glob_escape;
pub use glob::glob_match;
