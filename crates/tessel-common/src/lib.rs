pub mod error;
pub mod protocol;
pub mod resolver;
pub mod scenario;
pub mod selector;
