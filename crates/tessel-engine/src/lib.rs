pub mod analyzer;
pub mod config;
pub mod executor;
pub mod formatter;
pub mod run;
pub mod runner;
pub mod session;
pub mod validator;

pub use tessel_common::protocol;
pub use tessel_common::resolver;
pub use tessel_common::scenario;
