pub mod cdp;
pub mod inject;
pub mod session;

pub use session::HeadlessSession;
