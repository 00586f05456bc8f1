pub mod loader;
pub mod schema;

pub use loader::{CONFIG_ENV, ConfigError, ConfigLoader};
pub use schema::{
    EngineConfig, LowConfidencePolicy, ResolutionConfig, RetryConfig, ScreenshotConfig,
    SecurityConfig, WaitConfig,
};
