pub mod config;
pub mod context;
pub mod errors;
pub mod models;
pub mod services;
pub mod utils;

pub use config::LogoCacheConfig;
pub use context::OrganizationContext;
pub use errors::{LogoError, LogoResult};
pub use models::EncodedLogo;
pub use services::logo_cache::LogoCacheService;
