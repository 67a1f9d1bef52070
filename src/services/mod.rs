pub mod logo_cache;
