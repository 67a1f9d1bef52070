pub mod logo;

pub use logo::EncodedLogo;
