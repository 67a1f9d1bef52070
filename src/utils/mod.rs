pub mod http_client;
pub mod url;

pub use http_client::{FetchedImage, LogoHttpClient, StandardHttpClient};
pub use url::UrlUtils;
