// chef-net/src/lib.rs
pub mod http;

pub use http::{build_http_client, download_file, fetch_text};
