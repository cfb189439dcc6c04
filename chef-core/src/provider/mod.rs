// chef-core/src/provider/mod.rs
//! External providers: subprocesses that contribute recipes over a
//! line-delimited JSON protocol, and the server side of that protocol.

pub mod manager;
pub mod protocol;
pub mod recipe;
pub mod server;
pub mod session;

pub use manager::{ProcessLauncher, ProviderLauncher, ProviderManager};
pub use protocol::{ProviderCommand, ProviderRequest, ProviderResponse, PROVIDER_FLAG};
pub use recipe::{provider_recipes, ProviderListing, ProviderRecipe};
pub use server::serve_provider;
pub use session::ProviderSession;
