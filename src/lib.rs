pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{InMemoryCache, LocalStorage, SupabaseCache};
pub use config::{AppConfig, GeocoderProvider};
#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use core::etl::EtlEngine;
pub use core::matcher::{find_matches, AddressMatcher, MatchResult};
pub use core::normalize::{derive_keys, normalize, AddressKey};
pub use utils::error::{EtlError, Result};
