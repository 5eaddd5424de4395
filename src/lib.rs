pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod plan;
pub mod providers;
pub mod resource;
pub mod server;
pub mod sink;
pub mod utils;

pub use error::TributaryError;
pub use tributary_ignore as ignore;
pub use tributary_schema as schema;
