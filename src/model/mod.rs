pub mod analysis;
pub mod config;
mod convert;
pub mod evidence;
pub mod extracted;
pub mod verdict;

pub use analysis::*;
pub use config::{Config, EngineConfig, RetrieverConfig, SearchConfig};
pub use evidence::*;
pub use verdict::*;
