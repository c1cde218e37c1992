pub mod cli;
pub mod config;
pub mod logging;
pub mod runtime;

pub use config::Config;
pub use runtime::builder::{build_engine, Engine, EngineSnapshot};
pub use runtime::demo::{run_demo, DemoReport};
