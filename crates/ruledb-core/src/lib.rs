#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod error;
pub mod fusion;
pub mod keywords;
pub mod loader;
pub mod planner;
pub mod traits;
pub mod types;

pub use error::{Error, IndexStage, Result};
