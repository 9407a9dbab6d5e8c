pub mod changes;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod github;
pub mod icons;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod parsers;
pub mod ranges;
pub mod render;
pub mod threshold;
