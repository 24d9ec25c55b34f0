pub mod config;
pub mod converter;
pub mod dataset;
pub mod domain;
pub mod driver;
pub mod error;
pub mod fs_util;
pub mod header;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod sidecar;
pub mod subjects;
