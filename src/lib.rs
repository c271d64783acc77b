// https://stackoverflow.com/a/61417700
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod accept;
#[cfg(feature = "axum")]
pub mod axum_support;
pub mod config;
pub mod error;
pub mod fingerprint;
#[cfg(feature = "moka")]
pub mod implementation;
pub mod key;
pub mod layer;
pub mod policy;
pub mod replay;
pub mod service;
pub mod state;
pub mod store;
pub mod tee;

pub use {layer::CachingLayer, service::CachingService};

#[cfg(test)]
mod test;
