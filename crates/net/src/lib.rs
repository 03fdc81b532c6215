#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for yama
//!
//! This crate implements the content fetcher: it streams a package archive
//! from an `http`, `https` or `file` URL into a staging file, resuming
//! interrupted transfers with range requests and retrying transient
//! failures with exponential backoff.

mod client;
mod download;

pub use client::{NetClient, NetConfig};
pub use download::{
    FetchOptions, PackageDownloadConfig, PackageDownloader, RetryConfig, StagedArchive,
};
