//! HTTP client for the hosted workspace API.
//!
//! Implements [`alm_core::RemoteStore`] against the REST surface of the
//! document-database service almanac syncs with.

pub mod http;

pub use http::HttpRemoteStore;
