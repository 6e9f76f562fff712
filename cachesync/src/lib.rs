//! CacheSync - incremental content synchronization from manifest-driven
//! HTTP sources.
//!
//! The library fetches a remote partition list, compares every declared
//! file against the local directory by SHA-1 digest and downloads only what
//! changed, decompressing xz payloads on the fly. After the content pass
//! the distinguished executable is refreshed.
//!
//! - [`sync`] holds manifests, transfer pipeline and synchronizers
//! - [`config`] builds a [`config::SyncConfig`] from defaults and an INI file
//! - [`logging`] installs the tracing subscriber

pub mod config;
pub mod logging;
pub mod sync;
