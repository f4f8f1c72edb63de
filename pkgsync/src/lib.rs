//! pkgsync - client-side package deployment engine
//!
//! This library reconciles local directory trees with package manifests
//! served by a distribution server. Obsolete content is removed, changed or
//! missing files are downloaded with retry, and every file is classified for
//! post-install execution according to its attribute flags.
//!
//! # Modules
//!
//! - [`package`]: manifest value types and the installed package record
//! - [`manager`]: attribute policy, registry, tree differ, downloader and
//!   the installer that drives them
//! - [`config`]: INI configuration file
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod logging;
pub mod manager;
pub mod package;
