#![doc = "webwatch-core: snapshot diff and reconciliation engine for webwatch."]

//! This crate contains all engine logic: the canonical record model,
//! per-source schemas and normalisers, the diff engine, the reconciler with
//! its retry and throttle policy, report rendering and the dispatcher.
//! Transport concerns (HTTP store client, notifier client, CLI) live in the
//! `webwatch` binary crate.
//!
//! # Usage
//! Register source policies in a [`sources::SourceRegistry`], provide a
//! [`repository::Repository`] and a [`notify::Notifier`], and call
//! [`dispatch::run`] with one inbound [`dispatch::WatchRequest`].

pub mod diff;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod policy;
pub mod reconcile;
pub mod record;
pub mod repository;
pub mod retry;
pub mod schema;
pub mod sources;
