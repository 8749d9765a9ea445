//! End-to-end checks for the multicluster observability operator.
//!
//! Scenarios drive a live hub through install, reconcile and uninstall and
//! wait for each expected state with a [`converge::Poller`].

pub mod checks;
pub mod classify;
pub mod cluster;
pub mod config;
pub mod error;
pub mod kube_client;
pub mod logging;
pub mod manifests;
pub mod resources;
pub mod scenarios;
