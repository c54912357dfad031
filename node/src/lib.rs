// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod api;
pub mod telemetry;
pub mod store;
pub mod notifier;
pub mod ingest;
pub mod query;
pub mod gateway;
pub mod catalog;
pub mod recovery;
pub mod server;
