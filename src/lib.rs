//! pipescope: a terminal dashboard for pipelines, their stages, builds and logs.

pub mod bus;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod keys;
pub mod modal;
pub mod model;
pub mod nav;
pub mod service;
pub mod source;
pub mod tasks;
pub mod views;
