// src/lib.rs
// #![allow(dead_code)]
// #![allow(unused)]

#[macro_use]
pub mod macros;
#[macro_use]
pub mod logging;

pub mod config;
pub mod error;

pub mod dataset;
pub mod freshness;
pub mod snapshot;

pub mod file;
pub mod runner;
pub mod store;

pub mod agent;
pub mod capture;
pub mod pipeline;
pub mod progress;

#[cfg(feature = "cli")]
pub mod cli;
