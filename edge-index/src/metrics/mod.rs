pub mod counters;
pub mod registry;
pub mod service;
