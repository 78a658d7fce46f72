pub mod engine;
pub mod normalizer;
pub mod outcome;
pub mod sink;
pub mod update;
