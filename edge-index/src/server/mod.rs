pub mod listener;
pub mod origin;
pub mod proxy;
