pub mod config;
pub mod history;
pub mod socket_adapter;
pub mod terminal;
