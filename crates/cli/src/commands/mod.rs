pub mod chat;
pub mod compress;
pub mod config_cmd;
pub mod doctor;
pub mod serve;
