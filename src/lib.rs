pub mod config;
pub mod crm;
pub mod errors;
pub mod init;
pub mod logging;
