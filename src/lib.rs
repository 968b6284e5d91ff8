pub mod authentication;
pub mod bookkeeping;
pub mod cli;
pub mod database;
pub mod http_err;
pub mod pagination;
pub mod repos;
pub mod server;
