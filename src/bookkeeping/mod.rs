//! Personal bookkeeping resources and the operations shared by all of them.

pub mod domain;
pub mod http;
pub mod ownership;
pub mod populate;
pub mod services;
