pub mod data_models;
pub mod session;

pub use data_models::*;
pub use session::*;
