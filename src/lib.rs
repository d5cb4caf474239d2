pub mod app;
pub mod audit;
pub mod authz;
pub mod db;
pub mod docs;
pub mod entity;
pub mod errors;
pub mod extract;
pub mod lifecycle;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod session;
pub mod utils;

pub use app::create_app;
