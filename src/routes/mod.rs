pub mod audit;
pub mod auth;
pub mod clients;
pub mod health;
pub mod invoices;
pub mod job_orders;
pub mod leads;
pub mod masters;
pub mod quotations;
pub mod records;
pub mod roles;
pub mod sites;
pub mod users;
