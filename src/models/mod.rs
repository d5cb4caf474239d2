pub mod client;
pub mod invoice;
pub mod job_order;
pub mod lead;
pub mod quotation;
pub mod service_type;
pub mod site;
pub mod user;
