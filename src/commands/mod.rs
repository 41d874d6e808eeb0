pub mod apply;
pub mod config;
pub mod doctor;
pub mod validate;
