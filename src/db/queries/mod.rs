//! Database queries

pub mod assignment;
pub mod customer;
pub mod delivery;
pub mod depot;
pub mod route;
