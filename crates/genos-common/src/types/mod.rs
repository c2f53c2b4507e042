//! Domain record types

pub mod agent;
pub mod entity;
pub mod facet;
pub mod health;
pub mod interpretation;
pub mod lifecycle;
pub mod need;
pub mod raw_data;
