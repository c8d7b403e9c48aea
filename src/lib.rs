//! Cohort: group formation, membership and sprint lifecycle for team projects.

pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod formation;
pub mod models;
pub mod policy;
