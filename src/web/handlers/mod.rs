//! Web handlers module
//!
//! Thin handlers: extract parameters, delegate to [`crate::proxy`], let
//! [`crate::errors::AppError`] map failures to responses.

pub mod catalog;
pub mod health;
pub mod index;
pub mod relay;
