//! Small terminal helpers.

pub mod input;
