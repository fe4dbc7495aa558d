//! API route handlers

pub mod check_image;
pub mod hashes;
pub mod health;
