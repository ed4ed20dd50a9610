//! athena - runs the Athena cognitive layer over an in-memory agent mind

pub mod driver;
