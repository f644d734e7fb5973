pub mod accounts;
pub mod artifacts;
