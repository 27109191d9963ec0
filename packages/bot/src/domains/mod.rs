// Business domains
pub mod access;
pub mod drawing;
pub mod identity;
