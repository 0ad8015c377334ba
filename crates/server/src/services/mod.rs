//! Service layer: the domain logic between routes and repositories.

pub mod auth;
pub mod checkout;
pub mod coupon;
pub mod revocation;
pub mod settlement;
pub mod token;
