//! Domain models for the server.

pub mod cart;
pub mod coupon;
pub mod order;
pub mod user;

pub use cart::CartLine;
pub use coupon::Coupon;
pub use order::{Order, OrderLine};
pub use user::{CurrentUser, User, UserView};
