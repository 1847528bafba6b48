//! Type definitions

pub mod assignment;
pub mod coordinate;
pub mod customer;
pub mod delivery;
pub mod depot;
pub mod messages;
pub mod route;

pub use assignment::*;
pub use coordinate::*;
pub use customer::*;
pub use delivery::*;
pub use depot::*;
pub use messages::*;
pub use route::*;
