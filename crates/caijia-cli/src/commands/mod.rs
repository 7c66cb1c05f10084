//! Command implementations for the caijia CLI
//!
//! Each command returns whether its result was a success shape; `main` turns
//! that into the exit code.

mod bulletin;
mod links;
mod price;

pub use bulletin::execute as show_bulletin;
pub use links::execute as list_links;
pub use price::execute as lookup_price;
