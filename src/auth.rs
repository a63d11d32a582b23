//! Bearer credentials and the ordered token sources that supply them.

pub mod secret;
pub mod source;

pub use secret::*;
pub use source::*;
