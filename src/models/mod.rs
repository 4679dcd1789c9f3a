pub mod email;
pub mod enums;
pub mod record;

pub use email::*;
pub use enums::*;
pub use record::*;
