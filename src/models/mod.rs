pub mod decision;
pub mod donor;
pub mod enums;
pub mod filters;
pub mod intake;
pub mod inventory;
pub mod recipient;
pub mod request;

pub use decision::*;
pub use donor::*;
pub use filters::*;
pub use intake::*;
pub use inventory::*;
pub use recipient::*;
pub use request::*;
