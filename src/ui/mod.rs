pub mod conversation;
pub mod info;
pub mod markdown;

pub use info::InfoDialog;
