pub mod inspect;
pub mod latest;
pub mod timeline;
pub mod verify;
