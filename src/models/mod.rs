pub mod common;
pub mod image;
pub mod payload;
pub mod request;

pub use common::*;
pub use image::*;
pub use payload::*;
pub use request::*;
