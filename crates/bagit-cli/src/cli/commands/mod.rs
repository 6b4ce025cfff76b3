pub mod dispatch;
pub mod make;
pub mod validate;

pub use dispatch::dispatch;
