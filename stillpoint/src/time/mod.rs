pub mod yield_now;
pub use yield_now::YieldNow;
