pub mod mock;

#[cfg(feature = "native-ffi")]
pub mod native;

pub use mock::MockBridge;

#[cfg(feature = "native-ffi")]
pub use native::NativeBridge;
