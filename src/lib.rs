#[doc(inline)]
pub use abtag_core::*;

#[cfg(feature = "async")]
#[doc(inline)]
pub use abtag_async as futures;
