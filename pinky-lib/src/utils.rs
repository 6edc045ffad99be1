//! contains small utility functions that have nowhere else to go

/// returns the crate version
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// panics with a message that makes clear that this is not the users fault
macro_rules! bug {
    ($msg:literal $(, $args:expr)*) => {
       panic!(concat!("A pinky bug occured:\n\n", $msg) $(, $args)*)
    };
}

pub(crate) use bug;
