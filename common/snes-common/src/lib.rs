pub mod boxedarray;
pub mod frontend;
pub mod num;
pub mod thread;
pub mod timeutils;
