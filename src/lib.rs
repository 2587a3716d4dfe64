//! Rainbow library exports for testing

pub mod console;
pub mod core;
pub mod feed;

#[cfg(test)]
pub mod test_support;
