pub mod builder;
pub mod demo;
