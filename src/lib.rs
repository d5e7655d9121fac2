#![crate_name = "cogol"]

#[macro_use]
extern crate lazy_static;

pub mod cogol_compiler;
pub mod qftasm;
