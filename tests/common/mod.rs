#![allow(dead_code)]

mod behaviors;

pub use behaviors::*;
