#![no_std]

pub mod dpkg;
pub mod env;
pub mod exit;
pub mod paths;
pub mod timing;
