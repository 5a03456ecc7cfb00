//! Integration tests package lib
#![allow(dead_code)]

mod utils;
