//! HTTP request handlers

pub mod control;
pub mod history;
