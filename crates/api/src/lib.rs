//! `orgdir-api` — HTTP surface for the organization directory.

pub mod app;
