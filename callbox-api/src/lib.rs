pub mod admin;
pub mod handlers;
pub mod markup;
pub mod network;
pub mod pages;
pub mod params;
pub mod server;
pub mod texml;

pub use server::{router, run};
