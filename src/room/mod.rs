pub mod access;
pub mod handlers;
pub mod models;
pub mod presence;
pub mod repository;
pub mod requests;
pub mod service;
pub mod setlist;
pub mod sweeper;
pub mod types;
