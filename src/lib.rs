pub mod cloud;
pub mod config;
pub mod db;
pub mod download;
pub mod error;
pub mod workflow;
