pub mod analysis;
pub mod calendar;
pub mod dashboard;
pub mod db;
pub mod history;
pub mod lifecycle;
pub mod models;
pub mod scoring;
pub mod service;
