pub mod controller;
mod processing_loop;
