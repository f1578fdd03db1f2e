pub mod combine;
pub mod common;
pub mod data;
pub mod driver;
pub mod error;
pub mod io;
pub mod model;
pub mod prob;
pub mod progress;
pub mod runner;
pub mod somatic;
pub mod subsample;
pub mod table;
pub mod train;
pub mod utils;

extern crate jemallocator;
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;
