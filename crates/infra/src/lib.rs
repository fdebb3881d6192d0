//! Infrastructure layer: event storage, command dispatch, projections,
//! configuration and the sizing service facade.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod locks;
pub mod products;
pub mod projections;
pub mod read_model;
pub mod service;
pub mod workers;


pub use command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
pub use config::SizingConfig;
pub use products::{InMemoryProductDirectory, ProductDirectory, ProductRecord};
pub use service::{MutationOutcome, SizesView, SizingService, StockView};
