//! Store implementations over `SeaORM`.
//!
//! Repositories hide the `SeaORM` details from the engine, which only sees
//! the `LibraryStore` trait.

pub mod library_store;
mod records;

pub use library_store::PgLibraryStore;
