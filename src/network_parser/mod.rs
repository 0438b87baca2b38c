pub mod index_page;
pub mod transport;
