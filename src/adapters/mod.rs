pub mod csv_exporter;
pub mod http_gateway;
pub mod memory_view_store;

pub use csv_exporter::CsvExporter;
pub use http_gateway::HttpTransactionGateway;
pub use memory_view_store::InMemorySavedViewStore;
