pub mod file_storage;
pub mod rest_countries;

pub use file_storage::FileStorage;
pub use rest_countries::RestCountriesAdapter;
