mod types;

pub use types::ProvisionerConfig;
