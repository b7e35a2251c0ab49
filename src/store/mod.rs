pub mod credentials;
pub mod tasks;

pub use credentials::CredentialStore;
pub use tasks::TaskStore;
