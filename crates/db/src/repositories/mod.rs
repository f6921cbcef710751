pub mod application;

pub use application::SqlApplicationRepository;
