pub mod logging;
pub mod validation;

pub use logging::LoggingCallback;
pub use validation::FnValidator;
pub use validation::StatusValidator;
