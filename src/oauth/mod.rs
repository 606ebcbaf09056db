pub mod claims;
pub mod employee;
pub mod gate;
pub mod metadata;
pub mod scopes;
pub mod validator;

pub use claims::ValidatedClaims;
pub use gate::{ExecutionContext, OperationGate};
