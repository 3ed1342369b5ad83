pub mod envelope;
pub mod error;
pub mod fields;
pub mod provider;
pub mod providers;
pub mod types;
pub mod utils;

pub use envelope::EnvelopeCodec;
pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentGateway;
pub use providers::AlfalahGateway;
pub use types::{Amount, PaymentState, TransactionType};
