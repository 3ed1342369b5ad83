pub mod alfalah;

pub use alfalah::AlfalahGateway;
