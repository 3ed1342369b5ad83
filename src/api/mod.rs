pub mod alfalah;
