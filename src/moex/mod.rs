// =============================================================================
// MOEX ISS — market data provider
// =============================================================================

pub mod client;

pub use client::MoexClient;
