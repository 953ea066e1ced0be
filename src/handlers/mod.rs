// handlers/mod.rs - two tiers
//
// Public (no gateway): service index and health probe.
// Protected (/api/*): everything behind the rate limiter and the auth resolver.
pub mod protected;
pub mod public;
