/// Coffee payer wheel: spins, confirmation and history.
pub mod coffee_service;
/// Restaurant list, member list and rankings projections.
pub mod directory_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Validated, online-gated writes to the store.
pub mod gateway;
/// Health check service.
pub mod health_service;
/// Lunch restaurant wheel.
pub mod roulette_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Store connection supervision driving the online flag.
pub mod storage_supervisor;
/// Wheel segment geometry and labels.
pub mod wheel;
