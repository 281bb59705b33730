// handlers/mod.rs - two access tiers
//
// Public (no session) → Protected (valid `ANS_Sessioni` token, some routes
// also gated by a function permission in `app.rs`)
pub mod protected;
pub mod public;
