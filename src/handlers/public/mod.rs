// handlers/public/mod.rs - endpoints reachable without a session
//
// Login and account bootstrap, plus the questionnaire pages patients fill in
// from the ward tablets.
pub mod auth;
pub mod questionnaire;
