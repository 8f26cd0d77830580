pub mod health;
pub mod ingest;
pub mod player;
pub mod states;
pub mod validation;
