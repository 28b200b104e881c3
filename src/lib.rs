pub mod cli;
pub mod elliptic_envelope;
pub mod parse;
pub mod plot;
pub mod report;
pub mod stats;
