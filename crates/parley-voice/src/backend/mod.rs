//! Concrete speech-synthesis backends.
//!
//! The conversation engine only sees [`parley_core::SpeechSynthesizer`]; each
//! module here adapts one hosted or local engine to that port.
//!
//! | Module      | Engine                         |
//! |-------------|--------------------------------|
//! | [`minimax`] | MiniMax `t2a_v2` over HTTPS    |

pub mod minimax;

pub use minimax::MiniMaxSynthesizer;
