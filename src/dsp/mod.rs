//! DSP engine: the effect chain and the two contexts that run it.
//!
//! Everything is processed in blocks of one render quantum. The same
//! [`chain::Chain`] is driven by [`live::LivePlayback`] for the real-time
//! preview (pulled by an AudioWorklet through WASM, or a native output
//! callback) and by [`renderer::OfflineRenderer`] for WAV export.

pub mod analyser;
pub mod buffer;
pub mod chain;
pub mod convolver;
pub mod delay;
pub mod filter;
pub mod impulse;
pub mod live;
pub mod renderer;
pub mod source;
