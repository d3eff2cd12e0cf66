//! SPREAD synthetic frame generation
//!
//! Composes labelled spectrogram frames by blending emission packets cut from
//! stored molds onto background canvases.

pub mod collision;
pub mod config;
pub mod frame;
pub mod generator;
pub mod mold;
pub mod packet;
pub mod render;

pub use collision::{CollisionError, Placement, Transmission, check_collision, do_collide};
pub use config::{BackgroundSpec, MoldSpec, SynthConfig};
pub use frame::{Frame, FrameError, combine_db};
pub use generator::{FrameJob, FrameRenderer, GenerationReport, Generator};
pub use mold::MoldLibrary;
pub use packet::{LengthChange, Packet};
pub use render::RenderSettings;

// Error handling
pub type Result<T> = anyhow::Result<T>;
