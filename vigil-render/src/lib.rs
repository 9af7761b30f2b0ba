pub mod render;
pub mod scene;

pub use render::{FrameStats, SkiaRenderer};
pub use scene::{Mark, Scene, View, flanker_view, pvt_view};
