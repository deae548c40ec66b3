//! Backend-agnostic resource descriptors and value types.

pub mod buffer;
pub mod bundle;
pub mod limits;
pub mod pass;
pub mod pipeline;
pub mod sampler;
pub mod texture;

pub use buffer::*;
pub use bundle::*;
pub use limits::*;
pub use pass::*;
pub use pipeline::*;
pub use sampler::*;
pub use texture::*;
