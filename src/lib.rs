//! # `sidemerge`
//!
//! Merge a model image and a product image side by side into one canvas, and
//! serve the operation over HTTP.
//!
//! The compositor flattens transparency onto white, scales the inputs to a
//! target height using Lanczos resampling, and places them on a white canvas
//! according to a [`LayoutPolicy`].
//!
//! ## Example
//!
//! ```no_run
//! use sidemerge::image::{load_image, save_image, OutputFormat};
//! use sidemerge::{merge, Input, LayoutPolicy, MergeRequest};
//!
//! # fn main() -> sidemerge::Result<()> {
//! let model = load_image("model.jpg", Input::Model)?;
//! let product = load_image("product.png", Input::Product)?;
//!
//! let request = MergeRequest {
//!     target_height: 1200,
//!     format: OutputFormat::Jpeg,
//!     layout: LayoutPolicy::UniformHeight,
//! };
//! let composite = merge(model, product, &request)?;
//! save_image(&composite.canvas, "merged.jpg", request.format)?;
//! # Ok(())
//! # }
//! ```

pub mod compositor;
pub mod config;
pub mod error;
pub mod image;
pub mod server;

pub use compositor::{merge, Composite, LayoutPolicy, MergeRequest};
pub use config::ServerConfig;
pub use error::{Error, ErrorKind, Input, Result};
