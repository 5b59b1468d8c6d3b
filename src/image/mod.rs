//! Image loading, encoding, and saving utilities.

mod load;
mod save;

pub use load::{decode, load_image, peek_dimensions, ImageSource, Loader};
pub use save::{encode, save_image, OutputFormat, JPEG_QUALITY};
