//! Plot output: terminal ASCII and SVG files.

pub mod ascii;
pub mod svg;

pub use ascii::render_ascii_plot;
pub use svg::render_svg;
