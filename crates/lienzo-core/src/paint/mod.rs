//! Paint-related value types (colors).

mod color;

pub use color::Color;
