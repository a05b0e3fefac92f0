//! PDF writing for incremental updates.
//!
//! ## Architecture
//!
//! ```text
//! PdfDocument (original bytes)
//!     ↓
//! [IncrementalUpdate] (new/replaced objects, raw bodies)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! original bytes + update section + xref (+ object spans)
//! ```
//!
//! [`appearance`] lays out the visible label drawn inside the signature
//! widget; [`acroform`] builds the field and form dictionaries around it.

pub mod acroform;
pub mod appearance;
mod incremental;
mod serializer;

pub use acroform::{unique_field_name, AcroFormBuilder, SignatureWidgetBuilder};
pub use appearance::{encode_win_ansi, layout_label, LabelLayout, LaidOutLine};
pub use incremental::{IncrementalUpdate, ObjectSpan, UpdateOutput};
pub use serializer::{format_real, ObjectSerializer};
pub(crate) use serializer::hex_upper;
