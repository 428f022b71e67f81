//! Report document construction and validation.
//!
//! This crate provides:
//! - [`build_document`] / [`render`] — canonical records → typed report tree
//!   → pretty-printed JSON text
//! - [`DocumentValidator`] — well-formedness plus optional declarative rules

mod builder;
mod validate;

pub use builder::{
    CountryNode, Geo, History, Identity, Magnitudes, Metadata, Report, ReportDocument,
    build_document, render,
};
pub use validate::{DocumentValidator, SchemaRules};
