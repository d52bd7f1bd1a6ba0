//! Enrolled templates: the in-memory set, its CBOR file form and the
//! enrollment path that produces it.
mod enroll;
mod template_file;
mod template_set;

pub use enroll::{Enroller, enroll_files};
pub use template_file::{TemplateLoad, TemplateSave};
pub use template_set::{SharedTemplates, Template, TemplateSet};
