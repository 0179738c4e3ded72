pub mod document;
pub mod field;
pub mod form;

pub use document::{DocumentCondition, DocumentSpec, ExtractableField};
pub use field::{EntityKind, FieldOption, FieldSpec, FieldType, ValidationRules};
pub use form::{BundleError, FormBundle, LintWarning, StepSpec};
