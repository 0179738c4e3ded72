#![allow(missing_docs)]

pub mod answers;
pub mod answers_schema;
pub mod condition;
pub mod date;
pub mod documents;
pub mod registry;
pub mod render;
pub mod requirement;
pub mod session;
pub mod spec;
pub mod sub_entity;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerAction, AnswerSet};
pub use answers_schema::{bundle_schema, generate as answers_schema};
pub use condition::{Condition, Operator};
pub use date::{DateError, DatePolicy};
pub use documents::{DocumentChecklist, active_documents, required_documents};
pub use registry::{FormRegistry, RegistryBuilder, RegistryError};
pub use render::{
    RenderPayload, RenderProgress, RenderStatus, build_render_payload, render_json_ui,
    render_text,
};
pub use requirement::RequirementLevel;
pub use session::{FormSession, FormState};
pub use spec::{
    DocumentCondition, DocumentSpec, EntityKind, FieldSpec, FieldType, FormBundle, StepSpec,
};
pub use sub_entity::{
    ChangeSink, NormalizedInput, SubEntityEditor, SubEntityError, SubEntityList,
    normalize_external_input,
};
pub use validate::{ValidationError, ValidationResult, validate, validate_at};
pub use visibility::{VisibilityMap, resolve_visibility, visible_fields};
