pub mod core;
pub mod data_sources;
pub mod env;
pub mod for_each;
pub mod resources;
pub mod template;
pub mod variables;

// Re-export commonly used functions for convenience
pub use core::{expr_to_value, find_attr, EvalError};
pub use env::{VarType, VariableDefinition, VariableEnvironment};
pub use resources::{ResourceSpec, TemplateResources};
pub use template::load_template_with_loader;
