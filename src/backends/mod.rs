use anyhow::Result;

use crate::cost::CostEstimate;
use crate::frontend::TemplateResources;

pub mod json;
pub mod text;

pub trait Backend {
    fn name(&self) -> &'static str;
    fn file_extension(&self) -> &'static str;
    fn render_resources(&self, resources: &TemplateResources) -> Result<String>;
    fn render_estimate(&self, estimate: &CostEstimate) -> Result<String>;
}

pub fn get_backend(name: &str) -> Option<Box<dyn Backend>> {
    match name.to_lowercase().as_str() {
        "json" => Some(Box::new(json::JsonBackend)),
        "text" | "txt" => Some(Box::new(text::TextBackend)),
        _ => None,
    }
}
