//! Template rendering seam.

use crate::error::DriverError;

/// Renders a destination template with the current field value as input.
///
/// Any template engine can be plugged in; closures of the matching shape
/// implement this trait directly.
pub trait Render: Send + Sync {
    fn render(&self, template: &str, input: &str) -> Result<Vec<u8>, DriverError>;
}

impl<F> Render for F
where
    F: Fn(&str, &str) -> Result<Vec<u8>, DriverError> + Send + Sync,
{
    fn render(&self, template: &str, input: &str) -> Result<Vec<u8>, DriverError> {
        self(template, input)
    }
}

/// Minimal renderer substituting `{{.}}` (or `{{ . }}`) with the input.
///
/// Any other `{{ ... }}` action is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotRenderer;

impl Render for DotRenderer {
    fn render(&self, template: &str, input: &str) -> Result<Vec<u8>, DriverError> {
        let mut out = String::with_capacity(template.len() + input.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| format!("unclosed action in template {:?}", template))?;
            let action = after[..end].trim();
            if action != "." {
                return Err(format!("unsupported template action {{{{{}}}}}", action).into());
            }
            out.push_str(input);
            rest = &after[end + 2..];
        }
        out.push_str(rest);

        Ok(out.into_bytes())
    }
}
