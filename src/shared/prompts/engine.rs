//! Template engine for agent prompts using Jinja2 syntax.
//!
//! Built-in templates are compiled into the binary. A `templates/prompts/`
//! directory next to the working directory may override any of them by name,
//! which lets operators tune prompt wording without a rebuild.

use minijinja::{Environment, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// Global template environment
static TEMPLATE_ENV: OnceLock<Environment<'static>> = OnceLock::new();

/// Override directory relative to the working directory
const TEMPLATE_DIR: &str = "templates/prompts";

/// Templates shipped with the binary, keyed by their path under `templates/prompts/`
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "chat_agent/system.jinja",
        include_str!("../../../templates/prompts/chat_agent/system.jinja"),
    ),
    (
        "chat_agent/user.jinja",
        include_str!("../../../templates/prompts/chat_agent/user.jinja"),
    ),
];

/// Errors that can occur during template operations
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Failed to render template: {0}")]
    RenderError(String),
}

fn init_environment() -> Environment<'static> {
    let mut env = Environment::new();

    for (name, source) in BUILTIN_TEMPLATES {
        if let Err(e) = env.add_template(name, source) {
            tracing::warn!("Failed to load built-in template {}: {}", name, e);
        }
    }

    let template_path = Path::new(TEMPLATE_DIR);
    if template_path.exists() {
        load_templates_recursive(&mut env, template_path, template_path);
    }

    env
}

/// Recursively load all .jinja templates from a directory, replacing
/// built-ins with the same name
fn load_templates_recursive(env: &mut Environment<'static>, base_path: &Path, current_path: &Path) {
    let Ok(entries) = std::fs::read_dir(current_path) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            load_templates_recursive(env, base_path, &path);
            continue;
        }
        if !path.extension().is_some_and(|ext| ext == "jinja") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(base_path) else {
            continue;
        };
        // Template names always use forward slashes
        let template_name = relative.to_string_lossy().replace('\\', "/");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                // Leaked once at startup; templates live for the whole process
                let static_name: &'static str = Box::leak(template_name.clone().into_boxed_str());
                let static_content: &'static str = Box::leak(content.into_boxed_str());
                if let Err(e) = env.add_template(static_name, static_content) {
                    tracing::warn!("Failed to load template {}: {}", template_name, e);
                } else {
                    tracing::debug!("Loaded template override: {}", template_name);
                }
            }
            Err(e) => tracing::warn!("Failed to read template {}: {}", template_name, e),
        }
    }
}

fn get_environment() -> &'static Environment<'static> {
    TEMPLATE_ENV.get_or_init(init_environment)
}

/// Render a template with the given context.
///
/// `template_name` is the path relative to `templates/prompts/`,
/// e.g. `"chat_agent/user.jinja"`.
pub fn render_template(
    template_name: &str,
    ctx: &HashMap<&str, Value>,
) -> Result<String, TemplateError> {
    let template = get_environment()
        .get_template(template_name)
        .map_err(|_| TemplateError::NotFound(template_name.to_string()))?;

    let render_ctx = Value::from_iter(ctx.iter().map(|(k, v)| (*k, v.clone())));

    template
        .render(render_ctx)
        .map_err(|e| TemplateError::RenderError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_missing_template() {
        let ctx = HashMap::new();
        let result = render_template("nonexistent.jinja", &ctx);
        assert!(matches!(result, Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_builtin_templates_are_registered() {
        for (name, _) in BUILTIN_TEMPLATES {
            assert!(get_environment().get_template(name).is_ok(), "{}", name);
        }
    }
}
