//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/` directory)
//! so operators can tune persona behavior without recompiling. Each decision
//! renders the shared `system.j2` plus one task template.

use minijinja::Environment;

use crate::error::ReasoningError;

/// Template names and their file names, in load order.
const TEMPLATES: [(&str, &str); 3] = [
    ("system", "system.j2"),
    ("observation", "observation.j2"),
    ("reactions", "reactions.j2"),
];

/// Manages prompt template loading and rendering.
///
/// Wraps a `minijinja` [`Environment`] with every prompt template
/// pre-loaded. Templates edited on disk are picked up on the next call to
/// [`PromptEngine::new`].
pub struct PromptEngine {
    env: Environment<'static>,
}

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the persona's reality.
    pub system: String,
    /// User message carrying the task and its context.
    pub user: String,
}

impl PromptEngine {
    /// Create a new prompt engine loading templates from the given directory.
    ///
    /// The directory must contain `system.j2`, `observation.j2` and
    /// `reactions.j2`.
    ///
    /// # Errors
    ///
    /// Returns [`ReasoningError::Template`] if a file is missing or does not
    /// compile.
    pub fn new(templates_dir: &str) -> Result<Self, ReasoningError> {
        let mut env = Environment::new();

        for (name, filename) in TEMPLATES {
            let source = load_template(templates_dir, filename)?;
            env.add_template_owned(name, source).map_err(|e| {
                ReasoningError::Template(format!("failed to add {name} template: {e}"))
            })?;
        }

        Ok(Self { env })
    }

    /// Render the prompt asking which nearby activity the persona noticed.
    pub fn render_observation(
        &self,
        context: &serde_json::Value,
    ) -> Result<RenderedPrompt, ReasoningError> {
        self.render_task("observation", context)
    }

    /// Render the prompt asking how the persona reacts to what it noticed.
    pub fn render_reactions(
        &self,
        context: &serde_json::Value,
    ) -> Result<RenderedPrompt, ReasoningError> {
        self.render_task("reactions", context)
    }

    fn render_task(
        &self,
        task: &str,
        context: &serde_json::Value,
    ) -> Result<RenderedPrompt, ReasoningError> {
        Ok(RenderedPrompt {
            system: self.render_one("system", context)?,
            user: self.render_one(task, context)?,
        })
    }

    fn render_one(&self, name: &str, context: &serde_json::Value) -> Result<String, ReasoningError> {
        self.env
            .get_template(name)
            .map_err(|e| ReasoningError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map_err(|e| ReasoningError::Template(format!("{name} render failed: {e}")))
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, ReasoningError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| ReasoningError::Template(format!("failed to read {path}: {e}")))
}
