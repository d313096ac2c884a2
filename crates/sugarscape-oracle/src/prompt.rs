//! Prompt template loading and rendering via `minijinja`.
//!
//! Two templates make up a prompt: `system.j2` explains the rules and
//! `batch.j2` carries the agent contexts for one tick. Built-in copies are
//! compiled into the crate; a templates directory may override either one
//! so operators can tune wording without recompiling.

use minijinja::Environment;
use rust_decimal::Decimal;
use serde::Serialize;

use sugarscape_types::AgentContext;

use crate::error::OracleError;

const DEFAULT_SYSTEM: &str = include_str!("../templates/system.j2");
const DEFAULT_BATCH: &str = include_str!("../templates/batch.j2");

/// Rule parameters quoted to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    /// Maximum sugar taken from one combat victim.
    pub combat_limit: Decimal,
    /// Interest charged on loans.
    pub interest_rate: Decimal,
    /// Ticks until a loan falls due.
    pub loan_duration: u64,
}

/// Manages prompt template loading and rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

/// The complete rendered prompt ready to send to an oracle backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// Rules of the world and the reply format.
    pub system: String,
    /// The batch of agent contexts.
    pub user: String,
}

impl PromptEngine {
    /// Create a prompt engine from the built-in templates, replacing any
    /// that exist in `templates_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Prompt`] if an override cannot be read or a
    /// template does not compile.
    pub fn new(templates_dir: Option<&str>) -> Result<Self, OracleError> {
        let mut env = Environment::new();
        for (name, default) in [("system", DEFAULT_SYSTEM), ("batch", DEFAULT_BATCH)] {
            let source = match templates_dir {
                Some(dir) => load_override(dir, name)?.unwrap_or_else(|| default.to_owned()),
                None => default.to_owned(),
            };
            env.add_template_owned(name, source)
                .map_err(|e| OracleError::Prompt(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Render the prompt for one tick's batch.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Prompt`] if rendering fails.
    pub fn render(
        &self,
        tick: u64,
        rules: &RuleSummary,
        contexts: &[AgentContext],
    ) -> Result<RenderedPrompt, OracleError> {
        let contexts_json = serde_json::to_string_pretty(contexts)
            .map_err(|e| OracleError::Prompt(format!("failed to serialise contexts: {e}")))?;
        let vars = serde_json::json!({
            "tick": tick,
            "agent_count": contexts.len(),
            "combat_limit": rules.combat_limit,
            "interest_rate": rules.interest_rate,
            "loan_duration": rules.loan_duration,
            "contexts": contexts_json,
        });

        let system = self.render_one("system", &vars)?;
        let user = self.render_one("batch", &vars)?;
        Ok(RenderedPrompt { system, user })
    }

    fn render_one(&self, name: &str, vars: &serde_json::Value) -> Result<String, OracleError> {
        self.env
            .get_template(name)
            .map_err(|e| OracleError::Prompt(format!("missing {name} template: {e}")))?
            .render(vars)
            .map_err(|e| OracleError::Prompt(format!("{name} render failed: {e}")))
    }
}

/// Read `{dir}/{name}.j2` if it exists.
fn load_override(dir: &str, name: &str) -> Result<Option<String>, OracleError> {
    let path = std::path::Path::new(dir).join(format!("{name}.j2"));
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|e| OracleError::Prompt(format!("failed to read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use sugarscape_types::{AgentId, BitString, Position, Sex, Tribe};

    use super::*;

    fn rules() -> RuleSummary {
        RuleSummary {
            combat_limit: Decimal::TEN,
            interest_rate: Decimal::new(10, 2),
            loan_duration: 10,
        }
    }

    fn context(id: u64) -> AgentContext {
        AgentContext {
            agent_id: AgentId::new(id),
            tick: 42,
            position: Position::new(3, 4),
            sugar: Decimal::new(12, 0),
            metabolism: Decimal::ONE,
            vision: 2,
            age: 20,
            max_age: 80,
            sex: Sex::Female,
            tribe: Tribe::Blue,
            culture: BitString::zeros(3),
            fertile: true,
            reproduction_threshold: Decimal::TEN,
            loans_given: Vec::new(),
            loans_owed: Vec::new(),
            disease_count: 0,
            visible_cells: Vec::new(),
            visible_agents: Vec::new(),
        }
    }

    #[test]
    fn built_in_templates_render() {
        let engine = PromptEngine::new(None);
        assert!(engine.is_ok(), "built-in templates should compile");
        let Ok(engine) = engine else { return };

        let prompt = engine.render(42, &rules(), &[context(7), context(9)]);
        let Ok(prompt) = prompt else {
            panic!("render should succeed");
        };
        assert!(prompt.system.contains("tick 42"));
        assert!(prompt.system.contains("up to 10 of its sugar"));
        assert!(prompt.user.contains("exactly 2 decisions"));
        assert!(prompt.user.contains("\"agent_id\": 7"));
        assert!(prompt.user.contains("\"culture\": \"000\""));
    }

    #[test]
    fn directory_overrides_one_template() {
        let unique = format!(
            "sugarscape_test_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("system.j2"), "Custom rules for tick {{ tick }}.").ok();

        let engine = PromptEngine::new(dir.to_str());
        let Ok(engine) = engine else {
            panic!("override directory should load");
        };
        let Ok(prompt) = engine.render(5, &rules(), &[context(1)]) else {
            panic!("render should succeed");
        };
        assert_eq!(prompt.system, "Custom rules for tick 5.");
        assert!(prompt.user.contains("exactly 1 decisions"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn broken_override_is_an_error() {
        let unique = format!(
            "sugarscape_broken_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("batch.j2"), "{% for x in %}").ok();

        let result = PromptEngine::new(dir.to_str());
        assert!(matches!(result, Err(OracleError::Prompt(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
