use crate::core::error::PipelineError;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Persona injected into every prompt. Kept as data so prompt-content tests
/// do not depend on deployment wording.
#[derive(Debug, Clone)]
pub struct AgentPersona {
    pub name: String,
    pub role: String,
    pub company: String,
    pub tone: String,
    pub specialty: String,
}

impl Default for AgentPersona {
    fn default() -> Self {
        Self {
            name: "Marcos".to_string(),
            role: "Analista de Dados Sênior".to_string(),
            company: "Altavia Automação".to_string(),
            tone: "Profissional, direto, com um toque de leveza".to_string(),
            specialty: "análise de visitas técnicas e relacionamento com clientes B2B \
                        nos setores industrial e comercial"
                .to_string(),
        }
    }
}

/// Process-wide configuration, constructed once at startup and passed by
/// reference into every component constructor. Components never read the
/// environment themselves, so tests can inject fake configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub database_url: String,
    pub openai_api_key: String,
    pub model: String,
    pub persona: AgentPersona,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| PipelineError::Configuration("DATABASE_URL is not set".to_string()))?;
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| PipelineError::Configuration("OPENAI_API_KEY is not set".to_string()))?;
        let model =
            std::env::var("FIELDLENS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            database_url,
            openai_api_key,
            model,
            persona: AgentPersona::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_persona_has_identity_fields() {
        let p = AgentPersona::default();
        assert!(!p.name.is_empty());
        assert!(!p.role.is_empty());
        assert!(!p.company.is_empty());
    }
}
