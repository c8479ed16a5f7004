use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::core::catalog::schema_guidance;
use crate::core::config::AgentPersona;
use crate::core::error::PipelineError;
use crate::core::history::{ConversationTurn, format_history};
use crate::core::llm::{ChatMessage, LlmClient};
use crate::core::temporal::{FilterContext, build_filter_guidance, temporal_rules};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 800;
/// Low temperature: SQL generation wants determinism, not creativity.
const GENERATION_TEMPERATURE: f32 = 0.1;
/// Result-summary context from the dashboard is reference only; cap it so it
/// cannot crowd the schema document out of the prompt.
const MAX_CONTEXT_CHARS: usize = 2000;

/// Assemble the fixed instruction document for SQL generation: persona,
/// schema/rules, temporal normalization and the dashboard-filter block.
/// Pure text assembly, testable without an LLM.
pub fn build_system_prompt(
    persona: &AgentPersona,
    filters: &FilterContext,
    today: NaiveDate,
) -> String {
    format!(
        "Você é {}, {} da {}.\n\
         Converta perguntas em SQL PostgreSQL válido.\n\n\
         {}\n\n{}\n\n{}\n\
         INSTRUÇÕES GERAIS:\n\
         - Use as tabelas/views corretas conforme as regras acima.\n\
         - PARA CONTAR VISITAS / OS:\n\
           * Prefira SEMPRE fieldops.work_orders (1 linha = 1 OS) com COUNT(*).\n\
           * Em fieldops.vw_visit_answers use OBRIGATORIAMENTE COUNT(DISTINCT task_id).\n\
         - LIMIT obrigatório (<= 1000).\n\
         - Texto -> ILIKE '%termo%'.\n\
         - Retorne SOMENTE o SQL: uma única instrução, sem markdown, sem explicação.\n\
         - Pergunta ambígua sobre \"essa OS\" -> pegue a última OS:\n\
           SELECT os_number, assignee_name, poi, status, created_at\n\
           FROM fieldops.work_orders\n\
           ORDER BY created_at DESC\n\
           LIMIT 1\n\
         - O histórico de conversa serve APENAS para entender o contexto da pergunta\n\
           (ex.: \"e desse vendedor?\"), NUNCA como filtro automático de datas,\n\
           vendedores ou clientes.\n",
        persona.name,
        persona.role,
        persona.company,
        schema_guidance(today),
        temporal_rules(today),
        build_filter_guidance(filters),
    )
}

/// Assemble the per-request user message: question, compacted history and
/// the optional dashboard result-summary context.
pub fn build_user_content(
    question: &str,
    history: &[ConversationTurn],
    assistant_name: &str,
    summary_context: Option<&str>,
) -> String {
    let mut content = format!("Pergunta do usuário:\n{}", question);

    let history_txt = format_history(history, assistant_name);
    if !history_txt.is_empty() {
        content.push_str(
            "\n\nHistórico recente da conversa (somente contexto; não use como filtro SQL):\n",
        );
        content.push_str(&history_txt);
    }

    if let Some(context) = summary_context.filter(|c| !c.is_empty()) {
        let capped: String = context.chars().take(MAX_CONTEXT_CHARS).collect();
        content.push_str(
            "\n\nContexto de resumo de dados (apenas referência, não é filtro direto):\n",
        );
        content.push_str(&capped);
    }

    content
}

/// LLM-driven translation of a question into one candidate SQL statement.
pub struct SqlGenerator {
    llm: Arc<dyn LlmClient>,
}

impl SqlGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Generate one candidate statement. Retries transport/LLM failures with
    /// exponential backoff; after the last attempt the error is returned as
    /// `PipelineError::Generation`; nothing panics across this boundary.
    pub async fn generate(
        &self,
        persona: &AgentPersona,
        question: &str,
        filters: &FilterContext,
        history: &[ConversationTurn],
        summary_context: Option<&str>,
        today: NaiveDate,
    ) -> Result<String, PipelineError> {
        let messages = vec![
            ChatMessage::system(build_system_prompt(persona, filters, today)),
            ChatMessage::user(build_user_content(
                question,
                history,
                &persona.name,
                summary_context,
            )),
        ];

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.llm.complete(&messages, GENERATION_TEMPERATURE).await {
                Ok(text) => {
                    let sql = text.replace("```sql", "").replace("```", "").trim().to_string();
                    if sql.is_empty() {
                        last_error = "LLM returned empty SQL".to_string();
                        warn!(attempt, question, "empty generation response");
                    } else {
                        info!(attempt, question, sql = %sql, "sql generated");
                        return Ok(sql);
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(attempt, question, error = %last_error, "sql generation attempt failed");
                }
            }
            if attempt < MAX_ATTEMPTS {
                let backoff = BACKOFF_BASE_MS * 2u64.pow(attempt - 1);
                tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
            }
        }

        Err(PipelineError::Generation(format!(
            "sem SQL após {} tentativas: {}",
            MAX_ATTEMPTS, last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::MockLlm;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
    }

    #[test]
    fn system_prompt_carries_schema_rules_and_filters() {
        let persona = AgentPersona::default();
        let filters = FilterContext {
            start_date: NaiveDate::from_ymd_opt(2025, 10, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 10, 31),
            ..Default::default()
        };
        let prompt = build_system_prompt(&persona, &filters, today());

        assert!(prompt.contains(&persona.name));
        assert!(prompt.contains("fieldops.work_orders"));
        assert!(prompt.contains("COUNT(DISTINCT task_id)"));
        assert!(prompt.contains("REGRAS TEMPORAIS"));
        assert!(prompt.contains("'2025-11-01'"));
        assert!(prompt.contains("SOMENTE o SQL"));
    }

    #[test]
    fn system_prompt_without_filters_asks_for_inference() {
        let prompt =
            build_system_prompt(&AgentPersona::default(), &FilterContext::default(), today());
        assert!(prompt.contains("infira o período a partir da pergunta"));
    }

    #[test]
    fn user_content_includes_history_and_capped_context() {
        let history = vec![
            ConversationTurn::user("quantas visitas?"),
            ConversationTurn::assistant("Foram 42."),
        ];
        let long_context = "x".repeat(5000);
        let content =
            build_user_content("e no mês passado?", &history, "Marcos", Some(&long_context));

        assert!(content.starts_with("Pergunta do usuário:\ne no mês passado?"));
        assert!(content.contains("Usuário: quantas visitas?"));
        assert!(content.contains("não use como filtro SQL"));
        assert!(content.len() < 5000);
    }

    #[test]
    fn user_content_without_history_is_just_the_question() {
        let content = build_user_content("quantas OS?", &[], "Marcos", None);
        assert_eq!(content, "Pergunta do usuário:\nquantas OS?");
    }

    #[tokio::test]
    async fn generation_strips_markdown_fencing() {
        let llm = Arc::new(MockLlm::scripted(vec![
            "```sql\nSELECT COUNT(*) FROM fieldops.work_orders\n```",
        ]));
        let generator = SqlGenerator::new(llm);
        let sql = generator
            .generate(
                &AgentPersona::default(),
                "quantas visitas?",
                &FilterContext::default(),
                &[],
                None,
                today(),
            )
            .await
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM fieldops.work_orders");
    }

    #[tokio::test(start_paused = true)]
    async fn generation_retries_then_succeeds() {
        let llm = Arc::new(MockLlm::with_outcomes(vec![
            Err("connection reset".to_string()),
            Err("timeout".to_string()),
            Ok("SELECT 1".to_string()),
        ]));
        let generator = SqlGenerator::new(llm.clone());
        let sql = generator
            .generate(
                &AgentPersona::default(),
                "quantas visitas?",
                &FilterContext::default(),
                &[],
                None,
                today(),
            )
            .await
            .unwrap();
        assert_eq!(sql, "SELECT 1");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn generation_fails_closed_after_exhausting_retries() {
        let llm = Arc::new(MockLlm::with_outcomes(vec![
            Err("down".to_string()),
            Err("down".to_string()),
            Err("down".to_string()),
        ]));
        let generator = SqlGenerator::new(llm.clone());
        let err = generator
            .generate(
                &AgentPersona::default(),
                "quantas visitas?",
                &FilterContext::default(),
                &[],
                None,
                today(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
        assert!(err.to_string().contains("down"));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn generation_runs_at_low_temperature() {
        let llm = Arc::new(MockLlm::scripted(vec!["SELECT 1"]));
        let generator = SqlGenerator::new(llm.clone());
        let _ = generator
            .generate(
                &AgentPersona::default(),
                "quantas visitas?",
                &FilterContext::default(),
                &[],
                None,
                today(),
            )
            .await;
        assert_eq!(llm.temperatures(), vec![GENERATION_TEMPERATURE]);
    }
}
