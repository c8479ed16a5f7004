use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use tracing::{info, warn};

use crate::core::config::{AgentConfig, AgentPersona};
use crate::core::error::PipelineError;
use crate::core::executor::QueryStore;
use crate::core::generator::SqlGenerator;
use crate::core::history::{ConversationTurn, format_history};
use crate::core::intent::{Intent, classify};
use crate::core::interpreter::ResultInterpreter;
use crate::core::llm::{ChatMessage, LlmClient};
use crate::core::temporal::FilterContext;
use crate::core::validator::validate_and_correct;

const CASUAL_TEMPERATURE: f32 = 0.9;

/// The conversational analyst: classifies each utterance, drives the
/// generate → validate → execute → interpret pipeline for data questions and
/// answers small talk directly.
///
/// Every failure path resolves into a short human-readable string: the
/// hosting session renders the return value as the assistant reply, so this
/// boundary never panics and never leaks a raw error type.
pub struct FieldAgent {
    persona: AgentPersona,
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn QueryStore>,
    generator: SqlGenerator,
    interpreter: ResultInterpreter,
}

impl FieldAgent {
    pub fn new(config: &AgentConfig, llm: Arc<dyn LlmClient>, store: Arc<dyn QueryStore>) -> Self {
        Self {
            persona: config.persona.clone(),
            generator: SqlGenerator::new(llm.clone()),
            interpreter: ResultInterpreter::new(llm.clone()),
            llm,
            store,
        }
    }

    /// Single entry point for the hosting session. History is read-only
    /// context here; the caller owns appending the new turns.
    pub async fn answer_question(
        &self,
        question: &str,
        summary_context: Option<&str>,
        filters: &FilterContext,
        history: &[ConversationTurn],
    ) -> String {
        self.answer_question_at(
            question,
            summary_context,
            filters,
            history,
            Utc::now().date_naive(),
        )
        .await
    }

    /// Same as `answer_question` with an explicit request date, so temporal
    /// behavior is deterministic under test.
    pub(crate) async fn answer_question_at(
        &self,
        question: &str,
        summary_context: Option<&str>,
        filters: &FilterContext,
        history: &[ConversationTurn],
        today: NaiveDate,
    ) -> String {
        let intent = classify(question);
        info!(question, ?intent, "question classified");

        match intent {
            Intent::Casual => self.casual_reply(question, history).await,
            Intent::Meta => self.meta_reply(),
            Intent::Data => match self
                .data_answer(question, summary_context, filters, history, today)
                .await
            {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(question, error = %e, "data pipeline short-circuited");
                    user_facing_failure(e)
                }
            },
        }
    }

    /// Generate → validate → execute → interpret. Interpretation failures
    /// are recovered here (the query already ran; the results are still
    /// worth reporting); everything else short-circuits to the caller.
    async fn data_answer(
        &self,
        question: &str,
        summary_context: Option<&str>,
        filters: &FilterContext,
        history: &[ConversationTurn],
        today: NaiveDate,
    ) -> Result<String, PipelineError> {
        let raw_sql = self
            .generator
            .generate(&self.persona, question, filters, history, summary_context, today)
            .await?;

        let validated =
            validate_and_correct(&raw_sql, today).map_err(PipelineError::ValidationRejected)?;
        info!(question, sql = %validated, "sql validated");

        let result = self.store.execute(&validated).await?;

        if result.is_empty() {
            return Ok(format!(
                "Nenhum resultado encontrado.\nQuery executada:\n```sql\n{}\n```",
                validated
            ));
        }

        let narrative = match self
            .interpreter
            .interpret(&self.persona, question, &validated, &result, history)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(question, error = %e, "interpretation failed, falling back");
                format!(
                    "Desculpe, não consegui analisar o resultado agora. \
                     A consulta rodou normalmente e retornou {} linha(s).",
                    result.rows.len()
                )
            }
        };

        Ok(format!(
            "{}\n\n---\n**Query executada:**\n```sql\n{}\n```\n**Linhas retornadas:** {}",
            narrative,
            validated,
            result.rows.len()
        ))
    }

    async fn casual_reply(&self, question: &str, history: &[ConversationTurn]) -> String {
        let system = format!(
            "Você é {}, {} da {}.\n\
             Tom: {}\n\
             Especialidade: {}\n\
             Conversa casual. Não mencione banco de dados ou SQL espontaneamente.\n\
             Use o histórico recente apenas para manter o fio da conversa.\n",
            self.persona.name,
            self.persona.role,
            self.persona.company,
            self.persona.tone,
            self.persona.specialty,
        );

        let history_txt = format_history(history, &self.persona.name);
        let user_content = if history_txt.is_empty() {
            question.to_string()
        } else {
            format!(
                "Histórico recente da conversa:\n{}\n\nMensagem atual do usuário:\n{}",
                history_txt, question
            )
        };

        let messages = vec![ChatMessage::system(system), ChatMessage::user(user_content)];
        match self.llm.complete(&messages, CASUAL_TEMPERATURE).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "casual reply failed");
                "Desculpe, estou indisponível para conversar agora. Tente novamente em instantes."
                    .to_string()
            }
        }
    }

    fn meta_reply(&self) -> String {
        format!(
            "**Olá! Eu sou {}.**\n\
             Papel: {} na {}\n\
             Especialidade: {}\n\
             O que eu faço:\n\
             - Analiso OS's, clientes, vendedores e objetivos de visita\n\
             - Gero e valido SQL (somente leitura) sobre a base de visitas\n\
             - Monto rankings, comparações e resumos de pendências\n\
             Exemplos:\n\
             - Quantas OS por objetivo?\n\
             - Resumo da OS 5078\n\
             - Pendências abertas por vendedor\n\
             - Clientes com mais visitas este mês\n",
            self.persona.name, self.persona.role, self.persona.company, self.persona.specialty,
        )
    }

    /// Store connectivity check for startup/doctor.
    pub async fn check_store(&self) -> (bool, String) {
        match self.store.ping().await {
            Ok(()) => (true, "Banco de dados OK".to_string()),
            Err(e) => (false, format!("Banco de dados indisponível: {}", e)),
        }
    }

    /// LLM connectivity check for startup/doctor.
    pub async fn check_llm(&self) -> (bool, String) {
        let messages = vec![ChatMessage::system("ping"), ChatMessage::user("ping")];
        match self.llm.complete(&messages, 0.0).await {
            Ok(_) => (true, "LLM OK".to_string()),
            Err(e) => (false, format!("LLM indisponível: {}", e)),
        }
    }

    /// Combined integrity report used by the doctor command.
    pub async fn integrity_report(&self) -> String {
        let (store_ok, store_msg) = self.check_store().await;
        let (llm_ok, llm_msg) = self.check_llm().await;
        let today = Utc::now().date_naive();
        format!(
            "store: {} ({})\nllm: {} ({})\nano atual: {}, mês atual: {}",
            if store_ok { "ok" } else { "falha" },
            store_msg,
            if llm_ok { "ok" } else { "falha" },
            llm_msg,
            today.year(),
            today.month(),
        )
    }
}

/// Map a pipeline failure to the string the user sees. Each variant keeps
/// its actionable detail; nothing is reduced to a generic "error".
fn user_facing_failure(error: PipelineError) -> String {
    match error {
        PipelineError::Configuration(msg) => {
            format!("Configuração incompleta: {}. Verifique as credenciais do serviço.", msg)
        }
        PipelineError::Generation(msg) => {
            format!("Não consegui montar uma consulta para essa pergunta ({}). Tente reformular.", msg)
        }
        PipelineError::ValidationRejected(reason) => {
            if reason.contains("genérica") {
                format!("{}\nDica: especifique OS, período ou objetivo.", reason)
            } else {
                reason
            }
        }
        PipelineError::Execution(msg) => format!("Erro ao executar a consulta: {}", msg),
        PipelineError::Interpretation(msg) => {
            format!("Não consegui analisar o resultado ({}).", msg)
        }
    }
}
