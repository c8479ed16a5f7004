use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::info;

use crate::core::config::AgentPersona;
use crate::core::error::PipelineError;
use crate::core::executor::QueryResult;
use crate::core::history::{ConversationTurn, format_history};
use crate::core::llm::{ChatMessage, LlmClient};

/// Rows forwarded to the LLM as a preview; the total count travels separately.
const PREVIEW_ROWS: usize = 50;
const INTERPRETATION_TEMPERATURE: f32 = 0.6;

/// Promote numeric column values of a single-row result into a metrics map.
///
/// This is the disambiguation that prevents the most common wrong answer:
/// the row count is a property of the query, the metrics map is the property
/// of the domain. Multi-row results get no metrics map.
pub fn extract_metrics(result: &QueryResult) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();
    if result.rows.len() != 1 {
        return metrics;
    }
    for (name, value) in result.columns.iter().zip(&result.rows[0]) {
        if let Some(n) = value.as_f64() {
            metrics.insert(name.clone(), n);
        }
    }
    metrics
}

/// First `PREVIEW_ROWS` rows as column→value objects.
fn build_preview(result: &QueryResult) -> Vec<Value> {
    result
        .rows
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| {
            let obj: serde_json::Map<String, Value> = result
                .columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect();
            Value::Object(obj)
        })
        .collect()
}

/// Structured result payload handed to the narration prompt.
pub fn structured_result(result: &QueryResult) -> Value {
    json!({
        "colunas": result.columns,
        "total_linhas": result.rows.len(),
        "metricas_numericas": extract_metrics(result),
        "preview_linhas": build_preview(result),
    })
}

/// Narration instructions: persona plus the number rules and the neutral
/// handling of unclassified-objective categories.
pub fn build_interpretation_prompt(persona: &AgentPersona) -> String {
    format!(
        "Você é {}, {} da {}.\n\
         Tom: {}.\n\n\
         REGRAS IMPORTANTES (NÚMEROS):\n\
         - Use SEMPRE os valores de `metricas_numericas` como base para contagens, somas e médias.\n\
         - `total_linhas` é apenas o número de linhas retornadas pela query; NÃO é o total de\n\
           OS, visitas ou clientes.\n\
         - Sem métricas numéricas, descreva o padrão das linhas do preview.\n\
         - Use o histórico apenas para coerência da narrativa, sem inventar números.\n\n\
         TRATAMENTO DE OBJETIVOS / ABORDAGENS:\n\
         - Cada valor distinto de 'objetivo'/'objetivo_legenda' é UM tipo de visita.\n\
         - 'Abordagem sem sucesso' é um tipo específico de visita (tentativa que não evoluiu),\n\
           NÃO um erro de categorização.\n\
         - Objetivo nulo, vazio, 'sem objetivo' ou 'sem objetivo informado': descreva de forma\n\
           neutra como visitas sem objetivo definido. NÃO trate como falha de processo nem como\n\
           problema de qualidade de dados, exceto se a própria pergunta for sobre qualidade dos\n\
           registros ou se a quantidade sem objetivo for claramente alta.\n\n\
         Formate a resposta em:\n\
         1. Resumo direto, com números explícitos.\n\
         2. Principais insights (máx. 5).\n\
         3. Recomendações objetivas (se fizer sentido).\n",
        persona.name, persona.role, persona.company, persona.tone
    )
}

/// LLM-driven translation of a structured result back into narrative text.
pub struct ResultInterpreter {
    llm: Arc<dyn LlmClient>,
}

impl ResultInterpreter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn interpret(
        &self,
        persona: &AgentPersona,
        question: &str,
        sql: &str,
        result: &QueryResult,
        history: &[ConversationTurn],
    ) -> Result<String, PipelineError> {
        let payload = structured_result(result);
        let metrics = extract_metrics(result);

        let mut user_content = format!("Pergunta original do usuário:\n{}\n", question);
        let history_txt = format_history(history, &persona.name);
        if !history_txt.is_empty() {
            user_content.push_str(
                "\nHistórico recente (apenas para coerência da narrativa, não altera números):\n",
            );
            user_content.push_str(&history_txt);
            user_content.push('\n');
        }
        user_content.push_str(&format!("\nSQL executado:\n{}\n", sql));
        user_content.push_str(&format!(
            "\nResultados estruturados (JSON):\n{}\n",
            serde_json::to_string_pretty(&payload).unwrap_or_default()
        ));
        user_content.push_str("\nFaça a análise seguindo as regras.");

        let messages = vec![
            ChatMessage::system(build_interpretation_prompt(persona)),
            ChatMessage::user(user_content),
        ];

        let text = self
            .llm
            .complete(&messages, INTERPRETATION_TEMPERATURE)
            .await
            .map_err(|e| PipelineError::Interpretation(e.to_string()))?;

        info!(
            question,
            rows = result.rows.len(),
            metrics = %json!(metrics),
            "result interpreted"
        );
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_row(columns: &[&str], row: Vec<Value>) -> QueryResult {
        QueryResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: vec![row],
        }
    }

    #[test]
    fn single_row_numeric_columns_become_metrics() {
        let result = single_row(
            &["total_visitas", "vendedor"],
            vec![json!(42), json!("Rafael")],
        );
        let metrics = extract_metrics(&result);
        assert_eq!(metrics.get("total_visitas"), Some(&42.0));
        assert!(!metrics.contains_key("vendedor"));
    }

    #[test]
    fn multi_row_results_produce_no_metrics() {
        let result = QueryResult {
            columns: vec!["total".to_string()],
            rows: vec![vec![json!(1)], vec![json!(2)]],
        };
        assert!(extract_metrics(&result).is_empty());
    }

    #[test]
    fn float_metrics_are_extracted() {
        let result = single_row(&["percentual"], vec![json!(37.5)]);
        assert_eq!(extract_metrics(&result).get("percentual"), Some(&37.5));
    }

    #[test]
    fn null_values_are_not_metrics() {
        let result = single_row(&["objetivo", "total"], vec![Value::Null, json!(4)]);
        let metrics = extract_metrics(&result);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics.get("total"), Some(&4.0));
    }

    #[test]
    fn structured_result_separates_row_count_from_metrics() {
        let result = single_row(&["total_visitas"], vec![json!(42)]);
        let payload = structured_result(&result);
        assert_eq!(payload["total_linhas"], 1);
        assert_eq!(payload["metricas_numericas"]["total_visitas"], 42.0);
    }

    #[test]
    fn preview_is_capped_at_fifty_rows() {
        let result = QueryResult {
            columns: vec!["n".to_string()],
            rows: (0..80).map(|i| vec![json!(i)]).collect(),
        };
        let payload = structured_result(&result);
        assert_eq!(payload["preview_linhas"].as_array().unwrap().len(), 50);
        assert_eq!(payload["total_linhas"], 80);
    }

    #[test]
    fn interpretation_prompt_states_the_number_rules() {
        let prompt = build_interpretation_prompt(&AgentPersona::default());
        assert!(prompt.contains("metricas_numericas"));
        assert!(prompt.contains("total_linhas"));
        assert!(prompt.contains("NÃO é o total"));
    }

    #[test]
    fn interpretation_prompt_keeps_unclassified_objectives_neutral() {
        let prompt = build_interpretation_prompt(&AgentPersona::default());
        assert!(prompt.contains("sem objetivo informado"));
        assert!(prompt.contains("neutra"));
        assert!(prompt.contains("qualidade"));
    }
}
