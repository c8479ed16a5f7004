//! Static, versioned description of the tables/views the pipeline may read.
//!
//! The catalog is the single source of truth for three consumers: the
//! generator (schema guidance prompt), the validator (allow-list, invalid
//! column blocklist, distinct-count rewrite) and the doctor output.
//! It must track the backing `fieldops` schema, which is provisioned by the
//! ingestion/migration side and never mutated here.

use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    /// Schema-qualified name as it must appear in SQL.
    pub qualified_name: &'static str,
    /// Column that identifies one visit. `COUNT(DISTINCT <key>)` is the only
    /// correct visit count when `multi_row_per_visit` is true.
    pub grouping_key: &'static str,
    /// True when a single visit produces several rows (answer-level views).
    pub multi_row_per_visit: bool,
    /// Columns the LLM keeps hallucinating on this relation. The validator
    /// rejects any statement that mentions one of them.
    pub known_invalid_columns: &'static [&'static str],
    /// One-line usage contract, surfaced in the generation prompt.
    pub usage_notes: &'static str,
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        qualified_name: "fieldops.work_orders",
        grouping_key: "task_id",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "1 linha = 1 OS/visita; fonte preferida para contar visitas (COUNT(*))",
    },
    CatalogEntry {
        qualified_name: "fieldops.work_orders_all",
        grouping_key: "task_id",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "como work_orders, inclui has_objective",
    },
    CatalogEntry {
        qualified_name: "fieldops.answers",
        grouping_key: "task_id",
        multi_row_per_visit: true,
        known_invalid_columns: &[],
        usage_notes: "1 linha = 1 resposta de formulário; várias linhas por OS",
    },
    CatalogEntry {
        qualified_name: "fieldops.answers_all",
        grouping_key: "task_id",
        multi_row_per_visit: true,
        known_invalid_columns: &[],
        usage_notes: "como answers, sem filtro de formulários ativos",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_visit_answers",
        grouping_key: "task_id",
        multi_row_per_visit: true,
        known_invalid_columns: &[],
        usage_notes: "leitura de conteúdo de formulários (segmento, área visitada, sintomas); \
                      contagem de visitas SEMPRE com COUNT(DISTINCT task_id)",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_visit_status",
        grouping_key: "task_id",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "1 linha = 1 OS com objetivo, status, vendedor e poi",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_pending_items",
        grouping_key: "task_id",
        multi_row_per_visit: false,
        known_invalid_columns: &["pending_created_at", "pending_description"],
        usage_notes: "pendências; período SEMPRE por os_created_at (não existe data própria da pendência)",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_seller_summary",
        grouping_key: "assignee_name",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "resumo por vendedor (visitas, objetivos)",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_customer_summary",
        grouping_key: "poi",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "resumo por cliente (qtd visitas, últimos contatos)",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_activity_timeline",
        grouping_key: "task_id",
        multi_row_per_visit: true,
        known_invalid_columns: &[],
        usage_notes: "linha do tempo de ações por OS/cliente",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_pending_by_seller",
        grouping_key: "assignee_name",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "resumo de pendências por vendedor",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_pending_by_customer",
        grouping_key: "poi",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "resumo de pendências por cliente",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_customer_portfolio",
        grouping_key: "poi",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "portfólio de marcas em uso por cliente",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_prospecting",
        grouping_key: "task_id",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "OS com objetivo de prospecção",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_relationship",
        grouping_key: "task_id",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "OS com objetivo de relacionamento",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_needs_survey",
        grouping_key: "task_id",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "OS de levantamento de necessidade",
    },
    CatalogEntry {
        qualified_name: "fieldops.vw_technical_visit",
        grouping_key: "task_id",
        multi_row_per_visit: false,
        known_invalid_columns: &[],
        usage_notes: "OS de visita técnica",
    },
];

pub fn is_allowed(qualified_name: &str) -> bool {
    CATALOG.iter().any(|e| e.qualified_name == qualified_name)
}

#[allow(dead_code)]
pub fn entry(qualified_name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.qualified_name == qualified_name)
}

/// All views where one visit spans several rows, paired with their key.
pub fn multi_row_views() -> impl Iterator<Item = &'static CatalogEntry> {
    CATALOG.iter().filter(|e| e.multi_row_per_visit)
}

/// Every (relation, column) pair known not to exist.
pub fn invalid_columns() -> impl Iterator<Item = (&'static str, &'static str)> {
    CATALOG.iter().flat_map(|e| {
        e.known_invalid_columns
            .iter()
            .map(move |c| (e.qualified_name, *c))
    })
}

/// The schema/rules document injected into the generation prompt.
///
/// The worked examples are the point: the schema alone does not resolve
/// which relation is "the" source of truth for a metric, so canonical
/// question → SQL mappings are spelled out for the model.
pub fn schema_guidance(today: NaiveDate) -> String {
    let year = today.year();
    let month = today.month();

    let mut doc = String::new();
    doc.push_str(&format!(
        "# SCHEMA FIELDOPS\n\n\
         ## CONTEXTO TEMPORAL\n\
         Ano atual: {year}\n\
         Mês atual: {month}\n\
         Regras:\n\
         - \"este mês\": primeiro dia de {year}-{month:02} até o primeiro dia do mês seguinte\n\
         - \"mês passado\": o mês-calendário imediatamente anterior\n\
         - mês citado sem ano: assuma o ano {year}\n\
         - Nunca use anos anteriores a {} em consulta nova, a menos que o usuário peça explicitamente\n\n",
        year - 1
    ));

    doc.push_str(
        "## TABELAS PRINCIPAIS (1 linha = 1 OS)\n\
         fieldops.work_orders(os_number, task_id, assignee_name, poi, status, created_at, finished_at, updated_at)\n\
         fieldops.work_orders_all(... inclui has_objective ...)\n\n\
         ## TABELAS DE RESPOSTAS (várias linhas por OS)\n\
         fieldops.answers(task_id, form_title, question_title, answer_human, answer_raw, created_at)\n\
         fieldops.answers_all(...)\n\n\
         ## VIEWS\n",
    );
    for e in CATALOG {
        doc.push_str(&format!("- {}: {}\n", e.qualified_name, e.usage_notes));
    }

    doc.push_str(
        "\n## REGRAS CRÍTICAS PARA VISITAS / OS\n\
         1. \"quantas visitas/OS/formulários\" por vendedor/cliente/período →\n\
            PRIORIZE fieldops.work_orders (1 linha = 1 OS):\n\
            SELECT COUNT(*) AS total_visitas\n\
            FROM fieldops.work_orders o\n\
            WHERE o.assignee_name ILIKE '%Rafael%'\n\
              AND o.created_at >= '2025-10-01'\n\
              AND o.created_at <  '2025-11-01';\n\
         2. Se contar visitas em fieldops.vw_visit_answers, NUNCA COUNT(*):\n\
            use SEMPRE COUNT(DISTINCT task_id); 1 task_id = 1 OS.\n\
         3. Resumo/detalhes de uma OS específica → vw_visit_answers.\n\
         4. Pendências → vw_pending_items ou seus resumos; período SEMPRE por os_created_at.\n\
            As colunas pending_created_at e pending_description NÃO existem.\n\
         5. Objetivo/tipo de visita → coluna objetivo em vw_visit_status,\n\
            ou question_title ILIKE '%objetivo da visita%' em vw_visit_answers.\n\
         6. SEMPRE inclua LIMIT (<= 1000).\n\
         7. Busca textual → ILIKE '%termo%'.\n\
         8. Nunca invente tabela ou coluna fora desta lista.\n\n\
         ## EXEMPLOS CANÔNICOS\n\
         Resumo de OS:\n\
         SELECT question_title, answer_human, assignee_name, status, poi, os_created_at\n\
         FROM fieldops.vw_visit_answers\n\
         WHERE os_number = '5078'\n\
         ORDER BY question_title\n\
         LIMIT 100;\n\n\
         Pendências por vendedor no período:\n\
         SELECT assignee_name, COUNT(*) AS total_pendencias\n\
         FROM fieldops.vw_pending_items\n\
         WHERE generated_pending = true\n\
           AND os_created_at >= '2025-10-01'\n\
           AND os_created_at <  '2025-11-01'\n\
         GROUP BY assignee_name\n\
         ORDER BY total_pendencias DESC\n\
         LIMIT 100;\n\n\
         Visitas por objetivo no período:\n\
         SELECT\n\
           CASE\n\
             WHEN status ILIKE '%abordagem sem sucesso%' THEN 'Abordagem sem sucesso'\n\
             WHEN objetivo IS NULL OR TRIM(objetivo) = '' THEN 'Sem objetivo informado'\n\
             ELSE objetivo\n\
           END AS objetivo_legenda,\n\
           COUNT(*) AS total\n\
         FROM fieldops.vw_visit_status\n\
         WHERE created_at >= '2025-10-01'\n\
           AND created_at <  '2025-11-01'\n\
         GROUP BY 1\n\
         ORDER BY total DESC\n\
         LIMIT 100;\n\n\
         Motivos de abordagem sem sucesso:\n\
         SELECT LOWER(TRIM(answer_human)) AS motivo, COUNT(DISTINCT task_id) AS total\n\
         FROM fieldops.vw_visit_answers\n\
         WHERE LOWER(form_title) = 'abordagem sem sucesso'\n\
           AND question_title ILIKE 'Situação Encontrada%'\n\
           AND os_created_at >= '2025-10-01'\n\
           AND os_created_at <  '2025-11-01'\n\
         GROUP BY 1\n\
         ORDER BY total DESC\n\
         LIMIT 100;\n\n\
         Visitas por segmento (conteúdo de formulário):\n\
         SELECT COUNT(DISTINCT task_id) AS total_visitas\n\
         FROM fieldops.vw_visit_answers\n\
         WHERE question_title ILIKE '%segmento do cliente%'\n\
           AND answer_human ILIKE '%industrial%'\n\
           AND os_created_at >= '2025-10-01'\n\
           AND os_created_at <  '2025-11-01'\n\
         LIMIT 100;\n\n\
         Comparação de visitas entre vendedores:\n\
         SELECT assignee_name, COUNT(*) AS total_visitas\n\
         FROM fieldops.work_orders\n\
         WHERE created_at >= '2025-10-01'\n\
           AND created_at <  '2025-11-01'\n\
         GROUP BY assignee_name\n\
         ORDER BY total_visitas DESC\n\
         LIMIT 100;\n\n\
         Clientes sem visita nos últimos 30 dias:\n\
         WITH visited AS (\n\
           SELECT DISTINCT poi FROM fieldops.work_orders\n\
           WHERE created_at >= (CURRENT_DATE - INTERVAL '30 days')\n\
         ),\n\
         all_customers AS (\n\
           SELECT DISTINCT poi FROM fieldops.work_orders\n\
         )\n\
         SELECT COUNT(*) AS clientes_sem_visita\n\
         FROM all_customers c\n\
         LEFT JOIN visited v ON c.poi = v.poi\n\
         WHERE v.poi IS NULL\n\
         LIMIT 100;\n",
    );

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_membership() {
        assert!(is_allowed("fieldops.work_orders"));
        assert!(is_allowed("fieldops.vw_visit_answers"));
        assert!(!is_allowed("fieldops.secret_table"));
        assert!(!is_allowed("public.work_orders"));
    }

    #[test]
    fn every_entry_is_schema_qualified() {
        for e in CATALOG {
            assert!(
                e.qualified_name.starts_with("fieldops."),
                "{} is not qualified",
                e.qualified_name
            );
        }
    }

    #[test]
    fn answers_views_are_multi_row() {
        let answers = entry("fieldops.vw_visit_answers").unwrap();
        assert!(answers.multi_row_per_visit);
        assert_eq!(answers.grouping_key, "task_id");

        let orders = entry("fieldops.work_orders").unwrap();
        assert!(!orders.multi_row_per_visit);
    }

    #[test]
    fn pending_view_blocklists_hallucinated_columns() {
        let cols: Vec<_> = invalid_columns().collect();
        assert!(cols.contains(&("fieldops.vw_pending_items", "pending_created_at")));
        assert!(cols.contains(&("fieldops.vw_pending_items", "pending_description")));
    }

    #[test]
    fn guidance_carries_temporal_context_and_rules() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        let doc = schema_guidance(today);
        assert!(doc.contains("Ano atual: 2025"));
        assert!(doc.contains("Mês atual: 10"));
        assert!(doc.contains("COUNT(DISTINCT task_id)"));
        assert!(doc.contains("fieldops.work_orders"));
        assert!(doc.contains("LIMIT"));
    }

    #[test]
    fn guidance_lists_every_catalog_entry() {
        let doc = schema_guidance(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        for e in CATALOG {
            assert!(doc.contains(e.qualified_name), "missing {}", e.qualified_name);
        }
    }
}
