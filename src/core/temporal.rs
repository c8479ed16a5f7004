use chrono::{Datelike, NaiveDate};

/// Ambient dashboard state forwarded by the hosting UI. All fields optional;
/// the guidance block tells the generator how (and when NOT) to apply them.
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub assignee_selection: Option<String>,
    pub account_selection: Option<String>,
    pub visit_type_selection: Option<String>,
}

impl FilterContext {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.assignee_selection.is_none()
            && self.account_selection.is_none()
            && self.visit_type_selection.is_none()
    }
}

/// Parse the dashboard's dd/mm/yyyy date format. Seam for the (external)
/// dashboard collaborator that produces the filter context.
#[allow(dead_code)]
pub fn parse_dashboard_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%d/%m/%Y").ok()
}

/// First day of the month following `date`.
fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(date)
}

/// Fixed relative-date normalization rules, resolved against the request
/// date. Injected into every generation prompt alongside the schema doc.
pub fn temporal_rules(today: NaiveDate) -> String {
    let year = today.year();
    let month = today.month();
    let this_month_start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today);
    let next_month_start = first_of_next_month(this_month_start);

    format!(
        "REGRAS TEMPORAIS GERAIS:\n\
         - \"este mês\": intervalo [{}, {})\n\
         - \"mês passado\": o mês-calendário imediatamente anterior ao atual\n\
         - \"mês de N\" ou mês citado sem ano: usar intervalo [{}-N-01, primeiro dia do mês seguinte) no ano {}\n\
         - Não use anos fora de [{}, {}] a menos que o usuário os escreva explicitamente\n",
        this_month_start,
        next_month_start,
        year,
        year,
        year - 1,
        year
    )
}

/// Build the dashboard-filter block for the generation prompt.
///
/// The period priority rule is deliberately delegated to the LLM as an
/// instruction: explicit date/period language in the question always wins;
/// the ambient range applies only when the question says nothing about time.
pub fn build_filter_guidance(filters: &FilterContext) -> String {
    if filters.is_empty() {
        return "Não há período padrão vindo do dashboard.\n\
                - Sempre infira o período a partir da pergunta do usuário.\n"
            .to_string();
    }

    let assignees = filters
        .assignee_selection
        .as_deref()
        .unwrap_or("Todos");
    let accounts = filters.account_selection.as_deref().unwrap_or("Todas");
    let visit_type = filters
        .visit_type_selection
        .as_deref()
        .unwrap_or("Visão Geral");

    match (filters.start_date, filters.end_date) {
        (Some(start), Some(end)) => {
            // Inclusive start, exclusive end-plus-one-day, so timestamp
            // columns are covered through the whole final day.
            let end_exclusive = end.succ_opt().unwrap_or(end);
            format!(
                "CONTEXTO DE FILTROS DO DASHBOARD (padrão quando o usuário NÃO especificar período):\n\
                 - Período padrão: de '{start}' (inclusive) até '{end_exclusive}' (exclusivo).\n\
                   Quando a pergunta NÃO mencionar período, aplique:\n\
                     • fieldops.work_orders: created_at >= '{start}' AND created_at < '{end_exclusive}'\n\
                     • views com os_created_at: os_created_at >= '{start}' AND os_created_at < '{end_exclusive}'\n\
                 - Vendedores selecionados: {assignees}\n\
                 - Empresas selecionadas: {accounts}\n\
                 - Tipo de visita selecionado: {visit_type}\n\
                 REGRAS DE PRIORIDADE DE PERÍODO:\n\
                 1. Se a pergunta DO USUÁRIO contém datas, meses, anos ou expressões como\n\
                    'mês passado', 'este mês', 'últimos 30 dias': use APENAS o período da\n\
                    pergunta e IGNORE o período padrão do dashboard.\n\
                 2. Se a pergunta NÃO menciona período: aplique OBRIGATORIAMENTE o período\n\
                    padrão acima nos campos de data.\n"
            )
        }
        _ => "Filtros do dashboard sem datas válidas.\n\
              - Infira o período apenas a partir da pergunta ou das regras temporais gerais.\n"
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn dashboard_date_format_parses() {
        assert_eq!(parse_dashboard_date("01/10/2025"), Some(d(2025, 10, 1)));
        assert_eq!(parse_dashboard_date(" 31/10/2025 "), Some(d(2025, 10, 31)));
        assert_eq!(parse_dashboard_date("2025-10-01"), None);
    }

    #[test]
    fn empty_filters_instruct_inference_from_question() {
        let out = build_filter_guidance(&FilterContext::default());
        assert!(out.contains("infira o período a partir da pergunta"));
        assert!(!out.contains("Período padrão"));
    }

    #[test]
    fn date_range_becomes_inclusive_exclusive_plus_one_day() {
        let filters = FilterContext {
            start_date: Some(d(2025, 10, 1)),
            end_date: Some(d(2025, 10, 31)),
            ..Default::default()
        };
        let out = build_filter_guidance(&filters);
        assert!(out.contains("'2025-10-01'"));
        assert!(out.contains("'2025-11-01'"));
        assert!(out.contains("exclusivo"));
    }

    #[test]
    fn explicit_question_language_overrides_ambient_range() {
        let filters = FilterContext {
            start_date: Some(d(2025, 10, 1)),
            end_date: Some(d(2025, 10, 31)),
            ..Default::default()
        };
        let out = build_filter_guidance(&filters);
        assert!(out.contains("IGNORE o período padrão"));
        assert!(out.contains("OBRIGATORIAMENTE"));
    }

    #[test]
    fn partial_dates_fall_back_to_question_inference() {
        let filters = FilterContext {
            start_date: Some(d(2025, 10, 1)),
            end_date: None,
            assignee_selection: Some("Rafael".to_string()),
            ..Default::default()
        };
        let out = build_filter_guidance(&filters);
        assert!(out.contains("sem datas válidas"));
    }

    #[test]
    fn selections_are_echoed_into_the_block() {
        let filters = FilterContext {
            start_date: Some(d(2025, 10, 1)),
            end_date: Some(d(2025, 10, 31)),
            assignee_selection: Some("Rafael".to_string()),
            account_selection: Some("Metalúrgica Sul".to_string()),
            visit_type_selection: Some("Prospecção".to_string()),
        };
        let out = build_filter_guidance(&filters);
        assert!(out.contains("Rafael"));
        assert!(out.contains("Metalúrgica Sul"));
        assert!(out.contains("Prospecção"));
    }

    #[test]
    fn temporal_rules_resolve_this_month_bounds() {
        let rules = temporal_rules(d(2025, 10, 15));
        assert!(rules.contains("[2025-10-01, 2025-11-01)"));
        assert!(rules.contains("[2024, 2025]"));
    }

    #[test]
    fn temporal_rules_wrap_december_into_january() {
        let rules = temporal_rules(d(2025, 12, 3));
        assert!(rules.contains("[2025-12-01, 2026-01-01)"));
    }
}
