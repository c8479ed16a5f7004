//! Cheap, rule-based gate in front of the SQL pipeline: classifies an
//! utterance before any LLM call is spent on it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Greeting/farewell/thanks small talk.
    Casual,
    /// Question about the assistant itself ("quem é você?").
    Meta,
    /// Anything that should go through the SQL pipeline.
    Data,
}

/// Matched by exact string or prefix. Checked FIRST: short greetings would
/// otherwise hit analytics-adjacent substrings in the data list.
const CASUAL_WORDS: &[&str] = &[
    "oi",
    "olá",
    "ola",
    "hey",
    "hi",
    "hello",
    "bom dia",
    "boa tarde",
    "boa noite",
    "tudo bem",
    "como vai",
    "como está",
    "beleza",
    "e aí",
    "eai",
    "obrigado",
    "obrigada",
    "valeu",
    "vlw",
    "brigado",
    "tchau",
    "até logo",
    "até mais",
    "falou",
    "flw",
    "legal",
    "bacana",
    "show",
    "massa",
];

/// Matched by substring, after the casual check.
const META_PHRASES: &[&str] = &[
    "quem é você",
    "quem você é",
    "quem voce é",
    "quem voce e",
    "o que você faz",
    "o que voce faz",
    "para que serve",
    "sua função",
    "se apresente",
    "seu papel",
    "sua especialidade",
    "qual é seu nome",
    "qual e seu nome",
    "o que você consegue fazer",
    "como você funciona",
    "que tipo de pergunta",
];

/// Analytics vocabulary, matched by substring. The default is Data anyway;
/// the list exists so the classifier reads as a positive decision in logs.
const DATA_KEYWORDS: &[&str] = &[
    "quantas",
    "quantos",
    "quanto",
    "total",
    "soma",
    "média",
    "media",
    "mostre",
    "liste",
    "exiba",
    "busque",
    "encontre",
    "procure",
    "visita",
    "cliente",
    "vendedor",
    "técnico",
    "tecnico",
    "poi",
    "objetivo",
    "prospecção",
    "prospeccao",
    "relacionamento",
    "levantamento",
    "ranking",
    "último",
    "ultima",
    "mês",
    "mes",
    "ano",
    "período",
    "periodo",
    "status",
    "concluída",
    "concluida",
    "pendente",
    "pendência",
    "pendencia",
    "comparar",
    "comparação",
    "resumo",
    "detalhes",
    "sobre",
];

/// Pure function over the word lists. Casual runs before meta before data;
/// no match at all falls open to Data so the pipeline gets a chance rather
/// than the user getting a refusal.
pub fn classify(utterance: &str) -> Intent {
    let lower = utterance.trim().to_lowercase();

    if CASUAL_WORDS
        .iter()
        .any(|w| lower == *w || lower.starts_with(w))
    {
        return Intent::Casual;
    }
    if META_PHRASES.iter().any(|p| lower.contains(p)) {
        return Intent::Meta;
    }
    if DATA_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Intent::Data;
    }
    Intent::Data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_casual_word_classifies_as_casual() {
        for word in CASUAL_WORDS {
            assert_eq!(classify(word), Intent::Casual, "word: {}", word);
        }
    }

    #[test]
    fn casual_prefix_matches() {
        assert_eq!(classify("oi, tudo certo?"), Intent::Casual);
        assert_eq!(classify("Bom dia!"), Intent::Casual);
        assert_eq!(classify("  OBRIGADO  "), Intent::Casual);
    }

    #[test]
    fn casual_check_runs_before_the_data_check() {
        // Contains "quantas" and "visita", but the greeting prefix decides.
        assert_eq!(classify("oi quantas visitas temos?"), Intent::Casual);
    }

    #[test]
    fn meta_questions_are_detected() {
        assert_eq!(classify("quem é você afinal?"), Intent::Meta);
        assert_eq!(classify("me diga o que você faz"), Intent::Meta);
        assert_eq!(classify("para que serve esse chat?"), Intent::Meta);
    }

    #[test]
    fn data_questions_are_detected() {
        assert_eq!(
            classify("Quantas visitas o vendedor Rafael fez em outubro?"),
            Intent::Data
        );
        assert_eq!(classify("ranking de vendedores"), Intent::Data);
        assert_eq!(classify("resumo da OS 5078"), Intent::Data);
    }

    #[test]
    fn unknown_utterances_fail_open_to_data() {
        assert_eq!(classify("xyzzy plugh"), Intent::Data);
        assert_eq!(classify(""), Intent::Data);
    }
}
