use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use console::style;

use crate::core::agent::FieldAgent;
use crate::core::config::AgentConfig;
use crate::core::executor::PgStore;
use crate::core::history::ConversationTurn;
use crate::core::llm::openai::OpenAiClient;
use crate::core::temporal::FilterContext;
use crate::core::terminal::{print_banner, print_error, print_goodbye, print_info, print_success, print_warn};

const EXIT_WORDS: &[&str] = &["sair", "exit", "quit"];
/// Session-side cap on the conversation window; the core truncates further
/// for prompt size.
const MAX_SESSION_TURNS: usize = 40;

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("chat") => chat().await,
        Some("doctor") => doctor().await,
        Some("help") | Some("--help") | Some("-h") => {
            print_help();
            Ok(())
        }
        Some(other) => {
            print_error(&format!("Comando desconhecido: {}", other));
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    print_banner();
    println!("  {}  inicia o chat interativo (padrão)", style("chat").green());
    println!("  {}  checa banco de dados e LLM", style("doctor").green());
    println!("  {}  mostra esta ajuda", style("help").green());
    println!(
        "\n {} {} <comando>\n",
        style("Uso:").bold(),
        style("fieldlens").green()
    );
}

async fn build_agent() -> Result<FieldAgent> {
    let config = AgentConfig::from_env()?;
    let llm = Arc::new(OpenAiClient::new(
        config.openai_api_key.clone(),
        config.model.clone(),
    ));
    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    Ok(FieldAgent::new(&config, llm, store))
}

async fn chat() -> Result<()> {
    print_banner();
    let agent = build_agent().await?;

    print_info("Exemplos:");
    for example in [
        "Quantas visitas o vendedor Rafael fez em outubro?",
        "Resumo da OS 5078",
        "Pendências abertas por vendedor",
        "Ranking de clientes por visitas este mês",
    ] {
        println!("   • {}", example);
    }
    println!(
        "   Digite {} para auto-diagnóstico, {} para encerrar.\n",
        style("doctor").green(),
        style("sair").green()
    );

    let mut history: Vec<ConversationTurn> = Vec::new();
    let filters = FilterContext::default();
    let stdin = std::io::stdin();

    loop {
        print!("{} ", style("Você:").bold());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }
        if question.eq_ignore_ascii_case("doctor") {
            println!("\n{}\n", agent.integrity_report().await);
            continue;
        }

        let answer = agent
            .answer_question(question, None, &filters, &history)
            .await;
        println!("\n{}\n", answer);

        history.push(ConversationTurn::user(question));
        history.push(ConversationTurn::assistant(answer));
        if history.len() > MAX_SESSION_TURNS {
            let excess = history.len() - MAX_SESSION_TURNS;
            history.drain(..excess);
        }
    }

    print_goodbye();
    Ok(())
}

async fn doctor() -> Result<()> {
    print_banner();
    let agent = match build_agent().await {
        Ok(agent) => agent,
        Err(e) => {
            print_error(&format!("{}", e));
            return Ok(());
        }
    };

    let (store_ok, store_msg) = agent.check_store().await;
    if store_ok {
        print_success(&store_msg);
    } else {
        print_warn(&store_msg);
    }

    let (llm_ok, llm_msg) = agent.check_llm().await;
    if llm_ok {
        print_success(&llm_msg);
    } else {
        print_warn(&llm_msg);
    }

    Ok(())
}
