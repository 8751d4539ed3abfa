//! Prompt construction for the translation providers.

use super::glossary::GlossaryEntry;

const PREAMBLE: &str = "Você é um tradutor especializado em Pathfinder 2nd Edition Remaster (PF2e).

CONTEXTO:
- Pathfinder 2e é um RPG de mesa da Paizo
- Use a terminologia oficial em português quando existir
- Mantenha termos técnicos de jogo em inglês quando não houver tradução consagrada (ex: \"Hit Points\", \"AC\", \"DC\")
- Traduza de forma natural e fluida para português brasileiro";

const INSTRUCTIONS: &str = "INSTRUÇÕES:
- Traduza APENAS o texto, sem explicações adicionais
- Mantenha a formatação original
- Seja conciso e direto
- Não adicione informações que não estão no original";

/// Full prompt: context, matched glossary terms, item type, source text.
pub fn build_prompt(text: &str, item_type: &str, glossary: &[GlossaryEntry]) -> String {
    let mut prompt = String::with_capacity(PREAMBLE.len() + INSTRUCTIONS.len() + text.len() + 256);
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\n");

    if !glossary.is_empty() {
        prompt.push_str("TERMOS DO PF2e:\n");
        for entry in glossary {
            prompt.push_str(&format!("- \"{}\" = \"{}\"\n", entry.source, entry.target));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("TIPO DE ITEM: {item_type}\n\n"));
    prompt.push_str(&format!("TEXTO PARA TRADUZIR:\n{text}\n\n"));
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nTRADUÇÃO:");
    prompt
}
