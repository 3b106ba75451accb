//! Prompts for claim decomposition

pub const DECOMPOSITION_SYSTEM_PROMPT: &str = r#"You break a text into verifiable claims for fact-checking.

## Rules

1. A claim is one checkable proposition. Split compound sentences. Skip opinions, questions and rhetoric
   unless they presuppose a checkable fact, in which case extract that fact.
2. Group claims into analysis contexts. A new context is warranted only when claims concern a different
   jurisdiction, time window or methodology, so that evidence for one would not decide the other.
   Most texts need one context.
3. ids: claims C1, C2, ...; contexts CTX_1, CTX_2, ...
4. centrality: high for the main thesis, medium for supporting claims, low for background details.
5. depends_on lists claims that must hold for this one to be meaningful.
6. Keep the language of the input text."#;

pub fn build_decomposition_prompt(text: &str, language: Option<&str>) -> String {
    match language {
        Some(lang) => format!("Input language: {}\n\n## Text\n{}\n", lang, text),
        None => format!("## Text\n{}\n", text),
    }
}
