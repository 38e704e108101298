//! Prompt composition.
//!
//! The template embeds the retrieved context and the user query verbatim.
//! There is no bound on context length: a large `top_k` or long chunks can
//! produce a prompt bigger than the model's input window.

/// Fixed instruction template with `{context}` and `{query}` slots.
pub const DEFAULT_TEMPLATE: &str = "\
You are an AI hacking assistant with access to Linux manual pages.
Use the relevant information below to generate command suggestions. If the context below
is not logical or relevant then use what you know to suggest the correct command.

Context:
{context}

User Query: {query}
Provide a valid command based on the retrieved manual information, context, and what you know.
";

/// A prompt template with `{context}` and `{query}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Use a custom template.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Fill the template.
    ///
    /// Placeholders are located in the template before substitution, so
    /// braces inside `context` or `query` are never re-expanded.
    pub fn compose(&self, context: &str, query: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + query.len());
        let mut rest = self.template.as_str();

        loop {
            let next_context = rest.find("{context}");
            let next_query = rest.find("{query}");

            let (pos, len, value) = match (next_context, next_query) {
                (Some(c), Some(q)) if c < q => (c, "{context}".len(), context),
                (Some(c), None) => (c, "{context}".len(), context),
                (_, Some(q)) => (q, "{query}".len(), query),
                (None, None) => break,
            };

            out.push_str(&rest[..pos]);
            out.push_str(value);
            rest = &rest[pos + len..];
        }

        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

/// Compose a prompt with the default template.
pub fn compose_prompt(context: &str, query: &str) -> String {
    PromptTemplate::default().compose(context, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_context_and_query() {
        let context = "ls lists directory contents\ntar creates archives";
        let query = "how do I list hidden files?";
        let prompt = compose_prompt(context, query);

        assert!(prompt.contains(context));
        assert!(prompt.contains(query));
        assert!(prompt.starts_with("You are an AI hacking assistant"));
        assert!(prompt.contains("use what you know"));
    }

    #[test]
    fn test_placeholders_inside_inputs_are_literal() {
        let prompt = compose_prompt("awk '{print $1}' {query}", "find {context} files");
        assert!(prompt.contains("awk '{print $1}' {query}"));
        assert!(prompt.contains("User Query: find {context} files"));
    }

    #[test]
    fn test_large_context_not_truncated() {
        let context = "word ".repeat(50_000);
        let prompt = compose_prompt(&context, "q");
        assert!(prompt.contains(&context));
    }

    #[test]
    fn test_custom_template() {
        let template = PromptTemplate::new("Q={query};C={context};Q={query}");
        assert_eq!(template.compose("c", "q"), "Q=q;C=c;Q=q");
        assert_eq!(PromptTemplate::new("static").compose("c", "q"), "static");
    }
}
