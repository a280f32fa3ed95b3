/*!
 * Prompt templates for segment enrichment.
 *
 * Both templates end with the segment text on its own line so the service
 * sees the instructions first and the material last.
 */

/// Prompt template with a `{text}` placeholder
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// Headline generation for one segment
    pub const TITLE: &'static str = r#"You are an expert at writing headlines for spoken-word content. I will give you a passage from a transcript; write a title for it.

## Requirements
1. Length: 5-15 characters
2. Style: news headline, concise, carries the core information, avoids vague wording
3. Content: reflects the main topic accurately, stays objective, fits the surrounding context
4. Write the title in the same language as the passage

## Output
- Return ONLY the title on a single line, with no explanation or quotes

Write a title for the following passage:
{text}
"#;

    /// Light-touch proofreading for one segment
    pub const PROOFREAD: &'static str = r#"You are an expert proofreader of spoken-word scripts. I will give you a passage from a transcript; proofread it.

## Core rules
- Never delete or trim any content
- Keep every sentence of the original
- Do not rewrite, paraphrase, summarize or condense

## Allowed changes
1. Punctuation: add punctuation where a phrase is complete, using the punctuation customary for the passage's language
2. Typos: fix clear character-level typos only, keep proper nouns exact

## Warning
- If the character count of your output, excluding punctuation, differs from the input, the task has failed
- Apart from punctuation and typos, do not change anything

Return the complete, unabridged passage on a single line. Proofread the following passage:
{text}
"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    pub fn title() -> Self {
        Self::new(Self::TITLE)
    }

    pub fn proofread() -> Self {
        Self::new(Self::PROOFREAD)
    }

    /// Render the template with the segment text
    pub fn render(&self, text: &str) -> String {
        self.template.replace("{text}", text.trim())
    }
}
