/// Builds review prompts. The instructions and project structure are fixed
/// for a run; only the file content changes between requests.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    languages: String,
    output_language: String,
    project_structure: String,
}

impl PromptBuilder {
    pub fn new(program_languages: &[String], output_language: &str, project_structure: String) -> Self {
        Self {
            languages: program_languages.join(", "),
            output_language: output_language.to_string(),
            project_structure,
        }
    }

    /// Prompt for a file that fits in a single request.
    pub fn build_prompt(&self, file_path: &str, before: &str, after: &str) -> String {
        format!(
            "{intro}\n\n{structure}File being reviewed: {file_path}\n\n{code}\n\n{instructions}",
            intro = self.intro(),
            structure = self.structure_section(),
            code = self.code_section(before, after),
            instructions = self.instructions(),
        )
    }

    /// Prompt for one slice of a file too large for a single request.
    /// `part` is 1-based.
    pub fn build_chunk_prompt(
        &self,
        file_path: &str,
        before: &str,
        after: &str,
        part: usize,
        total: usize,
    ) -> String {
        format!(
            "{intro}\n\n{structure}File being reviewed: {file_path} (part {part} of {total})\n\
             The file is too large for one request, so it is reviewed in {total} consecutive parts. \
             Review only this part; other parts are sent separately.\n\n{code}\n\n{instructions}",
            intro = self.intro(),
            structure = self.structure_section(),
            code = self.code_section(before, after),
            instructions = self.instructions(),
        )
    }

    fn intro(&self) -> String {
        format!(
            "You are an AI Code Review Assistant and an expert in {langs}. \
             You are a senior {langs} developer. Please review the following code changes and provide feedback.",
            langs = self.languages
        )
    }

    fn structure_section(&self) -> String {
        if self.project_structure.is_empty() {
            String::new()
        } else {
            format!("Project Structure:\n{}\n\n", self.project_structure)
        }
    }

    fn code_section(&self, before: &str, after: &str) -> String {
        let fence = self.languages.split(',').next().unwrap_or_default().trim().to_lowercase();
        format!(
            "Code before changes:\n```{fence}\n{before}\n```\n\nCode after changes:\n```{fence}\n{after}\n```"
        )
    }

    fn instructions(&self) -> String {
        format!(
            r#"Please provide a detailed review, considering the following aspects:
1. Code quality and readability
2. Potential bugs or errors
3. Performance implications
4. Consistency with the overall project structure
5. Suggestions for improvement
6. Best practices and style conventions specific to {langs}

Please provide your review in {output}.

Your review:"#,
            langs = self.languages,
            output = self.output_language
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(structure: &str) -> PromptBuilder {
        PromptBuilder::new(
            &["Python".to_string(), "JavaScript".to_string()],
            "French",
            structure.to_string(),
        )
    }

    #[test]
    fn prompt_embeds_languages_and_code() {
        let prompt = builder("").build_prompt("test_file.py", "old code", "new code");

        assert!(prompt.contains("expert in Python, JavaScript"));
        assert!(prompt.contains("File being reviewed: test_file.py"));
        assert!(prompt.contains("```python\nold code\n```"));
        assert!(prompt.contains("```python\nnew code\n```"));
        assert!(prompt.contains("Please provide your review in French."));
        assert!(!prompt.contains("Project Structure:"));
    }

    #[test]
    fn unknown_language_is_passed_through() {
        let prompt = PromptBuilder::new(&["Unsupported".to_string()], "English", String::new())
            .build_prompt("test_file.txt", "old code", "new code");
        assert!(prompt.contains("Unsupported"));
    }

    #[test]
    fn structure_section_is_included_when_present() {
        let prompt = builder("[DIR] src\n[FILE] main.py").build_prompt("a.py", "x=1", "x=2");
        assert!(prompt.contains("Project Structure:\n[DIR] src\n[FILE] main.py"));
    }

    #[test]
    fn chunk_prompt_names_its_part() {
        let prompt = builder("").build_chunk_prompt("big.py", "a", "b", 2, 3);
        assert!(prompt.contains("File being reviewed: big.py (part 2 of 3)"));
        assert!(prompt.contains("Your review:"));
    }
}
