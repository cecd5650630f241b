use codescope_core::domain::analysis::{AnalysisType, CategoryBreakdown, Finding, SeverityBreakdown};

pub const REVIEWER_SYSTEM_PROMPT: &str = "You are a meticulous senior software engineer performing static code review. You only report issues you can point to in the code you were given, and you always answer in the exact format requested.";

pub const SECURITY_INSTRUCTIONS: &str = r#"Perform a security review of the following source files.
Look for injection flaws (SQL, command, template), broken authentication or authorization checks,
hardcoded secrets and credentials, insecure cryptography, unsafe deserialization, path traversal,
server-side request forgery, and sensitive data written to logs.
Use category "security" for these issues."#;

pub const DEAD_CODE_INSTRUCTIONS: &str = r#"Look for dead code in the following source files.
Report unused functions, classes, exports and variables, unreachable branches, commented-out code
blocks, and feature flags that are always on or always off.
Use category "dead_code" for these issues."#;

pub const DEPENDENCY_INSTRUCTIONS: &str = r#"Review how the following source files use third-party dependencies.
Report deprecated or abandoned libraries, APIs known to be vulnerable, duplicated libraries that
serve the same purpose, and version pins that look outdated.
Use category "dependency" for these issues."#;

pub const ARCHITECTURE_INSTRUCTIONS: &str = r#"Review the architecture of the following source files.
Report layering violations, circular dependencies, god objects, tight coupling between modules,
leaky abstractions, and duplicated logic that should be consolidated.
Use category "architecture" or "consolidation" for these issues."#;

pub const COMPREHENSIVE_INSTRUCTIONS: &str = r#"Perform a comprehensive review of the following source files.
Report security vulnerabilities, technical debt, dead code, dependency problems, architectural
issues, performance problems, maintainability concerns, and compliance risks."#;

pub const OUTPUT_CONTRACT: &str = r#"Return ONLY a JSON array, with no other text, where each element has these fields:
- "title": short name of the issue
- "description": what is wrong and why it matters
- "severity": one of "critical", "high", "medium", "low", "info"
- "category": one of "security", "technical_debt", "dead_code", "dependency", "architecture", "performance", "maintainability", "consolidation", "compliance"
- "filePath": path of the file exactly as given above
- "lineStart": first line of the issue (number)
- "lineEnd": last line of the issue (number)
- "suggestedFix": how to fix it
If there are no issues, return []."#;

pub const FILE_EXCERPT_TEMPLATE: &str = r#"### File: {path} ({language})
```
{content}
```
"#;

pub const SUMMARY_PROMPT: &str = r#"You are summarising the results of an automated code review for engineering leadership.

Total findings: {total}
Findings by severity: {severity_counts}
Findings by category: {category_counts}

Most severe findings:
{top_findings}

Return ONLY a JSON object with this structure:
{
    "overview": "Two or three sentences on the overall health of the code.",
    "keyFindings": ["at most 5 short bullet points"],
    "recommendations": ["at most 5 concrete next steps"],
    "estimatedEffort": "rough remediation effort, e.g. \"3-5 days\""
}
"#;

/// One file as it appears inside a batch prompt
#[derive(Debug, Clone)]
pub struct FileExcerpt<'a> {
    pub path: &'a str,
    pub language: &'a str,
    pub content: &'a str,
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Instruction block for an analysis focus
    pub fn instructions_for(analysis_type: AnalysisType) -> &'static str {
        match analysis_type {
            AnalysisType::Security => SECURITY_INSTRUCTIONS,
            AnalysisType::DeadCode => DEAD_CODE_INSTRUCTIONS,
            AnalysisType::Dependencies => DEPENDENCY_INSTRUCTIONS,
            AnalysisType::Architecture => ARCHITECTURE_INSTRUCTIONS,
            AnalysisType::Full | AnalysisType::Incremental => COMPREHENSIVE_INSTRUCTIONS,
        }
    }

    pub fn build_batch_prompt(analysis_type: AnalysisType, files: &[FileExcerpt<'_>]) -> String {
        let mut prompt = String::from(Self::instructions_for(analysis_type));
        prompt.push_str("\n\n");

        for file in files {
            prompt.push_str(
                &FILE_EXCERPT_TEMPLATE
                    .replace("{path}", file.path)
                    .replace("{language}", file.language)
                    .replace("{content}", file.content),
            );
            prompt.push('\n');
        }

        prompt.push_str(OUTPUT_CONTRACT);
        prompt
    }

    pub fn build_summary_prompt(
        total: usize,
        by_severity: &SeverityBreakdown,
        by_category: &CategoryBreakdown,
        top_findings: &[&Finding],
    ) -> String {
        let top = if top_findings.is_empty() {
            "(none)".to_string()
        } else {
            top_findings
                .iter()
                .map(|f| {
                    format!(
                        "- [{}] [{}] {} ({})",
                        f.severity, f.category, f.title, f.file_path
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        SUMMARY_PROMPT
            .replace("{total}", &total.to_string())
            .replace(
                "{severity_counts}",
                &serde_json::to_string(by_severity).unwrap_or_default(),
            )
            .replace(
                "{category_counts}",
                &serde_json::to_string(by_category).unwrap_or_default(),
            )
            .replace("{top_findings}", &top)
    }
}
