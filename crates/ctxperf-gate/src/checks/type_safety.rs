use async_trait::async_trait;

use super::{scan, LineRule};
use crate::check::{CheckCategory, CheckOutcome, CheckSpec, QualityCheck, Severity};
use crate::context::ChangeContext;
use crate::error::GateResult;

/// Flags escape hatches from the type system in changed code.
#[derive(Debug)]
pub struct TypeSafetyCheck {
    spec: CheckSpec,
    rules: Vec<LineRule>,
}

impl TypeSafetyCheck {
    pub const ID: &'static str = "type-safety";

    pub fn new() -> GateResult<Self> {
        let rules = vec![
            LineRule::new(
                r"\bunsafe\s*\{",
                Severity::High,
                "unsafe block",
                "use a safe abstraction or document the invariants that make it sound",
                &["rs"],
            )?,
            LineRule::new(
                r"\btransmute\b",
                Severity::High,
                "mem::transmute bypasses type checking",
                "use From/TryFrom or a byte-level conversion",
                &["rs"],
            )?,
            LineRule::new(
                r"\.unwrap\(\)",
                Severity::Medium,
                "unwrap() panics on error",
                "propagate the error with `?`",
                &["rs"],
            )?,
            LineRule::new(
                r"\.expect\(",
                Severity::Low,
                "expect() panics on error",
                "propagate the error with `?` unless the invariant is guaranteed",
                &["rs"],
            )?,
            LineRule::new(
                r":\s*any\b|\bas any\b|<any>",
                Severity::Medium,
                "`any` disables type checking",
                "use a concrete type or `unknown`",
                &["ts", "tsx"],
            )?,
        ];
        Ok(Self {
            spec: CheckSpec::new(Self::ID, "Type safety", CheckCategory::TypeSafety, Severity::High),
            rules,
        })
    }
}

#[async_trait]
impl QualityCheck for TypeSafetyCheck {
    fn spec(&self) -> &CheckSpec {
        &self.spec
    }

    async fn run(&self, context: &ChangeContext) -> anyhow::Result<CheckOutcome> {
        Ok(CheckOutcome::from_findings(scan(Self::ID, &self.rules, context), 0.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ChangedFile;

    #[tokio::test]
    async fn test_flags_escape_hatches() {
        let check = TypeSafetyCheck::new().unwrap();
        let rust = "let v = parse(x).unwrap();\nlet p = unsafe { *ptr };\n";
        let ts = "function f(x: any) { return x as any; }\n";
        let ctx = ChangeContext::new("main", "dev", "wip")
            .with_file(ChangedFile::modified("src/lib.rs", rust))
            .with_file(ChangedFile::added("web/app.ts", ts))
            .with_file(ChangedFile::added("notes.md", "call .unwrap() freely"));

        let outcome = check.run(&ctx).await.unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.findings.len(), 3);
        assert_eq!(outcome.findings[0].line, Some(1));
        assert_eq!(outcome.findings[1].severity, Severity::High);
        assert_eq!(outcome.findings[2].file.as_deref(), Some("web/app.ts"));
    }

    #[tokio::test]
    async fn test_clean_code_passes() {
        let check = TypeSafetyCheck::new().unwrap();
        let ctx = ChangeContext::new("main", "dev", "ok")
            .with_file(ChangedFile::modified("src/lib.rs", "let v = parse(x)?;\n"));
        let outcome = check.run(&ctx).await.unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.score, 1.0);
    }
}
