use crate::blueprint::{ArtifactKind, Blueprint};
use crate::config::GeneratorConfig;
use crate::error::{RenderFailure, Result, StencilError};
use crate::render::TemplateRenderer;

/// A file the engine wants to produce, prior to comparison with what already
/// exists on disk. Produced fresh each run.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: String,
    pub content: String,
    pub content_hash: String,
    pub kind: ArtifactKind,
}

impl CandidateFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>, kind: ArtifactKind) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            content_hash: crate::io::sha256_hex(content.as_bytes()),
            content,
            kind,
        }
    }
}

/// Render every blueprint file into a candidate set.
///
/// Render failures are collected per file and abort the whole set — a
/// partially rendered blueprint must never reach the resolver, where it
/// would look like an intentional subset.
pub fn build_candidates(
    blueprint: &Blueprint,
    config: &GeneratorConfig,
    renderer: &dyn TemplateRenderer,
) -> Result<Vec<CandidateFile>> {
    let vars = config.template_vars();
    let mut candidates = Vec::with_capacity(blueprint.files.len());
    let mut failures = Vec::new();

    for file in &blueprint.files {
        match renderer.render(&file.template, &vars) {
            Ok(content) => candidates.push(CandidateFile::new(&file.path, content, file.kind)),
            Err(e) => failures.push(RenderFailure {
                path: file.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if !failures.is_empty() {
        return Err(StencilError::Render { failures });
    }

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{BlueprintFile, StackDescriptor};
    use crate::render::VarRenderer;

    fn blueprint_with(files: Vec<BlueprintFile>) -> Blueprint {
        Blueprint {
            id: "test-bp".to_string(),
            version: "1.0".to_string(),
            stack: StackDescriptor::new("rust", &[]),
            files,
        }
    }

    fn file(path: &str, template: &str, kind: ArtifactKind) -> BlueprintFile {
        BlueprintFile {
            path: path.to_string(),
            template: template.to_string(),
            kind,
        }
    }

    #[test]
    fn renders_and_hashes() {
        let bp = blueprint_with(vec![file(
            "RULES.md",
            "# Rules for {{project_name}}\n",
            ArtifactKind::GeneratedOnce,
        )]);
        let cfg = GeneratorConfig::new("demo", StackDescriptor::new("rust", &[]));
        let candidates = build_candidates(&bp, &cfg, &VarRenderer).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].content, "# Rules for demo\n");
        assert_eq!(
            candidates[0].content_hash,
            crate::io::sha256_hex(b"# Rules for demo\n")
        );
        assert_eq!(candidates[0].kind, ArtifactKind::GeneratedOnce);
    }

    #[test]
    fn output_is_sorted_by_path() {
        let bp = blueprint_with(vec![
            file("b.md", "b", ArtifactKind::GeneratedAlways),
            file("a.md", "a", ArtifactKind::GeneratedAlways),
        ]);
        let cfg = GeneratorConfig::new("demo", StackDescriptor::new("rust", &[]));
        let candidates = build_candidates(&bp, &cfg, &VarRenderer).unwrap();
        assert_eq!(candidates[0].path, "a.md");
        assert_eq!(candidates[1].path, "b.md");
    }

    #[test]
    fn render_failure_aborts_whole_set() {
        let bp = blueprint_with(vec![
            file("good.md", "fine", ArtifactKind::GeneratedAlways),
            file("bad.md", "{{undefined}}", ArtifactKind::GeneratedAlways),
            file("also-bad.md", "{{broken", ArtifactKind::GeneratedAlways),
        ]);
        let cfg = GeneratorConfig::new("demo", StackDescriptor::new("rust", &[]));
        let err = build_candidates(&bp, &cfg, &VarRenderer).unwrap_err();

        match err {
            StencilError::Render { failures } => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].path, "bad.md");
                assert!(failures[0].reason.contains("undefined"));
            }
            other => panic!("expected Render error, got {other:?}"),
        }
    }
}
