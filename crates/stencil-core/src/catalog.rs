use crate::blueprint::{ArtifactKind, Blueprint, BlueprintCatalog, BlueprintFile, StackDescriptor};

/// The built-in blueprint catalog. Declaration order matters: it is the
/// tie-breaker when two blueprints score equally.
pub fn builtin() -> BlueprintCatalog {
    BlueprintCatalog {
        blueprints: vec![rust_cli(), python_fastapi(), node_react()],
    }
}

fn file(path: &str, template: &str, kind: ArtifactKind) -> BlueprintFile {
    BlueprintFile {
        path: path.to_string(),
        template: template.to_string(),
        kind,
    }
}

fn rust_cli() -> Blueprint {
    Blueprint {
        id: "rust-cli".to_string(),
        version: "2.0".to_string(),
        stack: StackDescriptor::new("rust", &["clap", "serde"]),
        files: vec![
            file("RULES.md", RULES_RUST, ArtifactKind::GeneratedOnce),
            file(
                ".stencil/agents/reviewer.md",
                AGENT_REVIEWER,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/agents/implementer.md",
                AGENT_IMPLEMENTER,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/skills/error-handling.md",
                SKILL_RUST_ERRORS,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/knowledge/stack.yaml",
                KNOWLEDGE_STACK,
                ArtifactKind::GeneratedOnce,
            ),
            file(
                ".stencil/templates/module.rs.tmpl",
                TEMPLATE_RUST_MODULE,
                ArtifactKind::GeneratedAlways,
            ),
        ],
    }
}

fn python_fastapi() -> Blueprint {
    Blueprint {
        id: "python-fastapi".to_string(),
        version: "2.0".to_string(),
        stack: StackDescriptor::new("python", &["fastapi", "pytest"]),
        files: vec![
            file("RULES.md", RULES_PYTHON, ArtifactKind::GeneratedOnce),
            file(
                ".stencil/agents/reviewer.md",
                AGENT_REVIEWER,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/agents/implementer.md",
                AGENT_IMPLEMENTER,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/skills/endpoint-design.md",
                SKILL_FASTAPI,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/knowledge/stack.yaml",
                KNOWLEDGE_STACK,
                ArtifactKind::GeneratedOnce,
            ),
            file(
                ".stencil/templates/router.py.tmpl",
                TEMPLATE_FASTAPI_ROUTER,
                ArtifactKind::GeneratedAlways,
            ),
        ],
    }
}

fn node_react() -> Blueprint {
    Blueprint {
        id: "node-react".to_string(),
        version: "2.0".to_string(),
        stack: StackDescriptor::new("node", &["react", "vite"]),
        files: vec![
            file("RULES.md", RULES_NODE, ArtifactKind::GeneratedOnce),
            file(
                ".stencil/agents/reviewer.md",
                AGENT_REVIEWER,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/agents/implementer.md",
                AGENT_IMPLEMENTER,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/skills/component-design.md",
                SKILL_REACT,
                ArtifactKind::GeneratedAlways,
            ),
            file(
                ".stencil/knowledge/stack.yaml",
                KNOWLEDGE_STACK,
                ArtifactKind::GeneratedOnce,
            ),
            file(
                ".stencil/templates/component.tsx.tmpl",
                TEMPLATE_REACT_COMPONENT,
                ArtifactKind::GeneratedAlways,
            ),
        ],
    }
}

// ---------------------------------------------------------------------------
// Template content
// ---------------------------------------------------------------------------

const RULES_RUST: &str = r#"# Rules — {{project_name}}

Project-specific working agreements. Edit freely outside the managed block;
the generator only ever touches what sits between the markers.

<!-- stencil:start -->
## Generated baseline ({{language}})

- Stack: {{language}} / {{frameworks}}
- Propagate errors with `Result` and `?`; reserve panics for invariants.
- New modules get unit tests next to the code they test.
- Run the formatter and linter before every commit.
<!-- stencil:end -->
"#;

const RULES_PYTHON: &str = r#"# Rules — {{project_name}}

Project-specific working agreements. Edit freely outside the managed block;
the generator only ever touches what sits between the markers.

<!-- stencil:start -->
## Generated baseline ({{language}})

- Stack: {{language}} / {{frameworks}}
- Type-annotate all public functions; run the type checker in CI.
- Endpoints validate input with request models, never raw dicts.
- New modules get tests under `tests/` mirroring the package layout.
<!-- stencil:end -->
"#;

const RULES_NODE: &str = r#"# Rules — {{project_name}}

Project-specific working agreements. Edit freely outside the managed block;
the generator only ever touches what sits between the markers.

<!-- stencil:start -->
## Generated baseline ({{language}})

- Stack: {{language}} / {{frameworks}}
- Components stay presentational; data fetching lives in hooks.
- Strict TypeScript everywhere; no `any` without a comment.
- New components get a test beside them.
<!-- stencil:end -->
"#;

const AGENT_REVIEWER: &str = r#"# Agent: reviewer

Reviews changes to {{project_name}} before merge.

## Focus

- Correctness first, style second.
- Check error paths and edge cases against RULES.md.
- Flag anything that weakens the {{language}} baseline.
"#;

const AGENT_IMPLEMENTER: &str = r#"# Agent: implementer

Implements planned changes for {{project_name}}.

## Contract

- Work from the task description; surface ambiguity instead of guessing.
- Follow RULES.md and the skills under `.stencil/skills/`.
- Leave the tree formatted, linted, and tested.
"#;

const SKILL_RUST_ERRORS: &str = r#"# Skill: error handling

How errors flow in {{project_name}}.

- Library code returns typed errors; binaries may wrap with context.
- Never unwrap in non-test code paths.
- Convert at boundaries, not in the middle of logic.
"#;

const SKILL_FASTAPI: &str = r#"# Skill: endpoint design

How endpoints are shaped in {{project_name}}.

- One router per resource; dependency-inject services.
- Request/response models live beside the router.
- Return explicit status codes; no bare 500s.
"#;

const SKILL_REACT: &str = r#"# Skill: component design

How components are shaped in {{project_name}}.

- Props typed and documented; no implicit children.
- Side effects in hooks, not render bodies.
- Co-locate styles with the component.
"#;

const KNOWLEDGE_STACK: &str = r#"project: {{project_name}}
language: {{language}}
frameworks: [{{frameworks}}]
conventions: []
gotchas: []
"#;

const TEMPLATE_RUST_MODULE: &str = r#"//! {{project_name}}: new module skeleton.

pub struct Placeholder;

#[cfg(test)]
mod tests {
    #[test]
    fn placeholder() {}
}
"#;

const TEMPLATE_FASTAPI_ROUTER: &str = r#"# {{project_name}}: new router skeleton.

from fastapi import APIRouter

router = APIRouter()
"#;

const TEMPLATE_REACT_COMPONENT: &str = r#"// {{project_name}}: new component skeleton.

export function Placeholder() {
  return null;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::MIN_MATCH_SCORE;
    use crate::paths;

    #[test]
    fn builtin_ids_are_unique_and_valid() {
        let catalog = builtin();
        let mut seen = std::collections::BTreeSet::new();
        for bp in &catalog.blueprints {
            assert!(paths::validate_id(&bp.id), "bad id: {}", bp.id);
            assert!(seen.insert(bp.id.clone()), "duplicate id: {}", bp.id);
        }
    }

    #[test]
    fn every_blueprint_covers_all_generated_units() {
        let catalog = builtin();
        for bp in &catalog.blueprints {
            for unit in paths::GENERATED_UNITS {
                let covered = bp
                    .files
                    .iter()
                    .any(|f| f.path == *unit || f.path.starts_with(&format!("{unit}/")));
                assert!(covered, "{} misses {unit}", bp.id);
            }
        }
    }

    #[test]
    fn rules_files_are_generated_once_with_markers() {
        for bp in &builtin().blueprints {
            let rules = bp
                .files
                .iter()
                .find(|f| f.path == paths::RULES_FILE)
                .unwrap();
            assert_eq!(rules.kind, ArtifactKind::GeneratedOnce);
            assert!(rules.template.contains(crate::resolver::MANAGED_START));
            assert!(rules.template.contains(crate::resolver::MANAGED_END));
        }
    }

    #[test]
    fn sanity_threshold_is_reachable() {
        assert!(MIN_MATCH_SCORE > 0.0 && MIN_MATCH_SCORE < 1.0);
    }
}
