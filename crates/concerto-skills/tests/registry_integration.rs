#![allow(clippy::unwrap_used, clippy::expect_used)]

use concerto_core::{ConcertoError, ToolCall};
use concerto_skills::{FnSkill, SkillDescriptor, SkillRegistry};
use serde_json::json;
use std::sync::Arc;

fn repo_skill() -> FnSkill {
    FnSkill::new(
        SkillDescriptor::new(
            "get_repository",
            "Fetch repository metadata",
            json!({
                "type": "object",
                "properties": {
                    "owner": {"type": "string"},
                    "repo": {"type": "string"}
                },
                "required": ["owner", "repo"]
            }),
        ),
        |args| async move {
            Ok(format!(
                "{}/{} has 42 stars",
                args["owner"].as_str().unwrap_or_default(),
                args["repo"].as_str().unwrap_or_default()
            ))
        },
    )
}

fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: "call_1".into(),
        name: name.into(),
        arguments,
    }
}

#[tokio::test]
async fn executes_registered_skill() {
    let mut registry = SkillRegistry::new();
    registry.register(Arc::new(repo_skill()));

    let result = registry
        .execute(call(
            "get_repository",
            json!({"owner": "octo", "repo": "concerto"}),
        ))
        .await
        .unwrap();

    assert!(!result.is_error);
    assert_eq!(result.content, "octo/concerto has 42 stars");
}

#[tokio::test]
async fn missing_arguments_become_error_result() {
    let mut registry = SkillRegistry::new();
    registry.register(Arc::new(repo_skill()));

    let result = registry
        .execute(call("get_repository", json!({"owner": "octo"})))
        .await
        .unwrap();

    assert!(result.is_error);
    assert!(result.content.contains("repo"), "got: {}", result.content);
}

#[tokio::test]
async fn unknown_skill_is_an_error() {
    let registry = SkillRegistry::new();
    let err = registry.execute(call("nope", json!({}))).await.unwrap_err();
    assert!(matches!(err, ConcertoError::Skill(msg) if msg.contains("nope")));
}

#[test]
fn descriptors_are_sorted_and_replacement_keeps_count() {
    let mut registry = SkillRegistry::new();
    for name in ["zeta", "alpha", "mid"] {
        registry.register(Arc::new(FnSkill::new(
            SkillDescriptor::new(name, "test", json!({"type": "object"})),
            |_| async { Ok(String::new()) },
        )));
    }
    registry.register(Arc::new(FnSkill::new(
        SkillDescriptor::new("alpha", "replacement", json!({"type": "object"})),
        |_| async { Ok(String::new()) },
    )));

    let names: Vec<_> = registry
        .list_descriptors()
        .iter()
        .map(|d| d.name.clone())
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    assert_eq!(registry.skill_count(), 3);
    assert_eq!(
        registry.get("alpha").unwrap().descriptor().description,
        "replacement"
    );
}
