//! Capability registry for model-backed agents.
//!
//! A skill is a named capability with a JSON parameter schema that a model may
//! ask to invoke. Skills are registered explicitly; nothing is discovered by
//! reflection.

/// Name-indexed skill registry.
pub mod registry;
/// The skill trait, descriptor, and closure adapter.
pub mod skill;

pub use registry::SkillRegistry;
pub use skill::{FnSkill, Skill, SkillDescriptor};
