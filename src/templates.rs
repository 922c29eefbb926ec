//! Prompt and response-schema templates.
//!
//! Every stage needs three artefacts, resolved from the templates directory:
//!
//! ```text
//! templates/<workflow>/system_instruction.txt                                  (single_step)
//! templates/<workflow>/system_instruction/system_instructions_step_<n>.txt     (multi_step)
//! templates/<workflow>/user_instruction.txt
//! templates/<workflow>/user_instruction/user_instructions_step_<n>.txt
//! templates/<workflow>/response_schema.json
//! templates/<workflow>/response_schema/response_schema_step_<n>.json
//! ```
//!
//! Prompt wording lives on disk rather than in the binary so it can be tuned
//! between runs without a rebuild. A missing template is fatal for the stage.

use crate::error::ExtractError;
use crate::io::load_text;
use crate::workflow::Stage;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// The three template kinds a stage loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    SystemInstruction,
    UserInstruction,
    ResponseSchema,
}

impl TemplateKind {
    fn dir_name(&self) -> &'static str {
        match self {
            TemplateKind::SystemInstruction => "system_instruction",
            TemplateKind::UserInstruction => "user_instruction",
            TemplateKind::ResponseSchema => "response_schema",
        }
    }

    fn step_file_prefix(&self) -> &'static str {
        match self {
            TemplateKind::SystemInstruction => "system_instructions_step_",
            TemplateKind::UserInstruction => "user_instructions_step_",
            TemplateKind::ResponseSchema => "response_schema_step_",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            TemplateKind::ResponseSchema => "json",
            _ => "txt",
        }
    }
}

/// Everything a stage needs before it can call the model.
#[derive(Debug, Clone)]
pub struct StageTemplates {
    pub system_instruction: Vec<String>,
    pub user_instruction: String,
    pub response_schema: Value,
}

/// Resolves and loads templates from a templates directory.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    root: PathBuf,
}

impl TemplateLoader {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: templates_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a template for a stage.
    pub fn path(&self, kind: TemplateKind, stage: Stage) -> PathBuf {
        let workflow_dir = self.root.join(stage.workflow().as_str());
        match stage {
            Stage::SingleStep => {
                workflow_dir.join(format!("{}.{}", kind.dir_name(), kind.extension()))
            }
            Stage::MultiStep(step) => workflow_dir.join(kind.dir_name()).join(format!(
                "{}{}.{}",
                kind.step_file_prefix(),
                step.index(),
                kind.extension()
            )),
        }
    }

    /// System instruction as a single-element list of instruction parts.
    pub fn load_system_instruction(&self, stage: Stage) -> Result<Vec<String>, ExtractError> {
        debug!("Loading system instruction for {}", stage);
        Ok(vec![self.load(TemplateKind::SystemInstruction, stage)?])
    }

    pub fn load_user_instruction(&self, stage: Stage) -> Result<String, ExtractError> {
        debug!("Loading user instruction for {}", stage);
        self.load(TemplateKind::UserInstruction, stage)
    }

    /// Response schema as a JSON value (OpenAPI-subset schema for the model).
    pub fn load_response_schema(&self, stage: Stage) -> Result<Value, ExtractError> {
        debug!("Loading response schema for {}", stage);
        let path = self.path(TemplateKind::ResponseSchema, stage);
        let text = self.load(TemplateKind::ResponseSchema, stage)?;
        serde_json::from_str(&text).map_err(|source| {
            error!("Response schema {} is not valid JSON: {}", path.display(), source);
            ExtractError::MalformedJson { path, source }
        })
    }

    /// Load all three templates for a stage.
    pub fn load_stage(&self, stage: Stage) -> Result<StageTemplates, ExtractError> {
        Ok(StageTemplates {
            system_instruction: self.load_system_instruction(stage)?,
            user_instruction: self.load_user_instruction(stage)?,
            response_schema: self.load_response_schema(stage)?,
        })
    }

    fn load(&self, kind: TemplateKind, stage: Stage) -> Result<String, ExtractError> {
        let path = self.path(kind, stage);
        match load_text(&path)? {
            Some(text) => Ok(text),
            None => {
                error!("Missing {:?} template for {}: {}", kind, stage, path.display());
                Err(ExtractError::TemplateMissing { path })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Step;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    #[test]
    fn single_step_paths() {
        let loader = TemplateLoader::new("/t");
        assert_eq!(
            loader.path(TemplateKind::SystemInstruction, Stage::SingleStep),
            PathBuf::from("/t/single_step/system_instruction.txt")
        );
        assert_eq!(
            loader.path(TemplateKind::ResponseSchema, Stage::SingleStep),
            PathBuf::from("/t/single_step/response_schema.json")
        );
    }

    #[test]
    fn multi_step_paths() {
        let loader = TemplateLoader::new("/t");
        assert_eq!(
            loader.path(TemplateKind::SystemInstruction, Stage::MultiStep(Step::Two)),
            PathBuf::from("/t/multi_step/system_instruction/system_instructions_step_2.txt")
        );
        assert_eq!(
            loader.path(TemplateKind::UserInstruction, Stage::MultiStep(Step::Zero)),
            PathBuf::from("/t/multi_step/user_instruction/user_instructions_step_0.txt")
        );
        assert_eq!(
            loader.path(TemplateKind::ResponseSchema, Stage::MultiStep(Step::Three)),
            PathBuf::from("/t/multi_step/response_schema/response_schema_step_3.json")
        );
    }

    #[test]
    fn system_instruction_is_single_part() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "single_step/system_instruction.txt", "You extract metrics.");
        let loader = TemplateLoader::new(dir.path());
        assert_eq!(
            loader.load_system_instruction(Stage::SingleStep).unwrap(),
            vec!["You extract metrics.".to_string()]
        );
    }

    #[test]
    fn missing_template_is_error() {
        let dir = TempDir::new().unwrap();
        let loader = TemplateLoader::new(dir.path());
        let err = loader
            .load_user_instruction(Stage::MultiStep(Step::One))
            .unwrap_err();
        assert!(matches!(err, ExtractError::TemplateMissing { .. }));
    }

    #[test]
    fn schema_must_be_json() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "single_step/response_schema.json", "type: object");
        let loader = TemplateLoader::new(dir.path());
        let err = loader.load_response_schema(Stage::SingleStep).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedJson { .. }));
    }

    #[test]
    fn load_stage_collects_all_three() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "multi_step/system_instruction/system_instructions_step_1.txt", "sys 1");
        write(root, "multi_step/user_instruction/user_instructions_step_1.txt", "user 1");
        write(
            root,
            "multi_step/response_schema/response_schema_step_1.json",
            r#"{"type": "ARRAY"}"#,
        );
        let t = TemplateLoader::new(root)
            .load_stage(Stage::MultiStep(Step::One))
            .unwrap();
        assert_eq!(t.system_instruction, vec!["sys 1".to_string()]);
        assert_eq!(t.user_instruction, "user 1");
        assert_eq!(t.response_schema, json!({"type": "ARRAY"}));
    }
}
