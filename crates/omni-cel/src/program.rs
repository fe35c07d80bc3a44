//! # Compiled Rules
//!
//! A parsed expression together with the declarations it was type-checked
//! against.

use cel_interpreter::{Context, Program, Value as CelValue};
use omni_core::{PluginError, SchemaNode};
use serde_json::Value;

use crate::check::{check, CheckError, Ty};
use crate::decl::Declarations;

/// An expression compiled against a schema subtree.
pub struct CompiledRule {
    source: String,
    declarations: Declarations,
    result: Ty,
    program: Program,
}

impl std::fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRule")
            .field("source", &self.source)
            .field("root", &self.declarations.root())
            .field("result", &self.result)
            .finish()
    }
}

impl CompiledRule {
    /// Parse `source` and type-check it against the declarations for
    /// `node` under `root`.
    ///
    /// # Errors
    ///
    /// [`PluginError::Compile`] on a parse failure, an undeclared
    /// reference or a type error.
    pub fn compile(source: &str, root: &str, node: &SchemaNode) -> Result<Self, PluginError> {
        let declarations = Declarations::build(root, node);
        let compile_error = |e: &dyn std::fmt::Display| PluginError::Compile(format!("{source:?}: {e}"));

        let expr = cel_parser::parse(source).map_err(|e| compile_error(&e))?;
        let result = check(&expr, &declarations).map_err(|e| match e {
            CheckError::Undeclared(names) => compile_error(&format!(
                "undeclared reference to {} (declared: {})",
                names.join(", "),
                declared_names(&declarations)
            )),
            CheckError::Type(message) => compile_error(&message),
        })?;
        let program = Program::compile(source).map_err(|e| compile_error(&e))?;

        Ok(Self {
            source: source.to_string(),
            declarations,
            result,
            program,
        })
    }

    /// [`compile`](Self::compile), additionally requiring a boolean result.
    ///
    /// # Errors
    ///
    /// [`PluginError::Compile`] as for `compile`, or if the expression is
    /// statically typed as something other than `bool`.
    pub fn compile_predicate(source: &str, root: &str, node: &SchemaNode) -> Result<Self, PluginError> {
        let rule = Self::compile(source, root, node)?;
        match rule.result {
            Ty::Bool | Ty::Dyn => Ok(rule),
            other => Err(PluginError::Compile(format!(
                "{source:?}: expression evaluates to {other}, not bool"
            ))),
        }
    }

    /// Static type of the expression's result.
    pub fn result_type(&self) -> Ty {
        self.result
    }

    /// The expression text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The declarations the expression was checked against.
    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    /// Bind `value` under the root name and evaluate.
    ///
    /// # Errors
    ///
    /// [`PluginError::Evaluation`] for bind-time type mismatches and
    /// interpreter errors.
    pub fn evaluate(&self, value: &Value) -> Result<CelValue, PluginError> {
        let bound = self.declarations.bind(value)?;
        let mut context = Context::default();
        context.add_variable_from_value(self.declarations.root().to_string(), bound);
        self.program
            .execute(&context)
            .map_err(|e| PluginError::Evaluation(format!("{:?}: {e}", self.source)))
    }
}

fn declared_names(declarations: &Declarations) -> String {
    let names: Vec<&str> = declarations.iter().map(|(name, _)| name).collect();
    names.join(", ")
}
