//! Rhai-backed script evaluator.
//!
//! ## Environment
//!
//! A notebook environment is a Rhai [`Scope`] holding every top-level
//! `let`/`const` binding, plus a function library accumulating each `fn`
//! the notebook has defined so far.
//!
//! ## Output
//!
//! `print(x)` and `debug(x)` write one line each to the ambient
//! [`OutputStream`].
//!
//! ## Rich values
//!
//! Scripts build rich results with constructor functions, each of which
//! also works as a method to add further representations:
//!
//! ```rhai
//! html("<b>hi</b>").markdown("**hi**").text("hi")
//! png(bytes)
//! mimebundle(#{ "text/plain": "x", "image/png": bytes })
//! ```

use std::collections::HashSet;

use rhai::{AST, Blob, Dynamic, Engine, Map, Scope};

use super::{Evaluated, ScriptEvaluator};
use crate::error::{Error, Result};
use crate::output::OutputStream;
use crate::render::{MimeBundle, Payload, Represent};

/// One notebook's Rhai state.
pub struct RhaiEnv {
    scope: Scope<'static>,
    library: AST,
}

impl RhaiEnv {
    /// Read a binding, if present and of type `T`.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T> {
        self.scope.get_value::<T>(name)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.scope.contains(name)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.scope.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.scope.is_empty()
    }

    /// Drop bindings shadowed by a newer one of the same name.
    ///
    /// Every `let` pushes a fresh entry, so re-running a cell would
    /// otherwise grow the scope without bound.
    fn compact(&mut self) {
        let entries: Vec<(String, bool, Dynamic)> = self
            .scope
            .iter()
            .map(|(name, constant, value)| (name.to_string(), constant, value))
            .collect();

        let mut seen = HashSet::new();
        let mut newest: Vec<_> = entries
            .into_iter()
            .rev()
            .filter(|(name, _, _)| seen.insert(name.clone()))
            .collect();
        if newest.len() == self.scope.len() {
            return;
        }

        let mut scope = Scope::new();
        while let Some((name, constant, value)) = newest.pop() {
            if constant {
                scope.push_constant_dynamic(name, value);
            } else {
                scope.push_dynamic(name, value);
            }
        }
        self.scope = scope;
    }
}

impl Default for RhaiEnv {
    fn default() -> Self {
        Self {
            scope: Scope::new(),
            library: AST::empty(),
        }
    }
}

/// Evaluator for notebooks written in Rhai.
pub struct RhaiEvaluator {
    engine: Engine,
}

impl RhaiEvaluator {
    /// Create an evaluator printing to `output`, with no operation limit.
    pub fn new(output: OutputStream) -> Self {
        Self::with_max_operations(output, 0)
    }

    /// Create an evaluator that aborts scripts after `max_operations`
    /// steps. Zero means unlimited.
    pub fn with_max_operations(output: OutputStream, max_operations: u64) -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, output);
        engine.set_max_operations(max_operations);
        Self { engine }
    }

    /// Wire output and register the rich value constructors.
    fn configure_engine(engine: &mut Engine, output: OutputStream) {
        {
            let output = output.clone();
            engine.on_print(move |text| output.write(&format!("{}\n", text)));
        }
        engine.on_debug(move |text, _source, _pos| output.write(&format!("{}\n", text)));

        engine.register_type_with_name::<RichValue>("Rich");
        engine.register_fn("to_string", |value: &mut RichValue| value.repr_text());
        engine.register_fn("to_debug", |value: &mut RichValue| value.repr_text());

        register_text_repr(engine, "text", |v, s| v.text = Some(s));
        register_text_repr(engine, "html", |v, s| v.html = Some(s));
        register_text_repr(engine, "markdown", |v, s| v.markdown = Some(s));
        register_text_repr(engine, "svg", |v, s| v.svg = Some(s));
        register_text_repr(engine, "latex", |v, s| v.latex = Some(s));
        register_text_repr(engine, "javascript", |v, s| v.javascript = Some(s));
        register_binary_repr(engine, "png", |v, b| v.png = Some(b));
        register_binary_repr(engine, "jpeg", |v, b| v.jpeg = Some(b));

        engine.register_fn("mimebundle", |map: Map| RichValue {
            bundle: Some(bundle_from_map(map)),
            ..RichValue::default()
        });
        engine.register_fn("mimebundle", |value: &mut RichValue, map: Map| {
            let mut value = value.clone();
            value.bundle = Some(bundle_from_map(map));
            value
        });
    }
}

fn register_text_repr(engine: &mut Engine, name: &'static str, set: fn(&mut RichValue, String)) {
    engine.register_fn(name, move |text: &str| {
        let mut value = RichValue::default();
        set(&mut value, text.to_string());
        value
    });
    engine.register_fn(name, move |value: &mut RichValue, text: &str| {
        let mut value = value.clone();
        set(&mut value, text.to_string());
        value
    });
}

fn register_binary_repr(engine: &mut Engine, name: &'static str, set: fn(&mut RichValue, Blob)) {
    engine.register_fn(name, move |bytes: Blob| {
        let mut value = RichValue::default();
        set(&mut value, bytes);
        value
    });
    engine.register_fn(name, move |value: &mut RichValue, bytes: Blob| {
        let mut value = value.clone();
        set(&mut value, bytes);
        value
    });
}

fn bundle_from_map(map: Map) -> MimeBundle<'static> {
    let mut bundle = MimeBundle::new();
    for (mime, value) in map {
        let payload = if value.is::<Blob>() {
            value
                .try_cast::<Blob>()
                .map(Payload::from)
                .unwrap_or_else(|| Payload::Text(String::new()))
        } else {
            Payload::Text(value.to_string())
        };
        bundle.insert(mime.to_string(), payload);
    }
    bundle
}

impl ScriptEvaluator for RhaiEvaluator {
    type Env = RhaiEnv;
    type Value = RhaiValue;

    fn run_statements(&self, env: &mut RhaiEnv, source: &str) -> Result<()> {
        let ast = self
            .engine
            .compile_with_scope(&env.scope, source)
            .map_err(|e| Error::Parse(e.to_string()))?;

        // Functions are defined before the statements run, like a module.
        env.library = env.library.merge(&ast.clone_functions_only());
        let program = env.library.merge(&ast);

        let result = self
            .engine
            .run_ast_with_scope(&mut env.scope, &program)
            .map_err(|e| Error::Execution(e.to_string()));
        env.compact();
        result
    }

    fn evaluate_expression(&self, env: &mut RhaiEnv, source: &str) -> Result<Evaluated<RhaiValue>> {
        let Ok(ast) = self.engine.compile_expression_with_scope(&env.scope, source) else {
            return Ok(Evaluated::NotAnExpression);
        };
        let program = env.library.merge(&ast);

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut env.scope, &program)
            .map_err(|e| Error::Execution(e.to_string()))?;
        Ok(Evaluated::Value(RhaiValue::from(value)))
    }
}

/// A value produced by a Rhai expression.
#[derive(Debug, Clone)]
pub enum RhaiValue {
    /// The unit value `()`; renders nothing.
    Unit,
    /// A Rhai `Blob`, exposing its bytes.
    Bytes(Blob),
    /// A value built with the rich constructors.
    Rich(RichValue),
    /// Anything else.
    Other(Dynamic),
}

impl From<Dynamic> for RhaiValue {
    fn from(value: Dynamic) -> Self {
        if value.is_unit() {
            RhaiValue::Unit
        } else if value.is::<Blob>() {
            value.try_cast::<Blob>().map_or(RhaiValue::Unit, RhaiValue::Bytes)
        } else if value.is::<RichValue>() {
            value.try_cast::<RichValue>().map_or(RhaiValue::Unit, RhaiValue::Rich)
        } else {
            RhaiValue::Other(value)
        }
    }
}

impl Represent for RhaiValue {
    fn repr_text(&self) -> String {
        match self {
            RhaiValue::Unit => "()".to_string(),
            RhaiValue::Bytes(bytes) => format!("{:?}", bytes),
            RhaiValue::Rich(rich) => rich.repr_text(),
            RhaiValue::Other(value) => format!("{:?}", value),
        }
    }

    fn is_absent(&self) -> bool {
        matches!(self, RhaiValue::Unit)
    }

    fn byte_view(&self) -> Option<&[u8]> {
        match self {
            RhaiValue::Bytes(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    fn repr_mimebundle(&self) -> Option<MimeBundle<'static>> {
        self.rich()?.repr_mimebundle()
    }

    fn repr_html(&self) -> Option<String> {
        self.rich()?.repr_html()
    }

    fn repr_markdown(&self) -> Option<String> {
        self.rich()?.repr_markdown()
    }

    fn repr_svg(&self) -> Option<String> {
        self.rich()?.repr_svg()
    }

    fn repr_png(&self) -> Option<Vec<u8>> {
        self.rich()?.repr_png()
    }

    fn repr_jpeg(&self) -> Option<Vec<u8>> {
        self.rich()?.repr_jpeg()
    }

    fn repr_latex(&self) -> Option<String> {
        self.rich()?.repr_latex()
    }

    fn repr_javascript(&self) -> Option<String> {
        self.rich()?.repr_javascript()
    }
}

impl RhaiValue {
    fn rich(&self) -> Option<&RichValue> {
        match self {
            RhaiValue::Rich(rich) => Some(rich),
            _ => None,
        }
    }
}

/// Script-built value carrying explicit representations.
#[derive(Debug, Clone, Default)]
pub struct RichValue {
    text: Option<String>,
    bundle: Option<MimeBundle<'static>>,
    html: Option<String>,
    markdown: Option<String>,
    svg: Option<String>,
    png: Option<Blob>,
    jpeg: Option<Blob>,
    latex: Option<String>,
    javascript: Option<String>,
}

impl Represent for RichValue {
    fn repr_text(&self) -> String {
        self.text.clone().unwrap_or_else(|| "<rich>".to_string())
    }

    fn repr_mimebundle(&self) -> Option<MimeBundle<'static>> {
        self.bundle.clone()
    }

    fn repr_html(&self) -> Option<String> {
        self.html.clone()
    }

    fn repr_markdown(&self) -> Option<String> {
        self.markdown.clone()
    }

    fn repr_svg(&self) -> Option<String> {
        self.svg.clone()
    }

    fn repr_png(&self) -> Option<Vec<u8>> {
        self.png.clone()
    }

    fn repr_jpeg(&self) -> Option<Vec<u8>> {
        self.jpeg.clone()
    }

    fn repr_latex(&self) -> Option<String> {
        self.latex.clone()
    }

    fn repr_javascript(&self) -> Option<String> {
        self.javascript.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::output::FnSink;
    use crate::render::{Rendered, encode};

    fn evaluator() -> (RhaiEvaluator, Arc<Mutex<String>>) {
        let printed = Arc::new(Mutex::new(String::new()));
        let target = printed.clone();
        let output = OutputStream::new(FnSink(move |s: &str| target.lock().unwrap().push_str(s)));
        (RhaiEvaluator::new(output), printed)
    }

    fn value(evaluator: &RhaiEvaluator, env: &mut RhaiEnv, source: &str) -> RhaiValue {
        match evaluator.evaluate_expression(env, source).unwrap() {
            Evaluated::Value(value) => value,
            Evaluated::NotAnExpression => panic!("{:?} is not an expression", source),
        }
    }

    #[test]
    fn test_bindings_persist() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        evaluator.run_statements(&mut env, "let x = 5;").unwrap();

        assert_eq!(env.get::<i64>("x"), Some(5));
        assert_eq!(value(&evaluator, &mut env, "x + 1").repr_text(), "6");
    }

    #[test]
    fn test_functions_persist() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        evaluator
            .run_statements(&mut env, "fn double(n) { n * 2 }")
            .unwrap();
        assert_eq!(value(&evaluator, &mut env, "double(21)").repr_text(), "42");
    }

    #[test]
    fn test_rerun_let_keeps_one_binding() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        for _ in 0..100 {
            evaluator.run_statements(&mut env, "let x = 1;").unwrap();
        }
        assert_eq!(env.len(), 1);
        assert_eq!(env.get::<i64>("x"), Some(1));
    }

    #[test]
    fn test_shadowed_bindings_dropped_after_failure() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        evaluator.run_statements(&mut env, "const k = 3; let a = 0;").unwrap();
        assert!(evaluator
            .run_statements(&mut env, "let x = 1; let x = 2; let y = 1 / 0;")
            .is_err());

        assert_eq!(env.len(), 3);
        assert_eq!(env.get::<i64>("x"), Some(2));
        assert_eq!(env.get::<i64>("k"), Some(3));
        assert!(evaluator.run_statements(&mut env, "k = 4;").is_err());
        assert_eq!(value(&evaluator, &mut env, "k + x").repr_text(), "5");
    }

    #[test]
    fn test_statement_is_not_an_expression() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        evaluator.run_statements(&mut env, "let x = 1;").unwrap();
        assert!(matches!(
            evaluator.evaluate_expression(&mut env, "x = 3").unwrap(),
            Evaluated::NotAnExpression
        ));
        assert!(matches!(
            evaluator.evaluate_expression(&mut env, "let y = 2").unwrap(),
            Evaluated::NotAnExpression
        ));
    }

    #[test]
    fn test_print_writes_lines() {
        let (evaluator, printed) = evaluator();
        let mut env = RhaiEnv::default();
        evaluator
            .run_statements(&mut env, "print(\"hi\"); print(1 + 1);")
            .unwrap();
        assert_eq!(*printed.lock().unwrap(), "hi\n2\n");
    }

    #[test]
    fn test_runtime_failure_keeps_partial_state() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        evaluator.run_statements(&mut env, "let count = 0;").unwrap();
        let err = evaluator
            .run_statements(&mut env, "count = 1; let boom = 1 / 0;")
            .unwrap_err();

        assert!(matches!(err, Error::Execution(_)));
        assert_eq!(env.get::<i64>("count"), Some(1));
    }

    #[test]
    fn test_parse_failure() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        let err = evaluator.run_statements(&mut env, "let = ;").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_unit_is_absent() {
        let (evaluator, printed) = evaluator();
        let mut env = RhaiEnv::default();
        let result = value(&evaluator, &mut env, "print(\"side effect\")");
        assert!(result.is_absent());
        assert_eq!(*printed.lock().unwrap(), "side effect\n");
    }

    #[test]
    fn test_rich_constructors() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        let result = value(&evaluator, &mut env, r#"markdown("*x*").html("<i>x</i>")"#);

        let Rendered::MimeBundle(bundle) = encode(&result) else {
            panic!("expected a mime bundle");
        };
        assert_eq!(
            bundle.get("text/html"),
            Some(&Payload::Text("<i>x</i>".to_string()))
        );
    }

    #[test]
    fn test_mimebundle_from_map() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        let result = value(
            &evaluator,
            &mut env,
            r#"mimebundle(#{ "text/plain": "x" })"#,
        );
        let Rendered::MimeBundle(bundle) = encode(&result) else {
            panic!("expected a mime bundle");
        };
        assert_eq!(bundle.get("text/plain"), Some(&Payload::Text("x".to_string())));
    }

    #[test]
    fn test_blob_exposes_bytes() {
        let (evaluator, _) = evaluator();
        let mut env = RhaiEnv::default();
        evaluator
            .run_statements(&mut env, "let b = blob(); b.push(255); b.push(216);")
            .unwrap();
        let result = value(&evaluator, &mut env, "b");
        assert_eq!(result.byte_view(), Some(&[0xff, 0xd8][..]));
    }

    #[test]
    fn test_operation_limit() {
        let evaluator = RhaiEvaluator::with_max_operations(OutputStream::stdout(), 1_000);
        let mut env = RhaiEnv::default();
        let err = evaluator.run_statements(&mut env, "loop {}").unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
    }
}
