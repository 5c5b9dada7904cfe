//! Tree-walking evaluator.

use super::{
    Captures, RenderScope, Renderer, TemplateError,
    expr::Expr,
    parser::Node,
};
use crate::{
    context::{Context, resolve},
    value::{Map, Value},
};
use std::{fmt::Write, sync::Arc};

/// Intermediate result of evaluating an expression.
///
/// `data` and its dotted namespaces (`data.i18n`) are not values on their
/// own; they become one only when a member resolves to a data file.
enum Operand {
    Value(Value),
    Data(String),
}

impl Operand {
    fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            // a namespace behaves like a scope: truthy, prints nothing
            Self::Data(_) => Value::map(Map::new()),
        }
    }

    const fn is_truthy(&self) -> bool {
        match self {
            Self::Value(value) => value.is_truthy(),
            Self::Data(_) => true,
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

pub(super) struct Evaluator<'a, 'r> {
    renderer: &'a Renderer<'r>,
    scope: &'a RenderScope,
    captures: &'a mut Captures,
    /// Loop variables, innermost last.
    locals: Vec<(String, Value)>,
}

impl<'a, 'r> Evaluator<'a, 'r> {
    pub(super) fn new(
        renderer: &'a Renderer<'r>,
        scope: &'a RenderScope,
        captures: &'a mut Captures,
    ) -> Self {
        Self {
            renderer,
            scope,
            captures,
            locals: Vec::new(),
        }
    }

    fn strict(&self) -> bool {
        self.scope.is_strict()
    }

    pub(super) fn run(&mut self, nodes: &[Node], out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(expr) => {
                    let value = self.value(expr)?;
                    // writing to a String cannot fail
                    let _ = write!(out, "{value}");
                }
                Node::Eval(expr) => {
                    self.eval(expr)?;
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for (cond, body) in branches {
                        if self.eval(cond)?.is_truthy() {
                            taken = Some(body);
                            break;
                        }
                    }
                    self.run(taken.unwrap_or(otherwise), out)?;
                }
                Node::Each {
                    seq,
                    item,
                    index,
                    body,
                } => self.each(seq, item, index.as_deref(), body, out)?,
                Node::Capture { name, body } => {
                    let name = self.value(name)?.to_string();
                    let mut captured = String::new();
                    self.run(body, &mut captured)?;
                    self.captures.insert(name, captured);
                }
            }
        }
        Ok(())
    }

    fn each(
        &mut self,
        seq: &Expr,
        item: &str,
        index: Option<&str>,
        body: &[Node],
        out: &mut String,
    ) -> Result<(), TemplateError> {
        let items = match self.value(seq)? {
            Value::Null => return Ok(()),
            Value::Seq(items) => items,
            other => return Err(TemplateError::NotIterable(other.type_name())),
        };

        let depth = self.locals.len();
        for (i, element) in items.iter().enumerate() {
            self.locals.push((item.to_owned(), element.clone()));
            if let Some(index) = index {
                self.locals.push((index.to_owned(), Value::Int(i as i64)));
            }
            let result = self.run(body, out);
            self.locals.truncate(depth);
            result?;
        }
        Ok(())
    }

    fn value(&mut self, expr: &Expr) -> Result<Value, TemplateError> {
        self.eval(expr).map(Operand::into_value)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Operand, TemplateError> {
        Ok(match expr {
            Expr::Literal(value) => value.clone().into(),
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.value(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::seq(items).into()
            }
            Expr::Var(name) => self.root(name)?,
            Expr::Member(target, name) => {
                let target = self.eval(target)?;
                self.member(target, name)?
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.value(index)?;
                self.index(target, index)?
            }
            Expr::Call { name, args, kwargs } => self.call(name, args, kwargs)?.into(),
            Expr::Method { target, name, args } => {
                let target = self.value(target)?;
                let args = args
                    .iter()
                    .map(|arg| self.value(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                method(&target, name, &args)?.into()
            }
            Expr::Not(inner) => Value::Bool(!self.eval(inner)?.is_truthy()).into(),
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() { self.eval(right)? } else { left }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() { left } else { self.eval(right)? }
            }
            Expr::Eq(left, right) => Value::Bool(self.value(left)? == self.value(right)?).into(),
            Expr::Ne(left, right) => Value::Bool(self.value(left)? != self.value(right)?).into(),
        })
    }

    /// Root names: loop variables, then `site`/`page`/`data`, then
    /// zero-argument helpers.
    fn root(&self, name: &str) -> Result<Operand, TemplateError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| local == name) {
            return Ok(value.clone().into());
        }
        match name {
            "site" => return Ok(Value::Map(Arc::clone(self.scope.site())).into()),
            "page" => return Ok(Value::Map(Arc::clone(self.scope.page())).into()),
            "data" => return Ok(Operand::Data(String::new())),
            _ => {}
        }
        if self.renderer.helpers.contains(name) {
            return self.helper(name, Vec::new()).map(Operand::from);
        }
        Ok(resolve(None, name, self.strict())?.into())
    }

    fn member(&self, target: Operand, name: &str) -> Result<Operand, TemplateError> {
        let strict = self.strict();
        match target {
            Operand::Data(prefix) => self.data(&prefix, name),
            Operand::Value(Value::Map(map)) => {
                if !map.contains_key(name) && is_universal_method(name) {
                    return Ok(method(&Value::Map(map), name, &[])?.into());
                }
                Ok(Context::wrap(map, strict).get(name)?.into())
            }
            Operand::Value(Value::Null) if !is_universal_method(name) => {
                Ok(resolve(None, name, strict)?.into())
            }
            Operand::Value(value) => Ok(method(&value, name, &[])?.into()),
        }
    }

    /// `data.<prefix>.<name>`: a data file, a deeper namespace, or undefined.
    fn data(&self, prefix: &str, name: &str) -> Result<Operand, TemplateError> {
        let store = self.scope.data();
        let key = if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{prefix}.{name}")
        };
        if let Some(value) = store.lookup(&key)? {
            return Ok(value.into());
        }
        if store.is_namespace(&key) {
            return Ok(Operand::Data(key));
        }
        Ok(store.get(&key)?.into())
    }

    fn index(&self, target: Operand, index: Value) -> Result<Operand, TemplateError> {
        match (target, index) {
            (Operand::Data(prefix), key) => self.data(&prefix, &key.to_string()),
            (Operand::Value(Value::Map(map)), key) => {
                let key = key.to_string();
                Ok(Context::wrap(map, self.strict()).get(&key)?.into())
            }
            (Operand::Value(Value::Seq(items)), Value::Int(i)) => {
                let len = items.len() as i64;
                let i = if i < 0 { len + i } else { i };
                let item = usize::try_from(i).ok().and_then(|i| items.get(i)).cloned();
                Ok(item.unwrap_or_default().into())
            }
            (Operand::Value(Value::Null), _) => Ok(Value::Null.into()),
            (Operand::Value(other), _) => Err(TemplateError::NotIndexable(other.type_name())),
        }
    }

    fn call(
        &mut self,
        name: &str,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<Value, TemplateError> {
        let mut values = args
            .iter()
            .map(|arg| self.value(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let mut named = Map::new();
        for (key, expr) in kwargs {
            named.insert(key.clone(), self.value(expr)?);
        }

        match name {
            "partial" => {
                let [file] = values.as_slice() else {
                    return Err(TemplateError::arguments(name, "expected a file name"));
                };
                let file = file.to_string();
                let output = self
                    .renderer
                    .partial(&file, named, self.scope, self.captures)?;
                Ok(output.into())
            }
            "content_for" | "content_for?" => {
                let [capture] = values.as_slice() else {
                    return Err(TemplateError::arguments(name, "expected a capture name"));
                };
                let capture = capture.to_string();
                Ok(if name == "content_for" {
                    self.captures.get(&capture).unwrap_or_default().into()
                } else {
                    self.captures.has(&capture).into()
                })
            }
            _ if self.renderer.helpers.contains(name) => {
                if !named.is_empty() {
                    values.push(Value::map(named));
                }
                self.helper(name, values)
            }
            _ => Err(TemplateError::UnknownFunction(name.to_owned())),
        }
    }

    fn helper(&self, name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        let Some(helper) = self.renderer.helpers.get(name) else {
            return Err(TemplateError::UnknownFunction(name.to_owned()));
        };
        helper(args.as_slice()).map_err(|source| TemplateError::Helper {
            name: name.to_owned(),
            source,
        })
    }
}

fn is_universal_method(name: &str) -> bool {
    matches!(name, "to_s" | "nil?")
}

/// Built-in methods on values.
fn method(target: &Value, name: &str, args: &[Value]) -> Result<Value, TemplateError> {
    let no_args = || {
        if args.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::arguments(name, "takes no arguments"))
        }
    };
    let unknown = || TemplateError::UnknownMethod {
        method: name.to_owned(),
        type_name: target.type_name(),
    };

    match (target, name) {
        (_, "to_s") => {
            no_args()?;
            Ok(target.to_string().into())
        }
        (_, "nil?") => {
            no_args()?;
            Ok(target.is_null().into())
        }
        (Value::Seq(items), "join") => {
            let separator = match args {
                [] => String::new(),
                [sep] => sep.to_string(),
                _ => return Err(TemplateError::arguments(name, "takes at most one separator")),
            };
            let joined = items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(&separator);
            Ok(joined.into())
        }
        (Value::Seq(items), _) => {
            no_args()?;
            match name {
                "size" | "length" => Ok(Value::Int(items.len() as i64)),
                "first" => Ok(items.first().cloned().unwrap_or_default()),
                "last" => Ok(items.last().cloned().unwrap_or_default()),
                "empty?" => Ok(items.is_empty().into()),
                "any?" => Ok(items.iter().any(Value::is_truthy).into()),
                "reverse" => Ok(Value::seq(items.iter().rev().cloned().collect())),
                _ => Err(unknown()),
            }
        }
        (Value::Str(s), _) => {
            no_args()?;
            match name {
                "size" | "length" => Ok(Value::Int(s.chars().count() as i64)),
                "upcase" => Ok(s.to_uppercase().into()),
                "downcase" => Ok(s.to_lowercase().into()),
                "strip" => Ok(s.trim().into()),
                "empty?" => Ok(s.is_empty().into()),
                _ => Err(unknown()),
            }
        }
        _ => Err(unknown()),
    }
}
