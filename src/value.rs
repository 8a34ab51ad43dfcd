use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::exception::{Eval, Exception};
use crate::interpreter::Interpreter;

/// Host callable signature shared by builtins and container methods.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, Vec<Value>) -> Eval<Value>>;

/// Every runtime value. Scalars are copied; containers and objects are
/// shared behind `Rc`, so mutation is visible through every alias.
#[derive(Clone)]
pub enum Value {
    None,
    Number(f64),
    Bool(bool),
    Text(String),
    List(Rc<RefCell<Vec<Value>>>),
    /// Keys are text; scalar keys are stored in their printed form.
    Dict(Rc<RefCell<BTreeMap<String, Value>>>),
    Tuple(Rc<Vec<Value>>),
    /// Unique by structural equality, in insertion order.
    Set(Rc<RefCell<Vec<Value>>>),
    Function(Rc<FunctionObject>),
    Builtin(Rc<NativeFunction>),
    Method(Rc<BoundMethod>),
    Class(Rc<ClassObject>),
    Instance(Rc<InstanceObject>),
}

/// A user function or lambda together with its defining scope.
pub struct FunctionObject {
    pub decl: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

impl FunctionObject {
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    pub fn is_lambda(&self) -> bool {
        self.decl.is_lambda
    }
}

pub struct NativeFunction {
    pub name: String,
    /// `None` accepts any number of arguments.
    pub arity: Option<usize>,
    pub func: NativeFn,
}

/// A callable with its receiver prepended on every call.
pub struct BoundMethod {
    pub receiver: Value,
    pub callable: Value,
}

pub struct ClassObject {
    pub name: String,
    pub methods: BTreeMap<String, Value>,
    /// Names of every class this one was derived from, nearest first.
    pub lineage: Vec<String>,
}

impl ClassObject {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            methods: BTreeMap::new(),
            lineage: Vec::new(),
        }
    }

    pub fn find_method(&self, name: &str) -> Option<Value> {
        self.methods.get(name).cloned()
    }

    pub fn is_subclass_of(&self, name: &str) -> bool {
        self.name == name || self.lineage.iter().any(|base| base == name)
    }
}

pub struct InstanceObject {
    pub class: Rc<ClassObject>,
    pub fields: RefCell<BTreeMap<String, Value>>,
}

impl InstanceObject {
    pub fn new(class: Rc<ClassObject>) -> Self {
        Self {
            class,
            fields: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl Value {
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: BTreeMap<String, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    /// Builds a set, dropping structural duplicates.
    pub fn set(items: Vec<Value>) -> Self {
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());

        for item in items {
            if !unique.iter().any(|existing| existing.equals(&item)) {
                unique.push(item);
            }
        }

        Value::Set(Rc::new(RefCell::new(unique)))
    }

    pub fn native<S, F>(name: S, arity: Option<usize>, func: F) -> Self
    where
        S: Into<String>,
        F: Fn(&mut Interpreter, Vec<Value>) -> Eval<Value> + 'static,
    {
        Value::Builtin(Rc::new(NativeFunction {
            name: name.into(),
            arity,
            func: Rc::new(func),
        }))
    }

    pub fn bind(receiver: Value, callable: Value) -> Self {
        Value::Method(Rc::new(BoundMethod { receiver, callable }))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".to_string(),
            Value::Number(n) if n.fract() == 0.0 => "int".to_string(),
            Value::Number(_) => "float".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Text(_) => "str".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Dict(_) => "dict".to_string(),
            Value::Tuple(_) => "tuple".to_string(),
            Value::Set(_) => "set".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::Builtin(_) => "builtin_function".to_string(),
            Value::Method(_) => "method".to_string(),
            Value::Class(_) => "type".to_string(),
            Value::Instance(instance) => instance.class.name.clone(),
        }
    }

    /// None, `0`, `False`, and empty text/containers are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::List(items) | Value::Set(items) => !items.borrow().is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Structural equality for data, identity for objects.
    pub fn equals(&self, other: &Value) -> bool {
        self.equals_tracked(other, &mut Vec::new())
    }

    /// `active` holds the container pairs already being compared; meeting
    /// one again means a cycle, which compares equal.
    fn equals_tracked(&self, other: &Value, active: &mut Vec<(Addr, Addr)>) -> bool {
        if let (Some(a), Some(b)) = (self.addr(), other.addr()) {
            if a == b || active.contains(&(a, b)) {
                return true;
            }
            active.push((a, b));
            let equal = self.equals_contents(other, active);
            active.pop();
            return equal;
        }

        self.equals_contents(other, active)
    }

    fn equals_contents(&self, other: &Value, active: &mut Vec<(Addr, Addr)>) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => seq_equals(&a.borrow(), &b.borrow(), active),
            (Value::Tuple(a), Value::Tuple(b)) => seq_equals(a, b, active),
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.get(k)
                            .is_some_and(|other| v.equals_tracked(other, active))
                    })
            }
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|x| b.iter().any(|y| x.equals_tracked(y, active)))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => {
                a.receiver.is_same(&b.receiver) && a.callable.is_same(&b.callable)
            }
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Address of a shared container, used to detect self-reference.
    fn addr(&self) -> Option<Addr> {
        match self {
            Value::List(items) | Value::Set(items) => Some(Rc::as_ptr(items) as Addr),
            Value::Dict(entries) => Some(Rc::as_ptr(entries) as Addr),
            Value::Tuple(items) => Some(Rc::as_ptr(items) as Addr),
            _ => None,
        }
    }

    /// Identity as used by `is`: pointer equality for shared values,
    /// equality for scalars.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) | (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            _ => self.equals(other),
        }
    }

    /// Converts a scalar into the text form used as a dict key.
    pub fn to_key(&self) -> Eval<String> {
        match self {
            Value::Text(s) => Ok(s.clone()),
            Value::Number(_) | Value::Bool(_) | Value::None => Ok(self.to_string()),
            other => Err(Exception::type_error(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }

    /// Snapshot of the elements a `for` loop visits. Dicts yield their keys.
    pub fn iter_values(&self) -> Eval<Vec<Value>> {
        match self {
            Value::List(items) | Value::Set(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Text(s) => Ok(s.chars().map(|c| Value::Text(c.to_string())).collect()),
            Value::Dict(entries) => Ok(entries.borrow().keys().map(Value::text).collect()),
            other => Err(Exception::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Numeric view used by arithmetic; booleans count as 0 and 1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Ordering for `<`, `sorted`, `min` and `max`.
    pub fn compare(&self, other: &Value) -> Eval<Ordering> {
        self.compare_tracked(other, &mut Vec::new())
    }

    fn compare_tracked(&self, other: &Value, active: &mut Vec<(Addr, Addr)>) -> Eval<Ordering> {
        if let (Some(a), Some(b)) = (self.addr(), other.addr()) {
            if a == b || active.contains(&(a, b)) {
                return Ok(Ordering::Equal);
            }
            active.push((a, b));
            let ordering = self.compare_contents(other, active);
            active.pop();
            return ordering;
        }

        self.compare_contents(other, active)
    }

    fn compare_contents(&self, other: &Value, active: &mut Vec<(Addr, Addr)>) -> Eval<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b).ok_or_else(|| {
                Exception::value_error("cannot order nan")
            });
        }

        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => seq_compare(&a.borrow(), &b.borrow(), active),
            (Value::Tuple(a), Value::Tuple(b)) => seq_compare(a, b, active),
            _ => Err(Exception::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Python‑style `repr`: text is quoted, everything else prints as usual.
    pub fn repr(&self) -> String {
        match self {
            Value::Text(s) => quote(s),
            other => other.to_string(),
        }
    }

    /// Writes the printed form. Containers already on `open` are being
    /// rendered further up, so they collapse to `[...]`, `{...}` or `(...)`.
    fn render(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<Addr>) -> fmt::Result {
        let Some(addr) = self.addr() else {
            return self.write_scalar(f, open);
        };

        if open.contains(&addr) {
            return f.write_str(match self {
                Value::List(_) => "[...]",
                Value::Tuple(_) => "(...)",
                _ => "{...}",
            });
        }

        open.push(addr);
        let result = match self {
            Value::List(items) => write_seq(f, "[", &items.borrow(), "]", open),

            Value::Tuple(items) if items.len() == 1 => {
                f.write_str("(")?;
                items[0].render_repr(f, open)?;
                f.write_str(",)")
            }

            Value::Tuple(items) => write_seq(f, "(", items, ")", open),

            Value::Set(items) if items.borrow().is_empty() => f.write_str("set()"),

            Value::Set(items) => write_seq(f, "{", &items.borrow(), "}", open),

            Value::Dict(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}': ", key)?;
                    value.render_repr(f, open)?;
                }
                f.write_str("}")
            }

            _ => self.write_scalar(f, open),
        };
        open.pop();

        result
    }

    fn render_repr(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<Addr>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(&quote(s)),
            other => other.render(f, open),
        }
    }
}

/// Identity of a shared container while walking nested values.
type Addr = *const ();

fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    format!("'{}'", escaped)
}

fn seq_equals(a: &[Value], b: &[Value], active: &mut Vec<(Addr, Addr)>) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.equals_tracked(y, active))
}

fn seq_compare(a: &[Value], b: &[Value], active: &mut Vec<(Addr, Addr)>) -> Eval<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare_tracked(y, active)? {
            Ordering::Equal => continue,
            unequal => return Ok(unequal),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Integral numbers print without a fractional part (`5`, not `5.0`).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "inf" } else { "-inf" }).to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        let mut buf: itoa::Buffer = itoa::Buffer::new();
        buf.format(n as i64).to_string()
    } else {
        n.to_string()
    }
}

fn write_seq(
    f: &mut fmt::Formatter<'_>,
    left: &str,
    items: &[Value],
    right: &str,
    open: &mut Vec<Addr>,
) -> fmt::Result {
    f.write_str(left)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.render_repr(f, open)?;
    }
    f.write_str(right)
}

impl Value {
    fn write_scalar(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<Addr>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),

            Value::Number(n) => write!(f, "{}", format_number(*n)),

            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),

            Value::Text(s) => write!(f, "{}", s),

            Value::Function(function) if function.is_lambda() => write!(f, "<lambda>"),

            Value::Function(function) => write!(f, "<function {}>", function.name()),

            Value::Builtin(native) => write!(f, "<built-in function {}>", native.name),

            Value::Method(method) => {
                f.write_str("<bound method of ")?;
                method.receiver.render_repr(f, open)?;
                f.write_str(">")
            }

            Value::Class(class) => write!(f, "<class '{}'>", class.name),

            Value::Instance(instance) => {
                if instance.class.is_subclass_of("Exception") {
                    if let Some(message) = instance.field("message") {
                        return message.render(f, open);
                    }
                }
                write!(f, "<{} object>", instance.class.name)
            }

            // containers go through `render`
            container => container.render(f, open),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}
