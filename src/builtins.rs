//! Host functions, exception classes, and the methods exposed by lists,
//! dicts, sets and text.
//!
//! Everything here reports failure through `Err(Exception)`, the same
//! channel user code raises into.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::Utc;
use log::debug;

use crate::exception::{ErrorKind, Eval, Exception, MAX_SEQUENCE_LEN};
use crate::interpreter::{binary, Interpreter};
use crate::value::{format_number, ClassObject, Value};

/// Binds every builtin function and exception class into the global scope.
pub fn install(interp: &mut Interpreter) {
    debug!("Installing builtins");

    interp.register_builtin("print", None, |interp, args| {
        let mut parts: Vec<String> = Vec::with_capacity(args.len());
        for arg in &args {
            parts.push(interp.display(arg)?);
        }
        interp.write_line(parts.join(" "));
        Ok(Value::None)
    });

    interp.register_builtin("len", Some(1), |_, args| {
        let n = match &args[0] {
            Value::Text(s) => s.chars().count(),
            Value::List(items) | Value::Set(items) => items.borrow().len(),
            Value::Tuple(items) => items.len(),
            Value::Dict(entries) => entries.borrow().len(),
            other => {
                return Err(Exception::type_error(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                )))
            }
        };
        Ok(Value::Number(n as f64))
    });

    interp.register_builtin("str", None, |interp, args| {
        check_count("str", &args, 0, 1)?;
        match args.first() {
            Some(value) => Ok(Value::text(interp.display(value)?)),
            None => Ok(Value::text("")),
        }
    });

    interp.register_builtin("repr", Some(1), |_, args| Ok(Value::text(args[0].repr())));

    interp.register_builtin("int", None, |_, args| {
        check_count("int", &args, 0, 1)?;
        let Some(value) = args.first() else {
            return Ok(Value::Number(0.0));
        };

        match value {
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(n as f64))
                .map_err(|_| {
                    Exception::value_error(format!(
                        "invalid literal for int() with base 10: {}",
                        value.repr()
                    ))
                }),
            other => match other.as_number() {
                Some(n) => Ok(Value::Number(n.trunc())),
                None => Err(Exception::type_error(format!(
                    "int() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))),
            },
        }
    });

    interp.register_builtin("float", None, |_, args| {
        check_count("float", &args, 0, 1)?;
        let Some(value) = args.first() else {
            return Ok(Value::Number(0.0));
        };

        match value {
            Value::Text(s) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
                Exception::value_error(format!(
                    "could not convert string to float: {}",
                    value.repr()
                ))
            }),
            other => other.as_number().map(Value::Number).ok_or_else(|| {
                Exception::type_error(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))
            }),
        }
    });

    interp.register_builtin("bool", None, |_, args| {
        check_count("bool", &args, 0, 1)?;
        Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
    });

    interp.register_builtin("list", None, |_, args| {
        check_count("list", &args, 0, 1)?;
        match args.first() {
            Some(iterable) => Ok(Value::list(iterable.iter_values()?)),
            None => Ok(Value::list(Vec::new())),
        }
    });

    interp.register_builtin("tuple", None, |_, args| {
        check_count("tuple", &args, 0, 1)?;
        match args.first() {
            Some(iterable) => Ok(Value::tuple(iterable.iter_values()?)),
            None => Ok(Value::tuple(Vec::new())),
        }
    });

    interp.register_builtin("set", None, |_, args| {
        check_count("set", &args, 0, 1)?;
        match args.first() {
            Some(iterable) => Ok(Value::set(iterable.iter_values()?)),
            None => Ok(Value::set(Vec::new())),
        }
    });

    interp.register_builtin("dict", None, |_, args| {
        check_count("dict", &args, 0, 1)?;
        let mut map: BTreeMap<String, Value> = BTreeMap::new();

        match args.first() {
            None => {}
            Some(Value::Dict(entries)) => map = entries.borrow().clone(),
            Some(pairs) => {
                for pair in pairs.iter_values()? {
                    let items = pair.iter_values()?;
                    if items.len() != 2 {
                        return Err(Exception::value_error(format!(
                            "dictionary update sequence element has length {}; 2 is required",
                            items.len()
                        )));
                    }
                    map.insert(items[0].to_key()?, items[1].clone());
                }
            }
        }

        Ok(Value::dict(map))
    });

    interp.register_builtin("range", None, |_, args| {
        check_count("range", &args, 1, 3)?;

        let (start, stop, step) = match args.len() {
            1 => (0, integer(&args[0], "range")?, 1),
            2 => (integer(&args[0], "range")?, integer(&args[1], "range")?, 1),
            _ => (
                integer(&args[0], "range")?,
                integer(&args[1], "range")?,
                integer(&args[2], "range")?,
            ),
        };

        if step == 0 {
            return Err(Exception::value_error("range() arg 3 must not be zero"));
        }

        let mut items: Vec<Value> = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            if items.len() == MAX_SEQUENCE_LEN {
                return Err(Exception::memory_error("range() result is too large"));
            }
            items.push(Value::Number(i as f64));
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(Value::list(items))
    });

    interp.register_builtin("abs", Some(1), |_, args| {
        args[0]
            .as_number()
            .map(|n| Value::Number(n.abs()))
            .ok_or_else(|| {
                Exception::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    args[0].type_name()
                ))
            })
    });

    interp.register_builtin("min", None, |_, args| extreme("min", args, Ordering::Less));

    interp.register_builtin("max", None, |_, args| extreme("max", args, Ordering::Greater));

    interp.register_builtin("sum", None, |_, args| {
        check_count("sum", &args, 1, 2)?;
        let mut total = args.get(1).cloned().unwrap_or(Value::Number(0.0));

        for item in args[0].iter_values()? {
            total = binary("+", total, item)?;
        }

        Ok(total)
    });

    interp.register_builtin("round", None, |_, args| {
        check_count("round", &args, 1, 2)?;
        let n = args[0].as_number().ok_or_else(|| {
            Exception::type_error(format!(
                "type {} doesn't define __round__ method",
                args[0].type_name()
            ))
        })?;

        match args.get(1) {
            None | Some(Value::None) => Ok(Value::Number(n.round_ties_even())),
            Some(digits) => {
                let factor = 10f64.powi(integer(digits, "round")? as i32);
                Ok(Value::Number((n * factor).round_ties_even() / factor))
            }
        }
    });

    interp.register_builtin("sorted", Some(1), |_, args| {
        let mut items = args[0].iter_values()?;
        sort_values(&mut items)?;
        Ok(Value::list(items))
    });

    interp.register_builtin("type", Some(1), |interp, args| match &args[0] {
        Value::Instance(instance) => Ok(Value::Class(instance.class.clone())),
        other => {
            let name = other.type_name();
            let constructor = interp.globals().borrow().lookup(&name);
            Ok(constructor.unwrap_or_else(|| Value::text(format!("<class '{}'>", name))))
        }
    });

    interp.register_builtin("isinstance", Some(2), |_, args| {
        Ok(Value::Bool(is_instance(&args[0], &args[1])))
    });

    interp.register_builtin("format", None, |interp, args| {
        check_count("format", &args, 1, 2)?;
        let spec = match args.get(1) {
            Some(Value::Text(spec)) => spec.clone(),
            Some(other) => {
                return Err(Exception::type_error(format!(
                    "format() argument 2 must be str, not {}",
                    other.type_name()
                )))
            }
            None => String::new(),
        };
        Ok(Value::text(format_value(interp, &args[0], &spec)?))
    });

    interp.register_builtin("time", Some(0), |_, _| {
        let now = Utc::now();
        let seconds = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6;
        Ok(Value::Number(seconds))
    });

    interp.register_builtin("hasattr", Some(2), |interp, args| {
        let name = text_arg(&args[1], "hasattr")?;
        Ok(Value::Bool(interp.get_attribute(&args[0], &name).is_ok()))
    });

    interp.register_builtin("getattr", None, |interp, args| {
        check_count("getattr", &args, 2, 3)?;
        let name = text_arg(&args[1], "getattr")?;
        match (interp.get_attribute(&args[0], &name), args.get(2)) {
            (Ok(value), _) => Ok(value),
            (Err(_), Some(default)) => Ok(default.clone()),
            (Err(error), None) => Err(error),
        }
    });

    interp.register_builtin("setattr", Some(3), |interp, args| {
        let name = text_arg(&args[1], "setattr")?;
        if interp.set_attribute(&args[0], &name, args[2].clone()) {
            Ok(Value::None)
        } else {
            Err(Exception::attribute_error(format!(
                "'{}' object has no attribute '{}'",
                args[0].type_name(),
                name
            )))
        }
    });

    install_exception_classes(interp);
}

/// `Exception` plus one direct subclass per builtin error kind. Each
/// carries a native `__init__` that stores `message` and `args`.
fn install_exception_classes(interp: &mut Interpreter) {
    let mut base = ClassObject::new(ErrorKind::Exception.name());
    base.methods.insert("__init__".to_string(), exception_init());
    let base = Rc::new(base);

    for kind in ErrorKind::ALL {
        let class = if kind == ErrorKind::Exception {
            base.clone()
        } else {
            Rc::new(ClassObject {
                name: kind.name().to_string(),
                methods: base.methods.clone(),
                lineage: vec![base.name.clone()],
            })
        };

        interp.register_exception_class(class);
    }
}

fn exception_init() -> Value {
    Value::native("__init__", None, |interp, args| {
        let mut args = args.into_iter();
        let Some(receiver) = args.next() else {
            return Err(Exception::type_error("__init__() missing receiver"));
        };
        let rest: Vec<Value> = args.collect();

        let message = match rest.first() {
            Some(value) => interp.display(value)?,
            None => String::new(),
        };

        if let Value::Instance(instance) = &receiver {
            instance.set_field("message", Value::text(message));
            instance.set_field("args", Value::tuple(rest));
        }

        Ok(Value::None)
    })
}

// ───────────────────────── container and text methods ─────────────────────

/// Builtin method `name` of a list, dict, set or text value, bound to it.
pub fn method(base: &Value, name: &str) -> Option<Value> {
    match base {
        Value::List(items) => list_method(items, name),
        Value::Dict(entries) => dict_method(entries, name),
        Value::Set(items) => set_method(items, name),
        Value::Text(s) => text_method(s, name),
        _ => None,
    }
}

type Shared<T> = Rc<std::cell::RefCell<T>>;

/// Index of the first element equal to `needle`. The shared borrow ends
/// before the caller mutates, since `needle` may be the container itself.
fn position(items: &Shared<Vec<Value>>, needle: &Value) -> Option<usize> {
    items.borrow().iter().position(|item| item.equals(needle))
}

fn list_method(items: &Shared<Vec<Value>>, name: &str) -> Option<Value> {
    let items = items.clone();

    let method = match name {
        "append" => Value::native("append", Some(1), move |_, args| {
            items.borrow_mut().extend(args);
            Ok(Value::None)
        }),

        "pop" => Value::native("pop", None, move |_, args| {
            check_count("pop", &args, 0, 1)?;
            let mut items = items.borrow_mut();

            if items.is_empty() {
                return Err(Exception::index_error("pop from empty list"));
            }

            let index = match args.first() {
                Some(index) => {
                    let len = items.len() as i64;
                    let i = integer(index, "pop")?;
                    let i = if i < 0 { i + len } else { i };
                    if i < 0 || i >= len {
                        return Err(Exception::index_error("pop index out of range"));
                    }
                    i as usize
                }
                None => items.len() - 1,
            };

            Ok(items.remove(index))
        }),

        "insert" => Value::native("insert", Some(2), move |_, args| {
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let i = integer(&args[0], "insert")?;
            let i = if i < 0 { (i + len).max(0) } else { i.min(len) };
            items.insert(i as usize, args[1].clone());
            Ok(Value::None)
        }),

        "extend" => Value::native("extend", Some(1), move |_, args| {
            let extra = args[0].iter_values()?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }),

        "index" => Value::native("index", Some(1), move |_, args| {
            position(&items, &args[0])
                .map(|i| Value::Number(i as f64))
                .ok_or_else(|| {
                    Exception::value_error(format!("{} is not in list", args[0].repr()))
                })
        }),

        "remove" => Value::native("remove", Some(1), move |_, args| {
            match position(&items, &args[0]) {
                Some(i) => {
                    items.borrow_mut().remove(i);
                    Ok(Value::None)
                }
                None => Err(Exception::value_error("list.remove(x): x not in list")),
            }
        }),

        _ => return None,
    };

    Some(method)
}

fn dict_method(entries: &Shared<BTreeMap<String, Value>>, name: &str) -> Option<Value> {
    let entries = entries.clone();

    let method = match name {
        "keys" => Value::native("keys", Some(0), move |_, _| {
            Ok(Value::list(entries.borrow().keys().map(Value::text).collect()))
        }),

        "values" => Value::native("values", Some(0), move |_, _| {
            Ok(Value::list(entries.borrow().values().cloned().collect()))
        }),

        "items" => Value::native("items", Some(0), move |_, _| {
            Ok(Value::list(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| Value::tuple(vec![Value::text(k.as_str()), v.clone()]))
                    .collect(),
            ))
        }),

        "get" => Value::native("get", None, move |_, args| {
            check_count("get", &args, 1, 2)?;
            let key = args[0].to_key()?;
            Ok(entries
                .borrow()
                .get(&key)
                .cloned()
                .unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }),

        "pop" => Value::native("pop", None, move |_, args| {
            check_count("pop", &args, 1, 2)?;
            let key = args[0].to_key()?;
            let removed = entries.borrow_mut().remove(&key);
            match (removed, args.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(Exception::key_error(args[0].repr())),
            }
        }),

        _ => return None,
    };

    Some(method)
}

fn set_method(items: &Shared<Vec<Value>>, name: &str) -> Option<Value> {
    let items = items.clone();

    let method = match name {
        "add" => Value::native("add", Some(1), move |_, args| {
            if position(&items, &args[0]).is_none() {
                items.borrow_mut().push(args[0].clone());
            }
            Ok(Value::None)
        }),

        "remove" => Value::native("remove", Some(1), move |_, args| {
            match position(&items, &args[0]) {
                Some(i) => {
                    items.borrow_mut().remove(i);
                    Ok(Value::None)
                }
                None => Err(Exception::key_error(args[0].repr())),
            }
        }),

        _ => return None,
    };

    Some(method)
}

fn text_method(s: &str, name: &str) -> Option<Value> {
    let s = s.to_string();

    let method = match name {
        "upper" => Value::native("upper", Some(0), move |_, _| Ok(Value::text(s.to_uppercase()))),

        "lower" => Value::native("lower", Some(0), move |_, _| Ok(Value::text(s.to_lowercase()))),

        "strip" => Value::native("strip", Some(0), move |_, _| Ok(Value::text(s.trim()))),

        "split" => Value::native("split", None, move |_, args| {
            check_count("split", &args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::text).collect(),
                Some(Value::Text(sep)) if sep.is_empty() => {
                    return Err(Exception::value_error("empty separator"))
                }
                Some(Value::Text(sep)) => s.split(sep.as_str()).map(Value::text).collect(),
                Some(other) => {
                    return Err(Exception::type_error(format!(
                        "must be str or None, not {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::list(parts))
        }),

        "join" => Value::native("join", Some(1), move |_, args| {
            let mut parts: Vec<String> = Vec::new();
            for (i, item) in args[0].iter_values()?.into_iter().enumerate() {
                match item {
                    Value::Text(part) => parts.push(part),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            i,
                            other.type_name()
                        )))
                    }
                }
            }
            Ok(Value::text(parts.join(s.as_str())))
        }),

        "replace" => Value::native("replace", Some(2), move |_, args| {
            let old = text_arg(&args[0], "replace")?;
            let new = text_arg(&args[1], "replace")?;
            Ok(Value::text(s.replace(&old, &new)))
        }),

        "startswith" => Value::native("startswith", Some(1), move |_, args| {
            Ok(Value::Bool(s.starts_with(&text_arg(&args[0], "startswith")?)))
        }),

        "endswith" => Value::native("endswith", Some(1), move |_, args| {
            Ok(Value::Bool(s.ends_with(&text_arg(&args[0], "endswith")?)))
        }),

        "format" => Value::native("format", None, move |interp, args| {
            Ok(Value::text(format_template(interp, &s, &args)?))
        }),

        _ => return None,
    };

    Some(method)
}

// ───────────────────────── helpers ────────────────────────────────────────

fn check_count(name: &str, args: &[Value], min: usize, max: usize) -> Eval<()> {
    if args.len() < min || args.len() > max {
        return Err(Exception::type_error(format!(
            "{}() takes from {} to {} arguments but {} were given",
            name,
            min,
            max,
            args.len()
        )));
    }
    Ok(())
}

#[inline(always)]
fn integer(value: &Value, context: &str) -> Eval<i64> {
    match value.as_number() {
        Some(n) if n.fract() == 0.0 => Ok(n as i64),
        _ => Err(Exception::type_error(format!(
            "{}() expected an integer, got '{}'",
            context,
            value.type_name()
        ))),
    }
}

fn text_arg(value: &Value, context: &str) -> Eval<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        other => Err(Exception::type_error(format!(
            "{}() expected str, got '{}'",
            context,
            other.type_name()
        ))),
    }
}

/// Shared by `min` and `max`: one iterable argument or several values.
fn extreme(name: &str, args: Vec<Value>, wanted: Ordering) -> Eval<Value> {
    let candidates = match args.len() {
        0 => {
            return Err(Exception::type_error(format!(
                "{}() expected at least 1 argument, got 0",
                name
            )))
        }
        1 => args[0].iter_values()?,
        _ => args,
    };

    let mut iter = candidates.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(Exception::value_error(format!(
            "{}() arg is an empty sequence",
            name
        )));
    };

    for candidate in iter {
        if candidate.compare(&best)? == wanted {
            best = candidate;
        }
    }

    Ok(best)
}

/// Stable sort that surfaces the first comparison error.
fn sort_values(items: &mut [Value]) -> Eval<()> {
    let mut error: Option<Exception> = None;

    items.sort_by(|a, b| match a.compare(b) {
        Ok(ordering) => ordering,
        Err(e) => {
            error.get_or_insert(e);
            Ordering::Equal
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn is_instance(value: &Value, class: &Value) -> bool {
    match class {
        Value::Class(class) => match value {
            Value::Instance(instance) => instance.class.is_subclass_of(&class.name),
            _ => false,
        },

        Value::Builtin(native) => match native.name.as_str() {
            "float" => matches!(value, Value::Number(_)),
            name => value.type_name() == name,
        },

        Value::Tuple(classes) => classes.iter().any(|class| is_instance(value, class)),

        _ => false,
    }
}

/// Renders one value under a format spec: `.Nf`, `d`, or empty.
fn format_value(interp: &mut Interpreter, value: &Value, spec: &str) -> Eval<String> {
    if spec.is_empty() {
        return interp.display(value);
    }

    let number = value.as_number().ok_or_else(|| {
        Exception::value_error(format!(
            "Unknown format code '{}' for object of type '{}'",
            spec,
            value.type_name()
        ))
    })?;

    if let Some(precision) = spec.strip_prefix('.').and_then(|p| p.strip_suffix('f')) {
        let precision: usize = precision
            .parse()
            .map_err(|_| Exception::value_error(format!("Invalid format specifier '{}'", spec)))?;
        return Ok(format!("{:.*}", precision, number));
    }

    match spec {
        "d" => Ok(format_number(number.trunc())),
        "f" => Ok(format!("{:.6}", number)),
        _ => Err(Exception::value_error(format!(
            "Invalid format specifier '{}'",
            spec
        ))),
    }
}

/// `"{} is {:.1f}".format(a, b)` with automatic or explicit field indexes.
fn format_template(interp: &mut Interpreter, template: &str, args: &[Value]) -> Eval<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_index = 0;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }

            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }

            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(Exception::value_error(
                                "Single '{' encountered in format string",
                            ))
                        }
                    }
                }

                let (position, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));

                let index = if position.is_empty() {
                    next_index += 1;
                    next_index - 1
                } else {
                    position.parse::<usize>().map_err(|_| {
                        Exception::value_error(format!("unsupported format field '{}'", position))
                    })?
                };

                let value = args.get(index).ok_or_else(|| {
                    Exception::index_error(format!("Replacement index {} out of range", index))
                })?;

                out.push_str(&format_value(interp, value, spec)?);
            }

            other => out.push(other),
        }
    }

    Ok(out)
}
