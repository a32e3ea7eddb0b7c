//! Argument transformations applied before a call reaches its handler.

use cinescout_model::ToolCallRequest;
use serde_json::{Number, Value};

use crate::message::Locale;
use crate::tool::ToolName;

/// Fills in the `language` argument of a catalog tool call when the model
/// left it out.
///
/// The language is derived from `locale` (`en-US` or `zh-CN`). Calls that
/// already carry a non-empty language, calls to tools without a language
/// argument and calls whose arguments aren't a JSON object are returned
/// unchanged.
pub fn inject_default_language(
    call: &ToolCallRequest,
    locale: Locale,
) -> ToolCallRequest {
    let accepts_language = call
        .name
        .parse::<ToolName>()
        .is_ok_and(ToolName::accepts_language);
    if !accepts_language {
        return call.clone();
    }

    let arguments = if call.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str::<Value>(&call.arguments) {
            Ok(value) => value,
            Err(_) => return call.clone(),
        }
    };
    let Value::Object(mut map) = arguments else {
        return call.clone();
    };

    let has_language = map
        .get("language")
        .and_then(Value::as_str)
        .is_some_and(|lang| !lang.trim().is_empty());
    if has_language {
        return call.clone();
    }
    map.insert(
        "language".to_owned(),
        Value::String(locale.language_tag().to_owned()),
    );

    ToolCallRequest {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments: Value::Object(map).to_string(),
    }
}

/// Coerces argument values toward the types `schema` declares.
///
/// Models regularly send numbers as strings (`"2010"`), whole numbers as
/// floats (`5.0`) and lists as comma-separated strings (`"28,12"`). Values
/// that can't be coerced are left alone for deserialization to reject.
pub(crate) fn coerce_arguments(arguments: &mut Value, schema: &Value) {
    let (Some(args), Some(props)) = (
        arguments.as_object_mut(),
        schema.get("properties").and_then(Value::as_object),
    ) else {
        return;
    };
    for (name, value) in args.iter_mut() {
        if let Some(prop) = props.get(name) {
            coerce_value(value, prop);
        }
    }
}

fn coerce_value(value: &mut Value, schema: &Value) {
    if accepts(schema, "array") {
        if let Value::String(s) = value {
            let parts = s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_owned()))
                .collect();
            *value = Value::Array(parts);
        }
        if let (Value::Array(items), Some(item_schema)) =
            (value, schema.get("items"))
        {
            for item in items {
                coerce_value(item, item_schema);
            }
        }
        return;
    }

    let integer = accepts(schema, "integer");
    let number = integer || accepts(schema, "number");
    match value {
        Value::String(s) if number => {
            let s = s.trim();
            let coerced = if s.is_empty() {
                Some(Value::Null)
            } else if let Ok(n) = s.parse::<u64>() {
                Some(Value::Number(n.into()))
            } else if let Ok(n) = s.parse::<i64>() {
                Some(Value::Number(n.into()))
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            };
            if let Some(coerced) = coerced {
                *value = coerced;
            }
        }
        Value::Number(n) if integer && n.is_f64() => {
            let whole = n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0);
            if let Some(f) = whole {
                *value = Value::Number((f as u64).into());
            }
        }
        Value::Number(n) if accepts(schema, "string") => {
            *value = Value::String(n.to_string());
        }
        _ => {}
    }
}

fn accepts(schema: &Value, ty: &str) -> bool {
    let direct = match schema.get("type") {
        Some(Value::String(s)) => s == ty,
        Some(Value::Array(types)) => types.iter().any(|t| t == ty),
        _ => false,
    };
    direct
        || schema
            .get("anyOf")
            .and_then(Value::as_array)
            .is_some_and(|variants| variants.iter().any(|v| accepts(v, ty)))
}
