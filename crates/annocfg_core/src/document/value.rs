//! Typed view of field text

use std::fmt;

/// Field value as the tool interprets it
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Vector(Vec<f64>),
    /// Engine-encoded blobs such as `CDATA[...]` lists, carried untouched
    Opaque(String),
}

impl Value {
    /// Guess the type of a field from its text
    pub fn infer(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Value::Str(String::new());
        }
        if trimmed.starts_with("CDATA[") {
            return Value::Opaque(text.to_string());
        }
        match trimmed {
            "True" | "true" => return Value::Bool(true),
            "False" | "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() > 1 {
            let numbers: Option<Vec<f64>> = parts.iter().map(|p| p.parse::<f64>().ok()).collect();
            if let Some(numbers) = numbers {
                return Value::Vector(numbers);
            }
        }
        Value::Str(text.to_string())
    }

    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|f| f as f32)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Text to write back into a field
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) | Value::Opaque(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{:.6}", v),
            Value::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::Vector(v) => {
                let parts: Vec<String> = v.iter().map(|c| format!("{:.6}", c)).collect();
                f.write_str(&parts.join(" "))
            }
        }
    }
}

/// Six-decimal text used for every float the tool writes
pub fn format_float(v: f32) -> String {
    format!("{:.6}", v)
}
