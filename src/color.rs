//! Purpose: ANSI coloring for CLI output: labels, namespace listings, and pretty documents.
//! Exports: `Color`, `paint`, `colorize_json`.
//! Role: Pure formatting helpers; the core never emits escapes.
//! Invariants: With color disabled, `colorize_json` equals `serde_json::to_string_pretty`.
//! Invariants: Extended-JSON wrapper keys (`$oid`, `$date`, ...) get their own color.
use serde_json::{Map, Value};

const INDENT: &str = "  ";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    Default,
}

impl Color {
    fn code(self) -> &'static str {
        match self {
            Color::Red => "31",
            Color::Green => "32",
            Color::Yellow => "33",
            Color::Blue => "34",
            Color::Magenta => "35",
            Color::Cyan => "36",
            Color::Default => "39",
        }
    }
}

pub fn paint(text: &str, color: Color, enabled: bool) -> String {
    let mut out = String::new();
    push_painted(&mut out, text, color, enabled);
    out
}

pub fn colorize_json(value: &Value, use_color: bool) -> String {
    let mut writer = JsonWriter {
        out: String::new(),
        use_color,
    };
    writer.value(value, 0);
    writer.out
}

struct JsonWriter {
    out: String,
    use_color: bool,
}

impl JsonWriter {
    fn value(&mut self, value: &Value, depth: usize) {
        match value {
            Value::Null => self.token("null", Color::Default),
            Value::Bool(flag) => self.token(if *flag { "true" } else { "false" }, Color::Magenta),
            Value::Number(num) => self.token(&num.to_string(), Color::Yellow),
            Value::String(text) => self.token(&quoted(text), Color::Green),
            Value::Array(items) => self.array(items, depth),
            Value::Object(map) => self.object(map, depth),
        }
    }

    fn array(&mut self, items: &[Value], depth: usize) {
        if items.is_empty() {
            self.out.push_str("[]");
            return;
        }
        self.out.push_str("[\n");
        for (idx, item) in items.iter().enumerate() {
            self.indent(depth + 1);
            self.value(item, depth + 1);
            if idx + 1 < items.len() {
                self.out.push(',');
            }
            self.out.push('\n');
        }
        self.indent(depth);
        self.out.push(']');
    }

    fn object(&mut self, map: &Map<String, Value>, depth: usize) {
        if map.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        for (idx, (key, value)) in map.iter().enumerate() {
            self.indent(depth + 1);
            let color = if key.starts_with('$') {
                Color::Blue
            } else {
                Color::Cyan
            };
            self.token(&quoted(key), color);
            self.out.push_str(": ");
            self.value(value, depth + 1);
            if idx + 1 < map.len() {
                self.out.push(',');
            }
            self.out.push('\n');
        }
        self.indent(depth);
        self.out.push('}');
    }

    fn token(&mut self, text: &str, color: Color) {
        push_painted(&mut self.out, text, color, self.use_color);
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
    }
}

fn quoted(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn push_painted(out: &mut String, text: &str, color: Color, enabled: bool) {
    if !enabled {
        out.push_str(text);
        return;
    }
    out.push_str("\u{1b}[");
    out.push_str(color.code());
    out.push('m');
    out.push_str(text);
    out.push_str("\u{1b}[0m");
}
