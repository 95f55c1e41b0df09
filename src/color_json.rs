//! Purpose: Pretty-print JSON with optional ANSI color for terminal output.
//! Exports: colorize_json.
//! Role: Pure formatter behind the CLI `--json` and error emission paths.
//! Invariants: With color off, output is byte-equal to serde_json::to_string_pretty.
//! Invariants: Escape sequences appear only when color is requested.
use serde_json::Value;

// Plain 8/16-color codes so output stays readable on light and dark themes.
const KEY: &str = "36";
const STRING: &str = "32";
const NUMBER: &str = "33";
const BOOL: &str = "35";
const NULL: &str = "39";
const PUNCT: &str = "39";

pub fn colorize_json(value: &Value, use_color: bool) -> String {
    let mut painter = Painter {
        color: use_color,
        out: String::new(),
    };
    painter.value(value, 0);
    painter.out
}

struct Painter {
    color: bool,
    out: String,
}

impl Painter {
    fn value(&mut self, value: &Value, depth: usize) {
        match value {
            Value::Null => self.paint("null", NULL),
            Value::Bool(flag) => self.paint(if *flag { "true" } else { "false" }, BOOL),
            Value::Number(num) => {
                let text = num.to_string();
                self.paint(&text, NUMBER);
            }
            Value::String(text) => self.paint(&encode_string(text), STRING),
            Value::Array(items) => self.array(items, depth),
            Value::Object(map) => self.object(map, depth),
        }
    }

    fn array(&mut self, items: &[Value], depth: usize) {
        if items.is_empty() {
            self.paint("[]", PUNCT);
            return;
        }
        self.paint("[", PUNCT);
        self.out.push('\n');
        for (idx, item) in items.iter().enumerate() {
            self.indent(depth + 1);
            self.value(item, depth + 1);
            if idx + 1 < items.len() {
                self.paint(",", PUNCT);
            }
            self.out.push('\n');
        }
        self.indent(depth);
        self.paint("]", PUNCT);
    }

    fn object(&mut self, map: &serde_json::Map<String, Value>, depth: usize) {
        if map.is_empty() {
            self.paint("{}", PUNCT);
            return;
        }
        self.paint("{", PUNCT);
        self.out.push('\n');
        let len = map.len();
        for (idx, (key, value)) in map.iter().enumerate() {
            self.indent(depth + 1);
            self.paint(&encode_string(key), KEY);
            self.paint(":", PUNCT);
            self.out.push(' ');
            self.value(value, depth + 1);
            if idx + 1 < len {
                self.paint(",", PUNCT);
            }
            self.out.push('\n');
        }
        self.indent(depth);
        self.paint("}", PUNCT);
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
    }

    fn paint(&mut self, text: &str, code: &str) {
        if !self.color {
            self.out.push_str(text);
            return;
        }
        self.out.push_str("\u{1b}[");
        self.out.push_str(code);
        self.out.push('m');
        self.out.push_str(text);
        self.out.push_str("\u{1b}[0m");
    }
}

fn encode_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::colorize_json;
    use serde_json::json;

    #[test]
    fn colorize_json_matches_pretty_when_disabled() {
        let value = json!({
            "payload": "1,2|3",
            "rows": [1, true, null],
            "nested": { "byte_len": 5 }
        });
        let plain = colorize_json(&value, false);
        let pretty = serde_json::to_string_pretty(&value).expect("pretty");
        assert_eq!(plain, pretty);
    }

    #[test]
    fn colorize_json_emits_ansi_when_enabled() {
        let value = json!({"k":"v","n":1,"b":true,"z":null});
        let colored = colorize_json(&value, true);
        assert!(colored.contains("\u{1b}["));
        assert!(colored.contains("\u{1b}[36m\"k\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[32m\"v\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[33m1\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[35mtrue\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[39mnull\u{1b}[0m"));
    }

    #[test]
    fn colorize_json_handles_empty_containers() {
        assert_eq!(colorize_json(&json!([]), false), "[]");
        assert_eq!(colorize_json(&json!({}), false), "{}");
    }
}
