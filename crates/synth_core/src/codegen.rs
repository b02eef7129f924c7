//! Source emission for solved trees
//!
//! Produces a Python-style function: nested `if`/`else` blocks for splits and
//! a dictionary literal per leaf.

use crate::expression::{keys_known_present, render_condition, RenderOptions};
use crate::tree::Node;
use crate::vectorizer::Vectorizer;

struct Emitter {
    unit: String,
    out: String,
}

impl Emitter {
    fn new(indent_width: usize) -> Self {
        Self {
            unit: " ".repeat(indent_width),
            out: String::new(),
        }
    }

    fn line(&mut self, level: usize, text: &str) {
        for _ in 0..level {
            self.out.push_str(&self.unit);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

/// Render `root` as a function named `name` over the input schema's keys.
pub fn emit_function(
    name: &str,
    root: &Node,
    input: &Vectorizer,
    output: &Vectorizer,
    options: &RenderOptions,
    indent_width: usize,
) -> String {
    let mut emitter = Emitter::new(indent_width);
    emitter.line(0, &format!("def {}({}):", name, input.argument_keys().join(", ")));
    emit_node(&mut emitter, 1, root, input, output, &[], options);
    emitter.out
}

/// `present` holds the input keys the enclosing branch tests prove non-null.
fn emit_node(
    emitter: &mut Emitter,
    level: usize,
    node: &Node,
    input: &Vectorizer,
    output: &Vectorizer,
    present: &[String],
    options: &RenderOptions,
) {
    match node {
        Node::Leaf { map } => {
            emitter.line(level, "return {");
            for (key, expression) in output.mapped_expressions(map, input, present, options) {
                emitter.line(level + 1, &format!("\"{key}\": {expression},"));
            }
            emitter.line(level, "}");
        }
        Node::Internal {
            condition,
            greater,
            less,
        } => {
            let form = input.condition_form(condition, present, options);
            emitter.line(level, &format!("if {}:", render_condition(&form, options)));

            let branch = |holds: bool| {
                let mut known = present.to_vec();
                for key in keys_known_present(&form, holds, options) {
                    if !known.contains(&key) {
                        known.push(key);
                    }
                }
                known
            };
            emit_node(emitter, level + 1, greater, input, output, &branch(true), options);
            emitter.line(level, "else:");
            emit_node(emitter, level + 1, less, input, output, &branch(false), options);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{record, Record};

    fn schemas() -> (Vectorizer, Vectorizer) {
        let inputs: Vec<Record> = (0..4).map(|x| record([("x", x)])).collect();
        let outputs: Vec<Record> = [-1, -1, 1, 1].iter().map(|y| record([("y", *y)])).collect();
        (
            Vectorizer::fit(&inputs, true).unwrap(),
            Vectorizer::fit(&outputs, false).unwrap(),
        )
    }

    #[test]
    fn test_single_leaf() {
        let (input, output) = schemas();
        let source = emit_function(
            "f",
            &Node::leaf(vec![vec![0.0, -1.0]]),
            &input,
            &output,
            &RenderOptions::default(),
            2,
        );
        assert_eq!(source, "def f(x):\n  return {\n    \"y\": -1.0,\n  }\n");
    }

    #[test]
    fn test_split_layout_and_indent_width() {
        let (input, output) = schemas();
        let tree = Node::internal(
            vec![0.15, -0.05],
            Node::leaf(vec![vec![0.0, 1.0]]),
            Node::leaf(vec![vec![0.0, -1.0]]),
        );
        let source = emit_function("step", &tree, &input, &output, &RenderOptions::default(), 4);
        let expected = [
            "def step(x):",
            "    if x >= 2.0:",
            "        return {",
            "            \"y\": 1.0,",
            "        }",
            "    else:",
            "        return {",
            "            \"y\": -1.0,",
            "        }",
            "",
        ]
        .join("\n");
        assert_eq!(source, expected);
    }

    #[test]
    fn test_null_check_carries_into_branches() {
        let inputs = vec![
            record([("x", Some(1.0))]),
            record([("x", Some(3.0))]),
            record([("x", None::<f64>)]),
        ];
        let outputs: Vec<Record> = [1, 3, 2].iter().map(|y| record([("y", *y)])).collect();
        let input = Vectorizer::fit(&inputs, true).unwrap();
        let output = Vectorizer::fit(&outputs, false).unwrap();

        let tree = Node::internal(
            vec![0.0, -1.0, 0.0],
            Node::leaf(vec![vec![1.0, 0.0, 0.0]]),
            Node::leaf(vec![vec![1.0, 0.0, 0.0]]),
        );
        let source = emit_function("f", &tree, &input, &output, &RenderOptions::default(), 2);
        let expected = [
            "def f(x):",
            "  if x is not None:",
            "    return {",
            "      \"y\": (x or 0),",
            "    }",
            "  else:",
            "    return {",
            "      \"y\": (2.0 if x is None else x),",
            "    }",
            "",
        ]
        .join("\n");
        assert_eq!(source, expected);
    }
}
