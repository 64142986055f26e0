//! Concepts agent: explains core Python topics from a fixed catalog.

use serde::Serialize;

use super::{AgentKind, AgentReply, ReplyPayload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Concept {
    pub key: &'static str,
    pub title: &'static str,
    pub explanation: &'static str,
    /// Markdown with a fenced Python block.
    pub example: &'static str,
    pub exercise: &'static str,
}

/// Serialized form of a looked-up concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConceptView {
    pub concept: &'static str,
    pub title: &'static str,
    pub explanation: &'static str,
    pub example: &'static str,
    pub exercise: &'static str,
}

impl From<&'static Concept> for ConceptView {
    fn from(c: &'static Concept) -> Self {
        Self { concept: c.key, title: c.title, explanation: c.explanation, example: c.example, exercise: c.exercise }
    }
}

pub static CONCEPTS: &[Concept] = &[
    Concept {
        key: "variables",
        title: "Variables",
        explanation: "Variables are containers for storing data values. In Python, you don't need to declare \
                      the type of variable before using it.",
        example: "```python\n# Creating variables\nname = \"Alice\"\nage = 25\nheight = 5.6\n\nprint(name)\nprint(age)\nprint(height)\n```",
        exercise: "Create three variables: one for your name (string), one for your age (integer), and one for \
                   your favorite number (float). Print all three variables.",
    },
    Concept {
        key: "data_types",
        title: "Data Types",
        explanation: "Python has several built-in data types including integers, floats, strings, booleans, \
                      lists, tuples, and dictionaries.",
        example: "```python\n# Different data types\ninteger_var = 42\nfloat_var = 3.14\nstring_var = \"Hello\"\nbool_var = True\nlist_var = [1, 2, 3]\ndict_var = {\"key\": \"value\"}\n\nprint(type(integer_var))  # <class 'int'>\n```",
        exercise: "Create variables of each data type mentioned (integer, float, string, boolean, list, \
                   dictionary). Use the type() function to print the type of each variable.",
    },
    Concept {
        key: "conditionals",
        title: "Conditionals (if/elif/else)",
        explanation: "Conditional statements allow you to execute different blocks of code based on certain \
                      conditions.",
        example: "```python\n# Conditional statements\nage = 18\n\nif age >= 18:\n    print(\"You are an adult\")\nelif age >= 13:\n    print(\"You are a teenager\")\nelse:\n    print(\"You are a child\")\n```",
        exercise: "Write a program that takes a number as input and prints whether it's positive, negative, \
                   or zero.",
    },
    Concept {
        key: "loops",
        title: "Loops (for/while)",
        explanation: "Loops allow you to execute a block of code multiple times. Python has for loops and \
                      while loops.",
        example: "```python\n# For loop\nfruits = [\"apple\", \"banana\", \"cherry\"]\nfor fruit in fruits:\n    print(fruit)\n\n# While loop\ncount = 0\nwhile count < 5:\n    print(count)\n    count += 1\n```",
        exercise: "Write a for loop that prints the numbers 1 to 10. Then write a while loop that prints the \
                   numbers 10 down to 1.",
    },
    Concept {
        key: "functions",
        title: "Functions",
        explanation: "Functions are blocks of code that perform a specific task. You can pass data to \
                      functions and get results back.",
        example: "```python\n# Defining a function\ndef greet(name):\n    return f\"Hello, {name}!\"\n\n# Calling the function\nmessage = greet(\"Alice\")\nprint(message)  # Output: Hello, Alice!\n\n# Function with multiple parameters\ndef add_numbers(a, b):\n    return a + b\n\nresult = add_numbers(5, 3)\nprint(result)  # Output: 8\n```",
        exercise: "Write a function that takes two numbers as parameters and returns their product. Test the \
                   function with different inputs.",
    },
];

/// Everyday phrasing mapped to catalog keys, checked in order.
const TERMS: &[(&str, &str)] = &[
    ("variable", "variables"),
    ("data type", "data_types"),
    ("conditional", "conditionals"),
    ("if statement", "conditionals"),
    ("if else", "conditionals"),
    ("loop", "loops"),
    ("function", "functions"),
    ("def", "functions"),
];

/// Catalog keys in display order.
#[must_use]
pub fn available() -> Vec<&'static str> {
    CONCEPTS.iter().map(|c| c.key).collect()
}

/// Look up a concept by key. Accepts spaces or dashes for underscores.
#[must_use]
pub fn explain(name: &str) -> Option<&'static Concept> {
    let key = name.trim().to_lowercase().replace([' ', '-'], "_");
    CONCEPTS.iter().find(|c| c.key == key)
}

/// Find the concept a free-text question is about.
#[must_use]
pub fn identify(input: &str) -> Option<&'static Concept> {
    let lowered = input.to_lowercase();
    TERMS
        .iter()
        .find(|(term, _)| lowered.contains(term))
        .and_then(|(_, key)| explain(key))
        .or_else(|| {
            CONCEPTS
                .iter()
                .find(|c| lowered.contains(c.key) || lowered.contains(&c.key.replace('_', " ")))
        })
}

#[must_use]
pub fn respond(input: &str) -> AgentReply {
    match identify(input) {
        Some(concept) => AgentReply::new(
            AgentKind::Concepts,
            format!("Here's an explanation of {}:", concept.title),
            0.9,
            ReplyPayload::Concept(concept.into()),
        ),
        None => {
            let keys = available();
            AgentReply::new(
                AgentKind::Concepts,
                format!(
                    "I can explain the following Python concepts: {}. Please ask about a specific concept \
                     you'd like to learn about.",
                    keys.join(", ")
                ),
                0.8,
                ReplyPayload::ConceptCatalog { available_concepts: keys },
            )
        }
    }
}

#[cfg(test)]
#[path = "concepts_test.rs"]
mod tests;
