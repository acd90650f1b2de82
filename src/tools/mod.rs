//! Tools the model may call during a locate session.
//!
//! Tools don't think; they execute. Each tool carries self-documenting
//! metadata (name, description, request format) from which the usage
//! instructions in the seed prompt are generated.

pub mod file_viewer;

pub use file_viewer::{FileViewer, ViewError};

/// Metadata every tool exposes to the model.
pub trait Tool: Send + Sync {
    /// Tool name, as used in the `type` attribute of `<action>`.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Example request in the tool wire format.
    fn request_format(&self) -> &str;

    /// Extra notes appended after the request format.
    fn notes(&self) -> &str {
        ""
    }
}

/// Render usage instructions for a set of tools.
pub fn usage_instructions(tools: &[&dyn Tool]) -> String {
    let mut out = String::from(
        "You can call tools while you work. To call a tool, reply with a single \
         <tool>...</tool> block and nothing else; the tool output is sent back as \
         the next message.\n",
    );
    for tool in tools {
        out.push_str(&format!("\n## {}\n{}\n\n", tool.name(), tool.description()));
        out.push_str("Request format:\n");
        out.push_str(tool.request_format());
        out.push('\n');
        let notes = tool.notes();
        if !notes.is_empty() {
            out.push('\n');
            out.push_str(notes);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Repeats its input."
        }

        fn request_format(&self) -> &str {
            "<tool><action type=\"echo\"/></tool>"
        }
    }

    #[test]
    fn usage_lists_every_tool() {
        let viewer = FileViewer::new(".");
        let text = usage_instructions(&[&Echo, &viewer]);
        assert!(text.contains("## echo"));
        assert!(text.contains("Repeats its input."));
        assert!(text.contains("## view"));
        assert!(text.contains("<start_line>"));
    }

    #[test]
    fn notes_are_optional() {
        let text = usage_instructions(&[&Echo]);
        assert!(text.trim_end().ends_with("<tool><action type=\"echo\"/></tool>"));
    }
}
