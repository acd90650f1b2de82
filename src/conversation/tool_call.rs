//! Tool-call interpreter for the `view` tool.
//!
//! Wire format:
//!
//! ```text
//! <tool>
//!   <action type="view">
//!     <filepath>src/main/java/com/example</filepath>
//!     <filename>UserService.java</filename>
//!     <start_line>10</start_line>   (optional)
//!     <end_line>40</end_line>       (optional)
//!   </action>
//! </tool>
//! ```

use std::sync::LazyLock;

use quick_xml::escape::escape;
use regex::Regex;

use super::xml::{self, Element, XmlError};

static TOOL_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool>.*?</tool>").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("malformed tool markup: {0}")]
    Malformed(#[from] XmlError),

    #[error("invalid tool call: {0}")]
    Invalid(String),
}

/// A parsed "view file" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub filepath: String,
    pub filename: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
}

impl ToolDescriptor {
    /// Render back to the wire format.
    pub fn to_markup(&self) -> String {
        let mut out = String::from("<tool><action type=\"view\">");
        out.push_str(&format!("<filepath>{}</filepath>", escape(&self.filepath)));
        out.push_str(&format!("<filename>{}</filename>", escape(&self.filename)));
        if let Some(start) = self.start_line {
            out.push_str(&format!("<start_line>{start}</start_line>"));
        }
        if let Some(end) = self.end_line {
            out.push_str(&format!("<end_line>{end}</end_line>"));
        }
        out.push_str("</action></tool>");
        out
    }
}

/// Single-use parser: construct with the markup, `parse()`, then read
/// `tool_info()`.
#[derive(Debug)]
pub struct ToolParser {
    markup: String,
    info: Option<ToolDescriptor>,
}

impl ToolParser {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            info: None,
        }
    }

    pub fn parse(&mut self) -> Result<(), ToolCallError> {
        let root = xml::parse_document(self.markup.trim())?;
        self.info = Some(interpret(&root)?);
        Ok(())
    }

    /// The parsed descriptor; `None` until `parse()` has succeeded.
    pub fn tool_info(&self) -> Option<&ToolDescriptor> {
        self.info.as_ref()
    }

    pub fn into_tool_info(self) -> Option<ToolDescriptor> {
        self.info
    }
}

/// The first `<tool>…</tool>` block embedded in a reply.
pub fn extract_tool_block(reply: &str) -> Option<&str> {
    TOOL_BLOCK.find(reply).map(|m| m.as_str())
}

fn interpret(root: &Element) -> Result<ToolDescriptor, ToolCallError> {
    if root.name != "tool" {
        return Err(ToolCallError::Invalid(format!(
            "root element must be <tool>, found <{}>",
            root.name
        )));
    }

    let action = root
        .child("action")
        .ok_or_else(|| ToolCallError::Invalid("missing <action>".into()))?;
    match action.attr("type") {
        Some("view") => {}
        Some(other) => {
            return Err(ToolCallError::Invalid(format!(
                "unsupported action type \"{other}\""
            )))
        }
        None => return Err(ToolCallError::Invalid("action has no type".into())),
    }

    let filepath = required_text(action, "filepath")?;
    let filename = required_text(action, "filename")?;
    let start_line = line_number(action, "start_line")?;
    let end_line = line_number(action, "end_line")?;

    if let (Some(start), Some(end)) = (start_line, end_line) {
        if start > end {
            return Err(ToolCallError::Invalid(format!(
                "invalid line range: start_line {start} is after end_line {end}"
            )));
        }
    }

    Ok(ToolDescriptor {
        filepath,
        filename,
        start_line,
        end_line,
    })
}

fn required_text(action: &Element, name: &str) -> Result<String, ToolCallError> {
    let element = action
        .child(name)
        .ok_or_else(|| ToolCallError::Invalid(format!("missing <{name}>")))?;
    if !element.children.is_empty() {
        return Err(ToolCallError::Invalid(format!("<{name}> must contain text only")));
    }
    let text = element.text.trim();
    if text.is_empty() {
        return Err(ToolCallError::Invalid(format!("<{name}> is empty")));
    }
    Ok(text.to_string())
}

fn line_number(action: &Element, name: &str) -> Result<Option<usize>, ToolCallError> {
    let Some(element) = action.child(name) else {
        return Ok(None);
    };
    let text = element.text.trim();
    let value: i64 = text
        .parse()
        .map_err(|_| ToolCallError::Invalid(format!("<{name}> is not an integer: \"{text}\"")))?;
    if value < 1 {
        return Err(ToolCallError::Invalid(format!(
            "<{name}> must be positive, got {value}"
        )));
    }
    usize::try_from(value)
        .map(Some)
        .map_err(|_| ToolCallError::Invalid(format!("<{name}> is out of range: {value}")))
}
