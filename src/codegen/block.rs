//! C# declaration blocks and their text rendering.

/// Line separator of generated files, the same on every platform.
pub const LINE_SEPARATOR: &str = "\r\n";
pub const INDENT: &str = "    ";

/// A field of a class or struct.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectMember {
    pub name: String,
    pub type_name: String,
    pub is_array: bool,
    pub comment: Option<String>,
}

/// An enum constant.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CodeBlock {
    Object {
        name: String,
        comment: Option<String>,
        is_struct: bool,
        members: Vec<ObjectMember>,
    },
    Enum {
        name: String,
        comment: Option<String>,
        members: Vec<EnumMember>,
    },
}

impl CodeBlock {
    pub fn name(&self) -> &str {
        match self {
            CodeBlock::Object { name, .. } | CodeBlock::Enum { name, .. } => name,
        }
    }

    /// Renders the block; a blank line separates members when either neighbour has a comment.
    pub fn to_code(&self, depth: usize) -> String {
        let indentation = INDENT.repeat(depth);
        let (comment, header, lines) = match self {
            CodeBlock::Object {
                name,
                comment,
                is_struct,
                members,
            } => {
                let category = if *is_struct { "struct" } else { "class" };
                let lines: Vec<(Option<&String>, String)> = members
                    .iter()
                    .map(|member| {
                        let type_name = if member.is_array {
                            format!("List<{}>", member.type_name)
                        } else {
                            member.type_name.to_owned()
                        };
                        (member.comment.as_ref(), format!("public {} {};", type_name, member.name))
                    })
                    .collect();
                (comment, format!("public {} {}", category, name), lines)
            }
            CodeBlock::Enum { name, comment, members } => {
                let lines = members
                    .iter()
                    .map(|member| (member.comment.as_ref(), format!("{},", member.name)))
                    .collect();
                (comment, format!("public enum {}", name), lines)
            }
        };

        let mut text = String::new();
        if let Some(comment) = comment {
            text.push_str(&to_comment(comment, &indentation));
        }
        text.push_str(&format!("{indentation}{header}{LINE_SEPARATOR}"));
        text.push_str(&format!("{indentation}{{{LINE_SEPARATOR}"));
        let member_indentation = INDENT.repeat(depth + 1);
        for (index, (comment, line)) in lines.iter().enumerate() {
            if index > 0 && (comment.is_some() || lines[index - 1].0.is_some()) {
                text.push_str(LINE_SEPARATOR);
            }
            if let Some(comment) = comment {
                text.push_str(&to_comment(comment, &member_indentation));
            }
            text.push_str(&format!("{member_indentation}{line}{LINE_SEPARATOR}"));
        }
        text.push_str(&format!("{indentation}}}{LINE_SEPARATOR}"));
        text
    }
}

/// A `/// <summary>` comment, one `///` line per comment line.
fn to_comment(comment: &str, indentation: &str) -> String {
    let mut text = format!("{indentation}/// <summary>{LINE_SEPARATOR}");
    for line in comment.lines() {
        text.push_str(&format!("{indentation}/// {line}{LINE_SEPARATOR}"));
    }
    text.push_str(&format!("{indentation}/// </summary>{LINE_SEPARATOR}"));
    text
}

/// A generated source file.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeFile {
    pub name: String,
    pub blocks: Vec<CodeBlock>,
}

impl CodeFile {
    pub fn to_code(&self) -> String {
        let mut text = format!("using System.Collections.Generic;{LINE_SEPARATOR}{LINE_SEPARATOR}");
        let blocks: Vec<String> = self.blocks.iter().map(|block| block.to_code(0)).collect();
        text.push_str(&blocks.join(LINE_SEPARATOR));
        text
    }
}
