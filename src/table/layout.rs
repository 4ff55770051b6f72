use crate::error::ExporterError;
use crate::schema::type_tree::join_path;
use crate::schema::TypeNode;
use crate::schema::ROOT_NAME;
use crate::spreadsheet::reference::to_reference;
use crate::spreadsheet::sheet::Sheet;
use crate::table::LayoutError;

/// A header cell with the inclusive column range of its field and sub-fields.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutNode {
    pub name: String,
    pub col_start: usize,
    pub col_end: usize,
    /// Children left to right, covering disjoint parts of the range
    pub members: Vec<LayoutNode>,
}

impl LayoutNode {
    pub fn new(name: &str, col_start: usize, col_end: usize) -> Self {
        Self {
            name: name.to_owned(),
            col_start,
            col_end,
            members: Vec::new(),
        }
    }

    /// First child with the given label.
    pub fn member(&self, name: &str) -> Option<&LayoutNode> {
        self.members.iter().find(|member| member.name == name)
    }
}

/// How a header cell relates to the ancestor stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Final header row: attach to the top, never pushed
    Leaf,
    /// One row below the top: attach and push
    Descend,
    /// Same row as the top: pop it, attach to the exposed node and push
    Sibling,
    /// Above the top: pop this many levels, attach and push
    Ascend(usize),
}

/// Decides the transition for a cell at `cell_depth` (its header row) given an ancestor
/// stack of `stack_len` nodes, the root included. `None` means the cell skips a level.
///
/// A final-row cell always attaches to the top of the stack, however deep the stack is.
pub fn transition(cell_depth: usize, stack_len: usize, header_row_count: usize) -> Option<Transition> {
    let parent_depth = stack_len.checked_sub(1)?;
    if cell_depth == 0 {
        None
    } else if cell_depth == header_row_count {
        Some(Transition::Leaf)
    } else if cell_depth > parent_depth + 1 {
        None
    } else if cell_depth == parent_depth + 1 {
        Some(Transition::Descend)
    } else if cell_depth == parent_depth {
        Some(Transition::Sibling)
    } else {
        Some(Transition::Ascend(parent_depth - cell_depth + 1))
    }
}

/// Scans the header rows column by column, top to bottom, and builds the layout tree.
///
/// The root spans every used column. A node ends one column before the next
/// label on its own row, or where its enclosing node ends.
pub fn build_layout_tree(sheet: &Sheet, header_row_count: usize) -> Result<LayoutNode, ExporterError> {
    let mut stack = vec![LayoutNode::new(ROOT_NAME, 1, sheet.max_col())];
    for col in 1..=sheet.max_col() {
        for row in 1..=header_row_count {
            let name = sheet.text(row, col);
            if name.is_empty() {
                continue;
            }

            let transition = transition(row, stack.len(), header_row_count).ok_or_else(|| LayoutError::HeaderDepth {
                reference: to_reference(row, col),
                depth: row,
                parent_depth: stack.len() - 1,
            })?;
            match transition {
                Transition::Leaf | Transition::Descend => (),
                Transition::Sibling => pop_levels(&mut stack, 1),
                Transition::Ascend(levels) => pop_levels(&mut stack, levels),
            }

            let parent_end = stack.last().map(|parent| parent.col_end).unwrap_or(col);
            let col_end = ((col + 1)..=parent_end)
                .find(|&next| !sheet.text(row, next).is_empty())
                .map(|next| next - 1)
                .unwrap_or(parent_end);
            let node = LayoutNode::new(&name, col, col_end);
            if transition == Transition::Leaf {
                if let Some(parent) = stack.last_mut() {
                    parent.members.push(node);
                }
            } else {
                stack.push(node);
            }
        }
    }

    let levels = stack.len() - 1;
    pop_levels(&mut stack, levels);
    Ok(stack.pop().unwrap_or_else(|| LayoutNode::new(ROOT_NAME, 1, 0)))
}

/// Pops nodes off the stack, attaching each to the node below it.
fn pop_levels(stack: &mut Vec<LayoutNode>, levels: usize) {
    for _ in 0..levels {
        if stack.len() < 2 {
            break;
        }
        if let Some(node) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.members.push(node);
            }
        }
    }
}

/// Checks that every field of the type tree has a same-named header node under its
/// parent's header node. Extra header columns are allowed.
pub fn check_layout(type_root: &TypeNode, layout_root: &LayoutNode) -> Result<(), ExporterError> {
    check_members(type_root, layout_root, "")
}

fn check_members(type_node: &TypeNode, layout_node: &LayoutNode, path: &str) -> Result<(), ExporterError> {
    for member in type_node.members() {
        let path = join_path(path, &member.name);
        match layout_node.member(&member.name) {
            Some(layout) => check_members(member, layout, &path)?,
            None => Err(LayoutError::LayoutMismatch { path })?,
        }
    }
    Ok(())
}
